//! `$filter` string parser.
//!
//! The inverse of [`crate::filter::build_filter_string`]: splits the input on
//! top-level `and`/`or` connectives (quote- and parenthesis-aware) and
//! rebuilds the flat tree. Serialization renders groups before parts, so the
//! parser rejects inputs where a group follows a plain comparison.

use crate::error::{Error, Result};
use crate::filter::{CompareOp, FilterGroup, FilterPart, FilterTree, Logical};

/// Parses a `$filter` value into a [`FilterTree`].
///
/// # Errors
///
/// Returns an error on unbalanced parentheses or quotes, malformed parts,
/// unknown operators, nested groups, or a group appearing after a part.
pub fn parse_filter(input: &str) -> Result<FilterTree> {
    let input = input.trim();
    if input.is_empty() {
        return Err(Error::FilterParse("empty filter".to_string()));
    }

    let segments = split_logical(input)?;

    let mut tree = FilterTree::default();
    for (logical, segment) in segments {
        if let Some(logical) = logical {
            tree.logicals.push(logical);
        }
        if segment.starts_with('(') {
            if !tree.parts.is_empty() {
                return Err(Error::FilterParse(
                    "group after plain comparison".to_string(),
                ));
            }
            tree.groups.push(parse_group(segment)?);
        } else {
            tree.parts.push(parse_part(segment)?);
        }
    }
    Ok(tree)
}

fn parse_group(segment: &str) -> Result<FilterGroup> {
    let inner = segment
        .strip_prefix('(')
        .and_then(|s| s.strip_suffix(')'))
        .ok_or_else(|| Error::FilterParse(format!("unterminated group: {segment}")))?;

    let mut group = FilterGroup::default();
    for (logical, part) in split_logical(inner)? {
        if let Some(logical) = logical {
            group.logicals.push(logical);
        }
        if part.starts_with('(') {
            return Err(Error::FilterParse("nested group".to_string()));
        }
        group.parts.push(parse_part(part)?);
    }
    Ok(group)
}

fn parse_part(segment: &str) -> Result<FilterPart> {
    let tokens = tokenize(segment)?;
    if tokens.len() < 3 {
        return Err(Error::FilterParse(format!(
            "expected 'name operator operand', found: {segment}"
        )));
    }
    let operator: CompareOp = tokens[1]
        .parse()
        .map_err(|()| Error::FilterParse(format!("unknown operator: {}", tokens[1])))?;
    Ok(FilterPart {
        name: tokens[0].clone(),
        operator,
        operand: tokens[2..].join(" "),
    })
}

/// Splits on top-level ` and ` / ` or `, returning each segment with the
/// connective that preceded it (`None` for the first).
fn split_logical(input: &str) -> Result<Vec<(Option<Logical>, &str)>> {
    let bytes = input.as_bytes();
    let mut segments = Vec::new();
    let mut depth = 0usize;
    let mut in_quote = false;
    let mut start = 0usize;
    let mut pending: Option<Logical> = None;
    let mut i = 0usize;

    while i < bytes.len() {
        match bytes[i] {
            b'\'' => in_quote = !in_quote,
            b'(' if !in_quote => depth += 1,
            b')' if !in_quote => {
                depth = depth
                    .checked_sub(1)
                    .ok_or_else(|| Error::FilterParse("unbalanced parentheses".to_string()))?;
            }
            b' ' if !in_quote && depth == 0 => {
                let rest = &input[i..];
                let connective = if rest.starts_with(" and ") {
                    Some((Logical::And, 5))
                } else if rest.starts_with(" or ") {
                    Some((Logical::Or, 4))
                } else {
                    None
                };
                if let Some((logical, skip)) = connective {
                    segments.push((pending.take(), input[start..i].trim()));
                    pending = Some(logical);
                    i += skip;
                    start = i;
                    continue;
                }
            }
            _ => {}
        }
        i += 1;
    }

    if in_quote {
        return Err(Error::FilterParse("unterminated quote".to_string()));
    }
    if depth != 0 {
        return Err(Error::FilterParse("unbalanced parentheses".to_string()));
    }

    let tail = input[start..].trim();
    if tail.is_empty() {
        return Err(Error::FilterParse("dangling logical connective".to_string()));
    }
    segments.push((pending, tail));
    Ok(segments)
}

/// Splits a part into whitespace-separated tokens, treating quoted spans as
/// atomic so operands like `'foo bar'` survive.
fn tokenize(segment: &str) -> Result<Vec<String>> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_quote = false;

    for c in segment.chars() {
        match c {
            '\'' => {
                in_quote = !in_quote;
                current.push(c);
            }
            ' ' if !in_quote => {
                if !current.is_empty() {
                    tokens.push(std::mem::take(&mut current));
                }
            }
            _ => current.push(c),
        }
    }
    if in_quote {
        return Err(Error::FilterParse("unterminated quote".to_string()));
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    Ok(tokens)
}


#[cfg(test)]
mod proptests {
    use super::*;
    use crate::filter::{build_filter_string, FilterGroup, FilterPart, FilterTree, Logical};
    use proptest::prelude::*;

    fn property_name() -> impl Strategy<Value = String> {
        prop::string::string_regex("[A-Z][A-Za-z0-9]{0,10}").expect("valid regex")
    }

    fn operand() -> impl Strategy<Value = String> {
        prop_oneof![
            prop::string::string_regex("-?[0-9]{1,9}").expect("valid regex"),
            prop::string::string_regex("'[A-Za-z0-9 ]{0,12}'").expect("valid regex"),
            Just("true".to_string()),
            Just("false".to_string()),
        ]
    }

    fn compare_op() -> impl Strategy<Value = CompareOp> {
        prop::sample::select(CompareOp::ALL.to_vec())
    }

    fn logical() -> impl Strategy<Value = Logical> {
        prop_oneof![Just(Logical::And), Just(Logical::Or)]
    }

    fn part() -> impl Strategy<Value = FilterPart> {
        (property_name(), compare_op(), operand())
            .prop_map(|(name, operator, operand)| FilterPart { name, operator, operand })
    }

    fn tree() -> impl Strategy<Value = FilterTree> {
        (
            prop::collection::vec(part(), 1..4),
            prop::collection::vec(part(), 0..3),
            prop::collection::vec(logical(), 8),
        )
            .prop_map(|(parts, group_parts, logicals)| {
                let groups = if group_parts.is_empty() {
                    Vec::new()
                } else {
                    let connectives = logicals[..group_parts.len() - 1].to_vec();
                    vec![FilterGroup {
                        logicals: connectives,
                        parts: group_parts,
                    }]
                };
                let items = groups.len() + parts.len();
                FilterTree {
                    logicals: logicals[..items - 1].to_vec(),
                    parts,
                    groups,
                }
            })
    }

    proptest! {
        #[test]
        fn serialized_trees_roundtrip(tree in tree()) {
            let rendered = build_filter_string(&tree);
            let parsed = parse_filter(&rendered).unwrap();
            prop_assert_eq!(&parsed, &tree);
            prop_assert_eq!(build_filter_string(&parsed), rendered);
        }
    }
}
