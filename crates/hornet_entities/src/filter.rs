//! Typed `$filter` expression trees.
//!
//! A filter is a flat list of comparison parts and parenthesized groups,
//! joined left to right by logical connectives. Crossover swaps single
//! parts between trees, so parts carry everything needed to re-render
//! themselves.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Logical connective between filter items.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Logical {
    /// `and`
    And,
    /// `or`
    Or,
}

impl fmt::Display for Logical {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::And => f.write_str("and"),
            Self::Or => f.write_str("or"),
        }
    }
}

impl FromStr for Logical {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "and" => Ok(Self::And),
            "or" => Ok(Self::Or),
            _ => Err(()),
        }
    }
}

/// Comparison operator of a filter part.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompareOp {
    /// `eq`
    Eq,
    /// `ne`
    Ne,
    /// `gt`
    Gt,
    /// `ge`
    Ge,
    /// `lt`
    Lt,
    /// `le`
    Le,
}

impl CompareOp {
    /// All comparison operators, for random selection.
    pub const ALL: [Self; 6] = [Self::Eq, Self::Ne, Self::Gt, Self::Ge, Self::Lt, Self::Le];

    /// Operators applicable to types without a total order.
    pub const EQUALITY: [Self; 2] = [Self::Eq, Self::Ne];
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Eq => "eq",
            Self::Ne => "ne",
            Self::Gt => "gt",
            Self::Ge => "ge",
            Self::Lt => "lt",
            Self::Le => "le",
        };
        f.write_str(s)
    }
}

impl FromStr for CompareOp {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "eq" => Ok(Self::Eq),
            "ne" => Ok(Self::Ne),
            "gt" => Ok(Self::Gt),
            "ge" => Ok(Self::Ge),
            "lt" => Ok(Self::Lt),
            "le" => Ok(Self::Le),
            _ => Err(()),
        }
    }
}

/// An atomic `name operator operand` predicate.
///
/// `name` may be a bare property or a rendered function call such as
/// `startswith(Name,'abc')`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterPart {
    /// Left-hand side: property name or rendered function call.
    pub name: String,
    /// Comparison operator.
    pub operator: CompareOp,
    /// Rendered right-hand side literal.
    pub operand: String,
}

impl FilterPart {
    /// Creates a new part.
    #[must_use]
    pub fn new(name: impl Into<String>, operator: CompareOp, operand: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            operator,
            operand: operand.into(),
        }
    }

    /// Splits the rendered name into `(function, property)` for reporting.
    ///
    /// `startswith(Name,'x')` yields `(Some("startswith"), "Name")`; a bare
    /// property yields `(None, name)`.
    #[must_use]
    pub fn function_and_property(&self) -> (Option<&str>, &str) {
        match self.name.split_once('(') {
            Some((func, rest)) => {
                let inner = rest.trim_end_matches(')');
                let property = inner
                    .split(',')
                    .find(|arg| !arg.starts_with('\'') && arg.parse::<f64>().is_err())
                    .unwrap_or(inner);
                (Some(func), property)
            }
            None => (None, self.name.as_str()),
        }
    }
}

/// A parenthesized sub-expression. Groups never nest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct FilterGroup {
    /// Connectives between the group's parts (`parts.len() - 1` entries).
    pub logicals: Vec<Logical>,
    /// Parts inside the group.
    pub parts: Vec<FilterPart>,
}

/// A complete `$filter` value.
///
/// Invariant: `logicals.len() + 1 == groups.len() + parts.len()` whenever the
/// tree is non-empty. Serialization renders groups first, then parts, joined
/// by the connectives in order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct FilterTree {
    /// Connectives between the rendered items.
    pub logicals: Vec<Logical>,
    /// Top-level comparison parts.
    pub parts: Vec<FilterPart>,
    /// Parenthesized groups.
    pub groups: Vec<FilterGroup>,
}

impl FilterTree {
    /// Creates a tree with a single part.
    #[must_use]
    pub fn single(part: FilterPart) -> Self {
        Self {
            logicals: Vec::new(),
            parts: vec![part],
            groups: Vec::new(),
        }
    }

    /// Number of top-level comparison parts.
    #[must_use]
    pub fn parts_len(&self) -> usize {
        self.parts.len()
    }
}

fn render_part(part: &FilterPart) -> String {
    format!("{} {} {}", part.name, part.operator, part.operand)
}

fn join(rendered: &[String], logicals: &[Logical]) -> String {
    let mut out = String::new();
    for (i, item) in rendered.iter().enumerate() {
        if i > 0 {
            let logical = logicals.get(i - 1).copied().unwrap_or(Logical::And);
            out.push(' ');
            out.push_str(&logical.to_string());
            out.push(' ');
        }
        out.push_str(item);
    }
    out
}

/// Renders a filter tree back into its URL form.
#[must_use]
pub fn build_filter_string(tree: &FilterTree) -> String {
    let mut rendered: Vec<String> = tree
        .groups
        .iter()
        .map(|g| {
            let inner: Vec<String> = g.parts.iter().map(render_part).collect();
            format!("({})", join(&inner, &g.logicals))
        })
        .collect();
    rendered.extend(tree.parts.iter().map(render_part));
    join(&rendered, &tree.logicals)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_part_renders_flat() {
        let tree = FilterTree::single(FilterPart::new("Name", CompareOp::Eq, "'abc'"));
        assert_eq!(build_filter_string(&tree), "Name eq 'abc'");
    }

    #[test]
    fn parts_join_with_logicals() {
        let tree = FilterTree {
            logicals: vec![Logical::And, Logical::Or],
            parts: vec![
                FilterPart::new("Price", CompareOp::Gt, "100"),
                FilterPart::new("Name", CompareOp::Ne, "'x'"),
                FilterPart::new("Active", CompareOp::Eq, "true"),
            ],
            groups: Vec::new(),
        };
        assert_eq!(
            build_filter_string(&tree),
            "Price gt 100 and Name ne 'x' or Active eq true"
        );
    }

    #[test]
    fn groups_render_before_parts() {
        let tree = FilterTree {
            logicals: vec![Logical::Or],
            parts: vec![FilterPart::new("Id", CompareOp::Eq, "1")],
            groups: vec![FilterGroup {
                logicals: vec![Logical::And],
                parts: vec![
                    FilterPart::new("A", CompareOp::Lt, "5"),
                    FilterPart::new("B", CompareOp::Ge, "7"),
                ],
            }],
        };
        assert_eq!(build_filter_string(&tree), "(A lt 5 and B ge 7) or Id eq 1");
    }

    #[test]
    fn function_and_property_split() {
        let part = FilterPart::new("startswith(Name,'ab')", CompareOp::Eq, "true");
        assert_eq!(part.function_and_property(), (Some("startswith"), "Name"));

        let plain = FilterPart::new("Name", CompareOp::Eq, "'ab'");
        assert_eq!(plain.function_and_property(), (None, "Name"));

        let swapped = FilterPart::new("substringof('ab',Name)", CompareOp::Eq, "true");
        assert_eq!(swapped.function_and_property(), (Some("substringof"), "Name"));
    }
}
