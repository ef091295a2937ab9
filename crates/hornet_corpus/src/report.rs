//! CSV reports over the stored population.
//!
//! Two shapes: one row per stored query, and a filter-only variant with one
//! row per filter part. Both use `;` as the delimiter.

use crate::error::Result;
use crate::query::Query;
use crate::store::CorpusStore;
use serde::Serialize;
use std::io::Write;

/// One row of the per-query report.
#[derive(Debug, Serialize)]
struct QueryRow {
    #[serde(rename = "StatusCode")]
    status_code: String,
    #[serde(rename = "ErrorCode")]
    error_code: String,
    #[serde(rename = "ErrorMessage")]
    error_message: String,
    #[serde(rename = "EntitySet")]
    entity_set: String,
    #[serde(rename = "AccessibleSet")]
    accessible_set: String,
    #[serde(rename = "AccessibleKeys")]
    accessible_keys: String,
    #[serde(rename = "Property")]
    property: String,
    #[serde(rename = "orderby")]
    orderby: String,
    #[serde(rename = "top")]
    top: String,
    #[serde(rename = "skip")]
    skip: String,
    #[serde(rename = "filter")]
    filter: String,
    #[serde(rename = "expand")]
    expand: String,
    #[serde(rename = "search")]
    search: String,
}

/// One row of the filter-part report.
#[derive(Debug, Serialize)]
struct FilterRow {
    #[serde(rename = "StatusCode")]
    status_code: String,
    #[serde(rename = "ErrorCode")]
    error_code: String,
    #[serde(rename = "ErrorMessage")]
    error_message: String,
    #[serde(rename = "EntitySet")]
    entity_set: String,
    #[serde(rename = "Property")]
    property: String,
    #[serde(rename = "logical")]
    logical: String,
    #[serde(rename = "operator")]
    operator: String,
    #[serde(rename = "function")]
    function: String,
    #[serde(rename = "operand")]
    operand: String,
}

fn status_fields(query: &Query) -> (String, String, String) {
    query.response.as_ref().map_or_else(
        || (String::new(), String::new(), String::new()),
        |r| {
            (
                r.status_code.to_string(),
                r.error_code.clone().unwrap_or_default(),
                r.error_message.clone().unwrap_or_default(),
            )
        },
    )
}

fn query_row(query: &Query) -> QueryRow {
    let (status_code, error_code, error_message) = status_fields(query);
    let properties: Vec<&str> = query.filter().map_or_else(Vec::new, |tree| {
        tree.groups
            .iter()
            .flat_map(|g| g.parts.iter())
            .chain(tree.parts.iter())
            .map(|p| p.function_and_property().1)
            .collect()
    });

    QueryRow {
        status_code,
        error_code,
        error_message,
        entity_set: query.entity_name.clone(),
        accessible_set: query
            .accessible_keys
            .as_ref()
            .map(|_| query.entity_name.clone())
            .unwrap_or_default(),
        accessible_keys: query.accessible_keys.clone().unwrap_or_default(),
        property: properties.join(" "),
        orderby: query.options.orderby.clone().unwrap_or_default(),
        top: query.options.top.map(|t| t.to_string()).unwrap_or_default(),
        skip: query.options.skip.map(|s| s.to_string()).unwrap_or_default(),
        filter: query
            .filter()
            .map(hornet_entities::build_filter_string)
            .unwrap_or_default(),
        expand: query.options.expand.clone().unwrap_or_default(),
        search: query.options.search.clone().unwrap_or_default(),
    }
}

fn filter_rows(query: &Query) -> Vec<FilterRow> {
    let (status_code, error_code, error_message) = status_fields(query);
    let Some(tree) = query.filter() else {
        return Vec::new();
    };

    // Items render groups first, so connective i sits before item i+1.
    let mut rows = Vec::new();
    let mut item_index = 0usize;
    let mut push = |part: &hornet_entities::FilterPart, logical: String| {
        let (function, property) = part.function_and_property();
        rows.push(FilterRow {
            status_code: status_code.clone(),
            error_code: error_code.clone(),
            error_message: error_message.clone(),
            entity_set: query.entity_name.clone(),
            property: property.to_string(),
            logical,
            operator: part.operator.to_string(),
            function: function.unwrap_or_default().to_string(),
            operand: part.operand.clone(),
        });
    };

    for group in &tree.groups {
        let connective = if item_index == 0 {
            String::new()
        } else {
            tree.logicals
                .get(item_index - 1)
                .map(ToString::to_string)
                .unwrap_or_default()
        };
        for (i, part) in group.parts.iter().enumerate() {
            let logical = if i == 0 {
                connective.clone()
            } else {
                group
                    .logicals
                    .get(i - 1)
                    .map(ToString::to_string)
                    .unwrap_or_default()
            };
            push(part, logical);
        }
        item_index += 1;
    }
    for part in &tree.parts {
        let logical = if item_index == 0 {
            String::new()
        } else {
            tree.logicals
                .get(item_index - 1)
                .map(ToString::to_string)
                .unwrap_or_default()
        };
        push(part, logical);
        item_index += 1;
    }
    rows
}

/// Writes the per-query report for the whole store.
pub fn write_query_report<W: Write>(store: &CorpusStore, writer: W) -> Result<()> {
    let mut csv = csv::WriterBuilder::new().delimiter(b';').from_writer(writer);
    for query in store.iter() {
        csv.serialize(query_row(query))?;
    }
    csv.flush()?;
    Ok(())
}

/// Writes the filter-part report for the whole store.
pub fn write_filter_report<W: Write>(store: &CorpusStore, writer: W) -> Result<()> {
    let mut csv = csv::WriterBuilder::new().delimiter(b';').from_writer(writer);
    for query in store.iter() {
        for row in filter_rows(query) {
            csv.serialize(row)?;
        }
    }
    csv.flush()?;
    Ok(())
}
