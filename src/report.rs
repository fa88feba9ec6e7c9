//! Plain-text tables printed by the inspection commands.

use std::borrow::Cow;
use std::fmt::Write as _;

use itertools::Itertools;

use crate::{
    data::Table,
    reference::{ColumnScores, ReferenceRoles},
    resolve::ColumnMap,
    schema::RecordSchema,
};

pub fn render_table(headers: &[String], rows: &[Vec<String>]) -> String {
    let mut widths = headers.iter().map(|h| display_width(h)).collect::<Vec<_>>();
    for row in rows {
        for (idx, cell) in row.iter().enumerate().take(headers.len()) {
            widths[idx] = widths[idx].max(display_width(cell));
        }
    }

    let mut output = String::new();
    let _ = writeln!(output, "{}", format_row(headers, &widths));
    let separator_widths = widths.iter().map(|w| (*w).max(3)).collect::<Vec<usize>>();
    let separator = separator_widths
        .iter()
        .map(|w| "-".repeat(*w))
        .collect::<Vec<_>>();
    let _ = writeln!(output, "{}", format_row(&separator, &separator_widths));
    for row in rows {
        let _ = writeln!(output, "{}", format_row(row, &widths));
    }
    output
}

fn format_row(values: &[String], widths: &[usize]) -> String {
    let cells = values
        .iter()
        .zip(widths)
        .map(|(value, width)| {
            let cell = flatten_cell(value);
            let padding = width.saturating_sub(display_width(&cell));
            format!("{cell}{}", " ".repeat(padding))
        })
        .join("  ");
    cells.trim_end().to_string()
}

fn display_width(value: &str) -> usize {
    value.chars().count()
}

fn flatten_cell(value: &str) -> Cow<'_, str> {
    if value.contains(['\n', '\r', '\t']) {
        Cow::Owned(value.replace(['\n', '\r', '\t'], " "))
    } else {
        Cow::Borrowed(value)
    }
}

fn owned(headers: &[&str]) -> Vec<String> {
    headers.iter().map(|h| h.to_string()).collect()
}

/// One line per logical field: where it lives and how it was found.
pub fn render_column_map(schema: &RecordSchema, map: &ColumnMap) -> String {
    let rows = schema
        .fields
        .iter()
        .filter_map(|field| {
            map.get(field.name).map(|column| {
                vec![
                    field.name.to_string(),
                    column.index.to_string(),
                    column.header.clone(),
                    column.method.as_str().to_string(),
                ]
            })
        })
        .collect_vec();
    render_table(&owned(&["field", "column", "header", "method"]), &rows)
}

/// Role scores of every scanned reference column, with the winning roles marked.
pub fn render_detection(scores: &[ColumnScores], roles: Option<&ReferenceRoles>) -> String {
    let rows = scores
        .iter()
        .enumerate()
        .map(|(index, score)| {
            let role = match roles {
                Some(roles) if roles.code == index => "code",
                Some(roles) if roles.name == index => "name",
                Some(roles) if roles.region == Some(index) => "region",
                _ => "",
            };
            vec![
                index.to_string(),
                score.code.to_string(),
                score.region.to_string(),
                score.name.to_string(),
                role.to_string(),
            ]
        })
        .collect_vec();
    render_table(&owned(&["column", "code", "region", "name", "role"]), &rows)
}

/// The first `limit` rows of a table.
pub fn render_preview(table: &Table, limit: usize) -> String {
    let rows = table.display_rows().take(limit).collect::<Vec<_>>();
    render_table(&table.headers, &rows)
}
