//! Header-to-schema resolution.
//!
//! [`resolve_columns`] is pure: it looks at a header row and a
//! [`RecordSchema`] and returns an immutable [`ColumnMap`] plus the columns
//! that have to be synthesized. [`ColumnResolution::apply`] then widens a
//! [`Table`] accordingly.

use std::collections::{BTreeMap, HashSet};

use itertools::Itertools;
use log::{debug, warn};
use serde::Serialize;

use crate::{
    data::Table,
    schema::{FieldSpec, RecordSchema},
    text::strip_accents,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionMethod {
    Exact,
    Substring,
    Positional,
    Synthesized,
}

impl ResolutionMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            ResolutionMethod::Exact => "exact",
            ResolutionMethod::Substring => "substring",
            ResolutionMethod::Positional => "positional",
            ResolutionMethod::Synthesized => "synthesized",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedColumn {
    pub index: usize,
    pub header: String,
    pub method: ResolutionMethod,
}

/// Logical field name to physical column. Built once, read-only afterwards.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ColumnMap {
    columns: BTreeMap<&'static str, ResolvedColumn>,
}

impl ColumnMap {
    pub fn get(&self, field: &str) -> Option<&ResolvedColumn> {
        self.columns.get(field)
    }

    pub fn index_of(&self, field: &str) -> Option<usize> {
        self.columns.get(field).map(|column| column.index)
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &ResolvedColumn)> + '_ {
        self.columns.iter().map(|(field, column)| (*field, column))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SynthesizedColumn {
    pub field: &'static str,
    pub header: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnResolution {
    pub map: ColumnMap,
    /// Columns to append, in schema order. Also the change log content.
    pub synthesized: Vec<SynthesizedColumn>,
}

impl ColumnResolution {
    /// Appends the synthesized columns to `table`, filled with empty cells.
    pub fn apply(&self, table: &mut Table) {
        for column in &self.synthesized {
            let index = table.add_empty_column(&column.header);
            debug_assert_eq!(Some(index), self.map.index_of(column.field));
        }
    }

    pub fn created_headers(&self) -> Vec<String> {
        self.synthesized
            .iter()
            .map(|column| column.header.clone())
            .collect()
    }
}

fn match_key(value: &str) -> String {
    strip_accents(value.trim()).to_lowercase()
}

fn exact_match(field: &FieldSpec, header_keys: &[String], claimed: &HashSet<usize>) -> Option<usize> {
    field.synonyms.iter().find_map(|synonym| {
        let wanted = match_key(synonym);
        header_keys
            .iter()
            .position(|key| *key == wanted)
            .filter(|idx| !claimed.contains(idx))
    })
}

fn substring_match(
    field: &FieldSpec,
    header_keys: &[String],
    claimed: &HashSet<usize>,
) -> Option<usize> {
    let wanted = field.synonyms.iter().map(|s| match_key(s)).collect_vec();
    header_keys.iter().enumerate().find_map(|(idx, key)| {
        (!claimed.contains(&idx) && wanted.iter().any(|synonym| key.contains(synonym.as_str())))
            .then_some(idx)
    })
}

fn unique_header(base: &str, taken: &HashSet<String>) -> String {
    if !taken.contains(base) {
        return base.to_string();
    }
    (2..)
        .map(|suffix| format!("{base}_{suffix}"))
        .find(|candidate| !taken.contains(candidate))
        .unwrap_or_else(|| base.to_string())
}

/// Resolves every logical field of `schema` against `headers`.
///
/// Exact synonym matches are taken first for all fields, then substring
/// matches for the rest, then positional fallbacks; anything still open is
/// synthesized as a new column named after the field. Matching ignores case
/// and accents. A column claimed by one field is not offered to another,
/// except through a positional fallback.
pub fn resolve_columns(headers: &[String], schema: &RecordSchema) -> ColumnResolution {
    let header_keys = headers.iter().map(|h| match_key(h)).collect_vec();
    let mut chosen: Vec<Option<(usize, ResolutionMethod)>> = vec![None; schema.fields.len()];
    let mut claimed = HashSet::new();

    for (slot, field) in schema.fields.iter().enumerate() {
        if let Some(idx) = exact_match(field, &header_keys, &claimed) {
            claimed.insert(idx);
            chosen[slot] = Some((idx, ResolutionMethod::Exact));
        }
    }

    for (slot, field) in schema.fields.iter().enumerate() {
        if chosen[slot].is_some() {
            continue;
        }
        if let Some(idx) = substring_match(field, &header_keys, &claimed) {
            claimed.insert(idx);
            chosen[slot] = Some((idx, ResolutionMethod::Substring));
        }
    }

    for (slot, field) in schema.fields.iter().enumerate() {
        if chosen[slot].is_some() {
            continue;
        }
        if let Some(position) = field.positional_fallback
            && headers.len() > position
        {
            if claimed.contains(&position) {
                warn!(
                    "Field '{}' falls back to column {} ('{}'), which another field already uses",
                    field.name, position, headers[position]
                );
            }
            claimed.insert(position);
            chosen[slot] = Some((position, ResolutionMethod::Positional));
        }
    }

    let mut taken: HashSet<String> = headers.iter().cloned().collect();
    let mut next_index = headers.len();
    let mut map = ColumnMap::default();
    let mut synthesized = Vec::new();

    for (slot, field) in schema.fields.iter().enumerate() {
        let resolved = match chosen[slot] {
            Some((index, method)) => ResolvedColumn {
                index,
                header: headers[index].clone(),
                method,
            },
            None => {
                let header = unique_header(field.name, &taken);
                taken.insert(header.clone());
                synthesized.push(SynthesizedColumn {
                    field: field.name,
                    header: header.clone(),
                });
                let index = next_index;
                next_index += 1;
                ResolvedColumn {
                    index,
                    header,
                    method: ResolutionMethod::Synthesized,
                }
            }
        };
        debug!(
            "Field '{}' -> column {} '{}' ({})",
            field.name,
            resolved.index,
            resolved.header,
            resolved.method.as_str()
        );
        map.columns.insert(field.name, resolved);
    }

    ColumnResolution { map, synthesized }
}
