//! Reference table of municipalities and the lookup index built from it.
//!
//! The reference file is headerless. Its columns are either read at fixed
//! positions ([`ReferenceStrategy::Fixed`]) or assigned by scoring the
//! content of every column ([`ReferenceStrategy::AutoDetect`]).
//!
//! ## Scoring
//!
//! Each scanned column gets three scores, one per role:
//!
//! - **code**: cells that are exactly seven digits,
//! - **region**: cells that are exactly two ASCII letters,
//! - **name**: cells with at least three letters making up 80 % or more of
//!   their alphanumerics.
//!
//! Roles are assigned in the order code, region, name. Each role takes the
//! highest-scoring column not already taken; equal scores go to the lower
//! index, and a zero score never wins.

use std::{
    collections::HashMap,
    path::{Path, PathBuf},
};

use encoding_rs::Encoding;
use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::{
    canon::extract_digits_from_str,
    error::SetupError,
    io_utils,
    text::normalize_place_name,
};

pub const CODE_DIGITS: usize = 7;
pub const DEFAULT_SCAN_WIDTH: usize = 12;
const NAME_MIN_LETTERS: usize = 3;
const NAME_MIN_LETTER_PERCENT: usize = 80;
const CSV_DELIMITER_CANDIDATES: &[u8] = b",;";

/// Column layout for references whose conventions are known.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FixedLayout {
    pub name_column: usize,
    pub code_column: usize,
    #[serde(default)]
    pub region_column: Option<usize>,
    #[serde(default)]
    pub strip_region_suffix: bool,
}

impl Default for FixedLayout {
    fn default() -> Self {
        Self {
            name_column: 3,
            code_column: 1,
            region_column: None,
            strip_region_suffix: false,
        }
    }
}

impl FixedLayout {
    pub fn min_columns(&self) -> usize {
        self.name_column
            .max(self.code_column)
            .max(self.region_column.unwrap_or(0))
            + 1
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceStrategy {
    Fixed(FixedLayout),
    AutoDetect { scan_width: usize },
}

impl ReferenceStrategy {
    pub fn min_columns(&self) -> usize {
        match self {
            ReferenceStrategy::Fixed(layout) => layout.min_columns(),
            ReferenceStrategy::AutoDetect { .. } => 2,
        }
    }
}

/// One role's score for one column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct ScoredColumn {
    pub score: usize,
    pub index: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ColumnScores {
    pub code: usize,
    pub region: usize,
    pub name: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ReferenceRoles {
    pub code: usize,
    pub name: usize,
    pub region: Option<usize>,
}

pub fn looks_like_code(cell: &str) -> bool {
    let trimmed = cell.trim();
    let numeric = trimmed.strip_suffix(".0").unwrap_or(trimmed);
    numeric.len() == CODE_DIGITS && numeric.chars().all(|ch| ch.is_ascii_digit())
}

pub fn looks_like_region(cell: &str) -> bool {
    let trimmed = cell.trim();
    trimmed.len() == 2 && trimmed.chars().all(|ch| ch.is_ascii_alphabetic())
}

pub fn looks_like_name(cell: &str) -> bool {
    let letters = cell.chars().filter(|ch| ch.is_alphabetic()).count();
    let digits = cell.chars().filter(|ch| ch.is_numeric()).count();
    letters >= NAME_MIN_LETTERS
        && letters * 100 >= (letters + digits) * NAME_MIN_LETTER_PERCENT
}

/// Scores the first `scan_width` columns of `rows` against every role.
pub fn score_columns(rows: &[Vec<String>], scan_width: usize) -> Vec<ColumnScores> {
    let width = rows
        .iter()
        .map(Vec::len)
        .max()
        .unwrap_or(0)
        .min(scan_width);
    let mut scores = vec![ColumnScores::default(); width];
    for row in rows {
        for (cell, score) in row.iter().zip(scores.iter_mut()) {
            if looks_like_code(cell) {
                score.code += 1;
            }
            if looks_like_region(cell) {
                score.region += 1;
            }
            if looks_like_name(cell) {
                score.name += 1;
            }
        }
    }
    scores
}

/// Picks the best unclaimed column for one role.
///
/// Higher score wins; on equal scores the first scanned column wins.
pub fn pick_role(
    scores: &[ColumnScores],
    claimed: &[usize],
    role: impl Fn(&ColumnScores) -> usize,
) -> Option<ScoredColumn> {
    scores
        .iter()
        .enumerate()
        .filter(|(index, _)| !claimed.contains(index))
        .map(|(index, column)| ScoredColumn {
            score: role(column),
            index,
        })
        .filter(|candidate| candidate.score > 0)
        .fold(None, |best: Option<ScoredColumn>, candidate| match best {
            Some(current) if current.score >= candidate.score => Some(current),
            _ => Some(candidate),
        })
}

/// Assigns the code, region and name roles from content alone.
pub fn detect_roles(
    rows: &[Vec<String>],
    scan_width: usize,
) -> Result<ReferenceRoles, SetupError> {
    let scores = score_columns(rows, scan_width);
    let code = pick_role(&scores, &[], |s| s.code)
        .ok_or(SetupError::ReferenceRoleUndetected { role: "municipal code" })?;
    let region = pick_role(&scores, &[code.index], |s| s.region);
    let mut claimed = vec![code.index];
    claimed.extend(region.map(|r| r.index));
    let name = pick_role(&scores, &claimed, |s| s.name)
        .ok_or(SetupError::ReferenceRoleUndetected { role: "place name" })?;
    debug!(
        "Detected reference roles: code={} ({}), name={} ({}), region={:?}",
        code.index, code.score, name.index, name.score, region
    );
    Ok(ReferenceRoles {
        code: code.index,
        name: name.index,
        region: region.map(|r| r.index),
    })
}

/// Digits of a municipal code, left-padded to seven; `None` when malformed.
pub fn normalize_code(raw: &str) -> Option<String> {
    let digits = extract_digits_from_str(raw);
    if digits.is_empty() || digits.len() > CODE_DIGITS {
        return None;
    }
    Some(format!("{digits:0>width$}", width = CODE_DIGITS))
}

pub fn normalize_region(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    looks_like_region(trimmed).then(|| trimmed.to_ascii_uppercase())
}

/// Bidirectional lookups between place names, codes and regions.
#[derive(Debug, Clone, Default)]
pub struct ReferenceIndex {
    name_to_code: HashMap<String, String>,
    code_to_name: HashMap<String, String>,
    code_to_region: HashMap<String, String>,
    name_to_region: HashMap<String, String>,
    strip_region_suffix: bool,
    skipped_rows: usize,
}

impl ReferenceIndex {
    /// Builds the index from decoded rows. Rows lacking a usable name or
    /// code are skipped; later rows overwrite earlier ones.
    pub fn build(rows: &[Vec<String>], roles: ReferenceRoles, strip_region_suffix: bool) -> Self {
        let mut index = ReferenceIndex {
            strip_region_suffix,
            ..Default::default()
        };
        for row in rows {
            let cell = |column: usize| row.get(column).map(String::as_str).unwrap_or("");
            let name = normalize_place_name(cell(roles.name), strip_region_suffix);
            let Some(code) = normalize_code(cell(roles.code)) else {
                index.skipped_rows += 1;
                continue;
            };
            if name.is_empty() {
                index.skipped_rows += 1;
                continue;
            }
            if let Some(region) = roles.region.and_then(|column| normalize_region(cell(column))) {
                index.code_to_region.insert(code.clone(), region.clone());
                index.name_to_region.insert(name.clone(), region);
            }
            index.code_to_name.insert(code.clone(), name.clone());
            index.name_to_code.insert(name, code);
        }
        index
    }

    /// Normalizes a place name the same way the index keys were built.
    pub fn name_key(&self, name: &str) -> String {
        normalize_place_name(name, self.strip_region_suffix)
    }

    pub fn code_for_name(&self, name: &str) -> Option<&str> {
        self.name_to_code.get(&self.name_key(name)).map(String::as_str)
    }

    pub fn name_for_code(&self, code: &str) -> Option<&str> {
        normalize_code(code)
            .and_then(|code| self.code_to_name.get(&code))
            .map(String::as_str)
    }

    pub fn region_for_code(&self, code: &str) -> Option<&str> {
        normalize_code(code)
            .and_then(|code| self.code_to_region.get(&code))
            .map(String::as_str)
    }

    pub fn region_for_name(&self, name: &str) -> Option<&str> {
        self.name_to_region
            .get(&self.name_key(name))
            .map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.code_to_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.code_to_name.is_empty()
    }

    pub fn skipped_rows(&self) -> usize {
        self.skipped_rows
    }
}

/// Where and how to read the reference table.
#[derive(Debug, Clone)]
pub struct ReferenceSource {
    pub path: PathBuf,
    pub delimiter: Option<u8>,
    pub encoding: &'static Encoding,
}

fn unreadable(path: &Path, err: impl std::fmt::Display) -> SetupError {
    SetupError::ReferenceUnreadable {
        path: path.to_path_buf(),
        reason: err.to_string(),
    }
}

fn row_width(rows: &[Vec<String>]) -> usize {
    rows.iter().map(Vec::len).max().unwrap_or(0)
}

/// Reads the reference rows, trying `,` then `;` when no delimiter is given.
/// The first delimiter yielding `min_columns` wins.
pub fn read_reference_rows(
    source: &ReferenceSource,
    min_columns: usize,
) -> Result<Vec<Vec<String>>, SetupError> {
    let path = source.path.as_path();
    if !path.is_file() {
        return Err(SetupError::ReferenceMissing(path.to_path_buf()));
    }
    io_utils::ensure_delimited_text(path)?;

    let candidates: Vec<u8> = match source.delimiter {
        Some(delimiter) => vec![delimiter],
        None => CSV_DELIMITER_CANDIDATES.to_vec(),
    };
    let mut widest = 0;
    let mut last_error = None;
    for delimiter in candidates {
        match io_utils::read_headerless_rows(path, delimiter, source.encoding) {
            Ok(rows) => {
                let width = row_width(&rows);
                if width >= min_columns {
                    debug!(
                        "Reference {:?} read with delimiter '{}' ({} column(s))",
                        path,
                        crate::printable_delimiter(delimiter),
                        width
                    );
                    return Ok(rows);
                }
                widest = widest.max(width);
            }
            Err(err) => last_error = Some(format!("{err:#}")),
        }
    }
    match (widest, last_error) {
        (0, Some(reason)) => Err(unreadable(path, reason)),
        _ => Err(SetupError::ReferenceTooNarrow {
            path: path.to_path_buf(),
            found: widest,
            required: min_columns,
        }),
    }
}

/// Loads the reference table and builds its index with the given strategy.
pub fn load_reference(
    source: &ReferenceSource,
    strategy: &ReferenceStrategy,
) -> Result<ReferenceIndex, SetupError> {
    let rows = read_reference_rows(source, strategy.min_columns())?;
    let (roles, strip_suffix) = match strategy {
        ReferenceStrategy::Fixed(layout) => (
            ReferenceRoles {
                code: layout.code_column,
                name: layout.name_column,
                region: layout.region_column,
            },
            layout.strip_region_suffix,
        ),
        ReferenceStrategy::AutoDetect { scan_width } => (detect_roles(&rows, *scan_width)?, true),
    };
    let index = ReferenceIndex::build(&rows, roles, strip_suffix);
    info!(
        "Reference index holds {} municipality(ies) from {:?} ({} row(s) skipped)",
        index.len(),
        source.path,
        index.skipped_rows()
    );
    Ok(index)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rows(data: &[&[&str]]) -> Vec<Vec<String>> {
        data.iter()
            .map(|row| row.iter().map(|cell| cell.to_string()).collect())
            .collect()
    }

    fn sample_rows() -> Vec<Vec<String>> {
        rows(&[
            &["3106200", "MG", "Belo Horizonte (MG)", "31"],
            &["3550308", "SP", "São Paulo", "35"],
            &["3304557", "RJ", "Rio de Janeiro - RJ", "33"],
        ])
    }

    #[test]
    fn auto_detect_ignores_positional_convention() {
        let roles = detect_roles(&sample_rows(), DEFAULT_SCAN_WIDTH).unwrap();
        assert_eq!(roles.code, 0);
        assert_eq!(roles.name, 2);
        assert_eq!(roles.region, Some(1));
    }

    #[test]
    fn pick_role_prefers_first_column_on_ties() {
        let scores = vec![
            ColumnScores { code: 2, region: 0, name: 0 },
            ColumnScores { code: 2, region: 0, name: 0 },
        ];
        assert_eq!(pick_role(&scores, &[], |s| s.code), Some(ScoredColumn { score: 2, index: 0 }));
        assert_eq!(pick_role(&scores, &[0], |s| s.code), Some(ScoredColumn { score: 2, index: 1 }));
        assert_eq!(pick_role(&scores, &[], |s| s.name), None);
    }

    #[test]
    fn detection_fails_without_codes() {
        let data = rows(&[&["Belo Horizonte", "MG"], &["Contagem", "MG"]]);
        assert!(matches!(
            detect_roles(&data, DEFAULT_SCAN_WIDTH),
            Err(SetupError::ReferenceRoleUndetected { .. })
        ));
    }

    #[test]
    fn scan_width_bounds_scoring() {
        let scores = score_columns(&sample_rows(), 2);
        assert_eq!(scores.len(), 2);
        assert_eq!(scores[0].code, 3);
        assert_eq!(scores[1].region, 3);
    }

    #[test]
    fn index_supports_every_direction() {
        let roles = detect_roles(&sample_rows(), DEFAULT_SCAN_WIDTH).unwrap();
        let index = ReferenceIndex::build(&sample_rows(), roles, true);
        assert_eq!(index.len(), 3);
        assert_eq!(index.code_for_name("belo horizonte"), Some("3106200"));
        assert_eq!(index.code_for_name("Sao Paulo - SP"), Some("3550308"));
        assert_eq!(index.name_for_code("3304557"), Some("RIO DE JANEIRO"));
        assert_eq!(index.region_for_code("3304557.0"), Some("RJ"));
        assert_eq!(index.region_for_name("SÃO PAULO"), Some("SP"));
        assert_eq!(index.code_for_name("Contagem"), None);
    }

    #[test]
    fn malformed_rows_are_dropped() {
        let data = rows(&[
            &["x", "310620", "", "Belo Horizonte"],
            &["x", "12345678", "", "Grande Demais"],
            &["x", "", "", "Sem Codigo"],
            &["x", "3550308", "", ""],
        ]);
        let index = ReferenceIndex::build(
            &data,
            ReferenceRoles { code: 1, name: 3, region: None },
            false,
        );
        assert_eq!(index.len(), 1);
        assert_eq!(index.skipped_rows(), 3);
        assert_eq!(index.code_for_name("BELO HORIZONTE"), Some("0310620"));
        assert_eq!(index.region_for_code("0310620"), None);
    }

    #[test]
    fn normalizers_enforce_shapes() {
        assert_eq!(normalize_code("310620"), Some("0310620".into()));
        assert_eq!(normalize_code("3106200.0"), Some("3106200".into()));
        assert_eq!(normalize_code("31062001"), None);
        assert_eq!(normalize_region(" mg "), Some("MG".into()));
        assert_eq!(normalize_region("MGS"), None);
    }

    #[test]
    fn fixed_layout_requires_enough_columns() {
        assert_eq!(FixedLayout::default().min_columns(), 4);
        let layout = FixedLayout {
            region_column: Some(5),
            ..FixedLayout::default()
        };
        assert_eq!(layout.min_columns(), 6);
    }
}
