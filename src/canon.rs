//! Field-level canonicalization rules.
//!
//! Every function here is total: malformed input yields a best-effort
//! canonical form (or an empty string), never an error.

use std::{str::FromStr, sync::OnceLock};

use regex::Regex;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::data::CellValue;

pub const PERSON_ID_DIGITS: usize = 11;
pub const ORGANIZATION_ID_DIGITS: usize = 14;
pub const POSTAL_CODE_DIGITS: usize = 8;
pub const MAX_PHONE_DIGITS: usize = 11;

/// Literal token written when an address carries no street number.
pub const NO_NUMBER_TOKEN: &str = "SN";

fn numeric_literal() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[+-]?[0-9]+(\.[0-9]+)?([eE][+-]?[0-9]+)?$").expect("numeric literal pattern")
    })
}

fn trailing_zero_fraction() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[0-9]+\.0$").expect("trailing .0 pattern"))
}

fn only_digits(value: &str) -> String {
    value.chars().filter(char::is_ascii_digit).collect()
}

/// Widest integer a shifted literal may expand to; anything larger is no
/// spreadsheet export and keeps its raw digits.
const MAX_SHIFTED_DIGITS: usize = 309;

/// Rounds a numeric literal (plain or scientific) to its integer text.
fn integer_text(literal: &str) -> Option<String> {
    let parsed = if literal.contains(['e', 'E']) {
        Decimal::from_scientific(literal).ok()
    } else {
        Decimal::from_str(literal).ok()
    };
    match parsed {
        Some(value) => Some(value.round().to_string()),
        None => shift_integer_digits(literal),
    }
}

/// Integer digits of a literal too large or too precise for `Decimal`,
/// found by moving the decimal point by the exponent. The fraction is
/// truncated.
fn shift_integer_digits(literal: &str) -> Option<String> {
    let unsigned = literal.trim_start_matches(['+', '-']);
    let (mantissa, exponent) = match unsigned.split_once(['e', 'E']) {
        Some((mantissa, exponent)) => (mantissa, exponent.parse::<i64>().ok()?),
        None => (unsigned, 0),
    };
    let (whole, fraction) = mantissa.split_once('.').unwrap_or((mantissa, ""));
    let digits = format!("{whole}{fraction}");
    let point = (whole.len() as i64).checked_add(exponent)?;
    let integer = if point <= 0 {
        String::new()
    } else {
        let point = usize::try_from(point).ok()?;
        if point > MAX_SHIFTED_DIGITS {
            return None;
        }
        if point >= digits.len() {
            format!("{digits}{}", "0".repeat(point - digits.len()))
        } else {
            digits[..point].to_string()
        }
    };
    Some(match integer.trim_start_matches('0') {
        "" => "0".to_string(),
        significant => significant.to_string(),
    })
}

/// Extracts the digits of a cell, undoing spreadsheet export artifacts.
///
/// Numbers are rendered without decimals; text such as `12345.0` or
/// `2.0579080544e10` is first read back as an integer.
pub fn extract_digits(value: &CellValue) -> String {
    match value {
        CellValue::Empty => String::new(),
        CellValue::Number(n) if n.is_nan() => String::new(),
        CellValue::Number(n) => only_digits(&format!("{n:.0}")),
        CellValue::Text(text) => extract_digits_from_str(text),
    }
}

pub fn extract_digits_from_str(text: &str) -> String {
    let mut trimmed = text.trim();
    if trailing_zero_fraction().is_match(trimmed) {
        trimmed = &trimmed[..trimmed.len() - 2];
    }
    if numeric_literal().is_match(trimmed)
        && let Some(integer) = integer_text(trimmed)
    {
        return only_digits(&integer);
    }
    only_digits(trimmed)
}

fn pad_left(digits: &str, width: usize) -> String {
    format!("{digits:0>width$}")
}

fn person_id_mask(d: &str) -> String {
    format!("{}.{}.{}-{}", &d[0..3], &d[3..6], &d[6..9], &d[9..11])
}

fn organization_id_mask(d: &str) -> String {
    format!(
        "{}.{}.{}/{}-{}",
        &d[0..2],
        &d[2..5],
        &d[5..8],
        &d[8..12],
        &d[12..14]
    )
}

/// Masks a person (11 digits) or organization (14 digits) tax ID.
///
/// Short person IDs are zero-padded to 11 digits and 12-13 digit values to
/// 14. Anything longer than 14 digits comes back as bare digits.
pub fn mask_tax_id(raw: &CellValue) -> String {
    let digits = extract_digits(raw);
    match digits.len() {
        0 => String::new(),
        1..=PERSON_ID_DIGITS => person_id_mask(&pad_left(&digits, PERSON_ID_DIGITS)),
        12..=ORGANIZATION_ID_DIGITS => {
            organization_id_mask(&pad_left(&digits, ORGANIZATION_ID_DIGITS))
        }
        _ => digits,
    }
}

fn postal_code_mask(d: &str) -> String {
    format!("{}-{}", &d[0..5], &d[5..8])
}

/// Masks a postal code as `XXXXX-XXX`, borrowing the fallback's digits when
/// the raw value has none.
pub fn mask_postal_code(raw: &CellValue, fallback: &str) -> String {
    let mut digits = extract_digits(raw);
    if digits.is_empty() {
        digits = extract_digits_from_str(fallback);
    }
    let normalized = if digits.len() > POSTAL_CODE_DIGITS {
        digits[digits.len() - POSTAL_CODE_DIGITS..].to_string()
    } else {
        pad_left(&digits, POSTAL_CODE_DIGITS)
    };
    postal_code_mask(&normalized)
}

/// What to emit for phone numbers shorter than the accepted minimum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ShortPhonePolicy {
    KeepDigits,
    Blank,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhoneRules {
    pub min_digits: usize,
    pub short_numbers: ShortPhonePolicy,
    /// Put a space between the area code and the number.
    pub spaced: bool,
}

impl Default for PhoneRules {
    fn default() -> Self {
        Self {
            min_digits: 8,
            short_numbers: ShortPhonePolicy::KeepDigits,
            spaced: false,
        }
    }
}

/// Reduces an area code to exactly two digits (`00` when none).
pub fn normalize_area_code(raw: &str) -> String {
    let digits = extract_digits_from_str(raw);
    let padded = pad_left(&digits, 2);
    padded[padded.len() - 2..].to_string()
}

fn format_phone(area: &str, local: &str, spaced: bool) -> String {
    let split = local.len() - 4;
    let separator = if spaced { " " } else { "" };
    format!("({area}){separator}{}-{}", &local[..split], &local[split..])
}

/// Masks a phone number as `(DD)XXXX-XXXX` or `(DD)XXXXX-XXXX`.
///
/// Local 8 and 9 digit numbers borrow `default_area_code`.
pub fn mask_phone(raw: &CellValue, default_area_code: &str, rules: &PhoneRules) -> String {
    let mut digits = extract_digits(raw);
    if digits.is_empty() {
        return String::new();
    }
    if digits.len() > MAX_PHONE_DIGITS {
        digits = digits[digits.len() - MAX_PHONE_DIGITS..].to_string();
    }
    if digits.len() < rules.min_digits {
        return match rules.short_numbers {
            ShortPhonePolicy::KeepDigits => digits,
            ShortPhonePolicy::Blank => String::new(),
        };
    }
    match digits.len() {
        8 | 9 => format_phone(&normalize_area_code(default_area_code), &digits, rules.spaced),
        10 | 11 => format_phone(&digits[..2], &digits[2..], rules.spaced),
        _ => digits,
    }
}

/// A street number pulled off the end of an address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressNumber {
    pub number: String,
    pub remainder: String,
}

fn no_number_suffix() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\bS[/\s]*N\.?$").expect("no-number pattern"))
}

fn digit_suffix() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\d+$").expect("digit suffix pattern"))
}

fn trim_trailing_separators(value: &str) -> &str {
    value.trim_end_matches(|ch: char| matches!(ch, '.' | ',' | ';' | ':') || ch.is_whitespace())
}

/// Splits a trailing street number (or the `S/N` no-number token) off an
/// address.
///
/// Returns `None` when the address ends in neither. A name that happens to
/// end in digits loses them too.
pub fn extract_address_number(address: &str) -> Option<AddressNumber> {
    let upper = address.trim().to_uppercase();
    let base = trim_trailing_separators(&upper);
    if base.is_empty() {
        return None;
    }
    let (number, start) = if let Some(found) = no_number_suffix().find(base) {
        (NO_NUMBER_TOKEN.to_string(), found.start())
    } else if let Some(found) = digit_suffix().find(base) {
        (found.as_str().to_string(), found.start())
    } else {
        return None;
    };
    let remainder = trim_trailing_separators(&base[..start]).to_string();
    Some(AddressNumber { number, remainder })
}
