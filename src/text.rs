//! Text normalization primitives shared by the canonicalization rules and
//! the reference index.
//!
//! Everything here is total: absent or odd input degrades to an empty or
//! unchanged string, never to an error.

use std::{borrow::Cow, sync::OnceLock};

use encoding_rs::WINDOWS_1252;
use regex::Regex;
use unicode_normalization::{UnicodeNormalization, char::is_combining_mark};

/// Characters that betray a Latin-1/Windows-1252 round trip gone wrong.
const MOJIBAKE_MARKERS: &[char] = &['Ã', '¢', '¡', 'Â', '§', '¥'];

/// Decomposes to NFD and drops every combining mark.
pub fn strip_accents(input: &str) -> String {
    input.nfd().filter(|ch| !is_combining_mark(*ch)).collect()
}

fn mojibake_score(candidate: &str) -> (i64, i64) {
    let markers = candidate
        .chars()
        .filter(|ch| MOJIBAKE_MARKERS.contains(ch))
        .count() as i64;
    let letters = candidate.chars().filter(|ch| ch.is_alphabetic()).count() as i64;
    (letters - 2 * markers, -(candidate.chars().count() as i64))
}

fn encode_latin1_lossy(input: &str) -> Vec<u8> {
    input
        .chars()
        .filter_map(|ch| u8::try_from(u32::from(ch)).ok())
        .collect()
}

fn decode_latin1(bytes: &[u8]) -> String {
    bytes.iter().map(|byte| char::from(*byte)).collect()
}

fn encode_cp1252_lossy(input: &str) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(input.len());
    let mut buf = [0u8; 4];
    for ch in input.chars() {
        if ch.is_ascii() {
            bytes.push(ch as u8);
            continue;
        }
        let (encoded, _, had_errors) = WINDOWS_1252.encode(ch.encode_utf8(&mut buf));
        if !had_errors {
            bytes.extend_from_slice(&encoded);
        }
    }
    bytes
}

fn decode_cp1252_lossy(bytes: &[u8]) -> String {
    // Bytes left undefined by Windows-1252 are dropped rather than passed through.
    let defined: Vec<u8> = bytes
        .iter()
        .copied()
        .filter(|byte| !matches!(byte, 0x81 | 0x8D | 0x8F | 0x90 | 0x9D))
        .collect();
    WINDOWS_1252
        .decode_without_bom_handling(&defined)
        .0
        .into_owned()
}

/// Re-reads `input` through the Latin-1/Windows-1252 pairs and keeps the
/// reading with the most letters and fewest mojibake markers.
///
/// Candidates are ranked by `(letters - 2 * markers, -length)`; the original
/// comes first, so it survives every tie. Input without markers is returned
/// as is.
pub fn repair_mojibake(input: &str) -> Cow<'_, str> {
    if !input.chars().any(|ch| MOJIBAKE_MARKERS.contains(&ch)) {
        return Cow::Borrowed(input);
    }
    let candidates = [
        decode_cp1252_lossy(&encode_latin1_lossy(input)),
        decode_latin1(&encode_cp1252_lossy(input)),
    ];
    let mut best: Option<String> = None;
    let mut best_score = mojibake_score(input);
    for candidate in candidates {
        let score = mojibake_score(&candidate);
        if score > best_score {
            best_score = score;
            best = Some(candidate);
        }
    }
    match best {
        Some(repaired) => Cow::Owned(repaired),
        None => Cow::Borrowed(input),
    }
}

/// Reduces free text to `[A-Za-z0-9 ]` with single spaces.
pub fn sanitize_text(input: &str, repair: bool) -> String {
    let repaired = if repair {
        repair_mojibake(input)
    } else {
        Cow::Borrowed(input)
    };
    let stripped = strip_accents(&repaired);
    let replaced: String = stripped
        .chars()
        .map(|ch| if ch.is_ascii_alphanumeric() { ch } else { ' ' })
        .collect();
    collapse_whitespace(&replaced)
}

pub fn collapse_whitespace(input: &str) -> String {
    input.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Upper-cases the first letter of every alphabetic run and lower-cases the rest.
pub fn title_case(input: &str) -> String {
    let mut output = String::with_capacity(input.len());
    let mut previous_alpha = false;
    for ch in input.chars() {
        if ch.is_alphabetic() {
            if previous_alpha {
                output.extend(ch.to_lowercase());
            } else {
                output.extend(ch.to_uppercase());
            }
            previous_alpha = true;
        } else {
            output.push(ch);
            previous_alpha = false;
        }
    }
    output
}

fn region_suffix_patterns() -> &'static [Regex; 2] {
    static PATTERNS: OnceLock<[Regex; 2]> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            Regex::new(r"\s*[-,]?\s*\([A-Z]{2}\)$").expect("parenthesized region pattern"),
            Regex::new(r"\s*[-,]?\s+[A-Z]{2}$").expect("separated region pattern"),
        ]
    })
}

/// Builds the lookup key for a place name.
///
/// The key is mojibake-repaired, accent-free and upper-cased. With
/// `strip_region_suffix` a trailing `(MG)`, ` - MG`, `, MG` or ` MG` is
/// dropped first. Anything that is not a letter, digit or space becomes a
/// space.
pub fn normalize_place_name(input: &str, strip_region_suffix: bool) -> String {
    let repaired = repair_mojibake(input);
    let mut key = strip_accents(&repaired).to_uppercase().trim().to_string();
    if strip_region_suffix {
        for pattern in region_suffix_patterns() {
            let stripped = pattern.replace(&key, "").into_owned();
            key = stripped;
        }
    }
    let replaced: String = key
        .chars()
        .map(|ch| if ch.is_alphanumeric() { ch } else { ' ' })
        .collect();
    collapse_whitespace(&replaced)
}
