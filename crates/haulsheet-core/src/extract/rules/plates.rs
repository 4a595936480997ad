//! License plate detection and recovery.
//!
//! Every identifier that leaves this module has passed the configured
//! whitelist; the engine never invents or accepts an unrecognized plate.
//! Block-level resolution runs a small ordered chain of strategies, and
//! the winning strategy is recorded alongside the plate.

use std::collections::BTreeSet;

use crate::models::config::PlateConfig;

use super::patterns::{
    BLOCK_ID, CONCATENATED_PLATE, PLATE_FALSE_POSITIVES, PLATE_HEADER, PLATE_TOKEN,
};

/// How far back (in characters) corruption recovery scans for a plate's
/// letter prefix ahead of its trailing digits.
const RECOVERY_WINDOW: usize = 12;

/// A resolved plate tagged with the strategy that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlateMatch {
    pub plate: String,
    pub strategy: &'static str,
}

impl PlateMatch {
    fn new(plate: String, strategy: &'static str) -> Self {
        Self { plate, strategy }
    }
}

/// Uppercase and trim a raw plate token.
pub fn normalize(token: &str) -> String {
    token.trim().to_uppercase()
}

/// Expense-label keywords (IFTA, PREPASS, ...) masquerade as plates once
/// uppercased; reject any token that starts with one.
pub fn is_false_positive(token: &str) -> bool {
    let upper = normalize(token);
    PLATE_FALSE_POSITIVES
        .iter()
        .any(|kw| upper.starts_with(kw))
}

/// Strategy 1: a whitelisted plate token appears verbatim in the text.
pub fn direct_match(text: &str, plates: &PlateConfig) -> Option<String> {
    PLATE_TOKEN
        .captures_iter(text)
        .map(|caps| normalize(&caps[1]))
        .find(|plate| !is_false_positive(plate) && plates.is_valid(plate))
}

/// Strategy 2: reconstruct a plate mangled by text-extraction artifacts.
///
/// Whitelist plates follow a letter-prefix + digits shape. If the text
/// contains the last two digits of a whitelist plate, and its prefix
/// letters appear in order within a short window before them, the plate
/// is considered present even when noise characters were interleaved
/// (e.g. "NaVpWpe9r327" for VW9327).
pub fn recover_corrupted(text: &str, plates: &PlateConfig) -> Option<String> {
    let upper = text.to_uppercase();
    plates
        .plates()
        .find(|plate| corrupted_plate_present(&upper, plate))
        .map(|plate| plate.to_string())
}

fn corrupted_plate_present(upper_text: &str, plate: &str) -> bool {
    let prefix: Vec<char> = plate.chars().take_while(|c| c.is_ascii_alphabetic()).collect();
    let digits: String = plate.chars().filter(|c| c.is_ascii_digit()).collect();
    if prefix.is_empty() || digits.len() < 2 {
        return false;
    }
    let tail = &digits[digits.len() - 2..];

    let chars: Vec<char> = upper_text.chars().collect();
    let tail_chars: Vec<char> = tail.chars().collect();

    for end in tail_chars.len()..=chars.len() {
        if chars[end - tail_chars.len()..end] != tail_chars[..] {
            continue;
        }
        let window_start = (end - tail_chars.len()).saturating_sub(RECOVERY_WINDOW);
        let window = &chars[window_start..end - tail_chars.len()];
        if prefix_in_order(window, &prefix) {
            return true;
        }
    }
    false
}

fn prefix_in_order(window: &[char], prefix: &[char]) -> bool {
    let mut needed = prefix.iter();
    let mut next = needed.next();
    for c in window {
        match next {
            Some(p) if *c == *p => next = needed.next(),
            Some(_) => {}
            None => break,
        }
    }
    next.is_none()
}

/// Strategy 3: fixed correction table for recurring garbled strings.
pub fn table_correction(text: &str, plates: &PlateConfig) -> Option<String> {
    let upper = text.to_uppercase();
    plates
        .corrections
        .iter()
        .find(|(garbled, _)| upper.contains(garbled.as_str()))
        .map(|(_, plate)| plate.clone())
}

/// Resolve a plate from a fragment of block text: direct match, then
/// corruption recovery, then the correction table. Recency and
/// first-plate fallbacks need allocator state and live with it.
pub fn match_in_text(text: &str, plates: &PlateConfig) -> Option<PlateMatch> {
    direct_match(text, plates)
        .map(|p| PlateMatch::new(p, "direct"))
        .or_else(|| recover_corrupted(text, plates).map(|p| PlateMatch::new(p, "corruption_recovery")))
        .or_else(|| table_correction(text, plates).map(|p| PlateMatch::new(p, "correction_table")))
}

/// Whitelisted plates named on the "Plate#:" header line.
pub fn plates_in_header(text: &str, plates: &PlateConfig) -> BTreeSet<String> {
    let mut found = BTreeSet::new();
    if let Some(caps) = PLATE_HEADER.captures(text) {
        for token in PLATE_TOKEN.captures_iter(&caps[1]) {
            let plate = normalize(&token[1]);
            if !is_false_positive(&plate) && plates.is_valid(&plate) {
                found.insert(plate);
            }
        }
    }
    found
}

/// Whitelisted plates found on block lines, including corrupted
/// renderings that recovery can reconstruct.
pub fn plates_in_blocks(text: &str, plates: &PlateConfig) -> BTreeSet<String> {
    let mut found = BTreeSet::new();
    for line in text.lines() {
        if !BLOCK_ID.is_match(line) {
            continue;
        }
        if let Some(plate) = direct_match(line, plates) {
            found.insert(plate);
        }
        if let Some(plate) = recover_corrupted(line, plates) {
            found.insert(plate);
        }
    }
    found
}

/// Whitelisted plates concatenated with adjacent free text, e.g.
/// "VereenVW1503" where a driver name merged into the plate.
pub fn concatenated_plates(text: &str, plates: &PlateConfig) -> BTreeSet<String> {
    CONCATENATED_PLATE
        .captures_iter(text)
        .map(|caps| normalize(&caps[2]))
        .filter(|plate| !is_false_positive(plate) && plates.is_valid(plate))
        .collect()
}

/// All distinct whitelisted plates detectable anywhere in the document.
pub fn distinct_plates(text: &str, plates: &PlateConfig) -> BTreeSet<String> {
    let mut found = plates_in_header(text, plates);
    found.extend(plates_in_blocks(text, plates));
    found.extend(concatenated_plates(text, plates));
    found
}
