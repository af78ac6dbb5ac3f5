//! Small text helpers shared by the normalizers, filters and candidate generators.
//!
//! Lengths are always measured in code points, never bytes: every registry
//! field is CJK text and the resolution heuristics ("≤4 characters means an
//! abbreviation") are stated in characters.

/// Number of code points in `s`.
pub fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// Collapse runs of identical adjacent characters into a single character.
///
/// Repairs transcription duplication: `22002200` → `2020`, `粤粤03` → `粤03`,
/// `民民终终` → `民终`. Digits are collapsed too.
pub fn collapse_doubled(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut prev: Option<char> = None;
    for c in s.chars() {
        if prev != Some(c) {
            out.push(c);
        }
        prev = Some(c);
    }
    out
}

pub fn has_digits(s: &str) -> bool {
    s.chars().any(|c| c.is_ascii_digit())
}

pub fn no_digits(s: &str) -> bool {
    !has_digits(s)
}

/// True for a non-empty string made only of ASCII digits.
pub fn all_digits(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_digit())
}

/// True when `s` contains no CJK ideographs.
pub fn no_chinese(s: &str) -> bool {
    !s.chars().any(is_cjk)
}

/// CJK unified ideograph in the basic block used by registry text.
pub fn is_cjk(c: char) -> bool {
    ('\u{4e00}'..='\u{9fa5}').contains(&c)
}

/// Remove the first occurrence of `needle`, if any.
pub fn remove_first(s: &str, needle: &str) -> String {
    s.replacen(needle, "", 1)
}

/// Push `item` unless it is already present, preserving first-seen order.
pub fn push_unique(list: &mut Vec<String>, item: String) {
    if !list.contains(&item) {
        list.push(item);
    }
}
