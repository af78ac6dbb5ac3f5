//! Case-number canonicalisation for Chinese court docket identifiers.
//!
//! A canonical docket number looks like `(2020)皖05民终1584号`:
//!
//! - `(2020)`: bracketed 4-digit year
//! - `皖05`: court code (province abbreviation plus digits)
//! - `民终`: case-type tag (1–3 characters in practice)
//! - `1584`: sequence number
//! - `号`: terminator
//!
//! Questions mention docket numbers with every kind of noise: full-width or
//! square brackets, two-digit years, missing brackets, duplicated characters
//! from transcription (`22002200皖05民终1584号`), trailing `案`. The
//! [`CaseNumberNormalizer`] turns such text into the canonical form and
//! generates a ranked list of plausible corrections for lookup.
//!
//! Two bracket profiles exist in the registry: standard docket numbers use
//! ASCII parentheses, consumption-restriction docket numbers use full-width
//! parentheses.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;

use crate::text::{collapse_doubled, push_unique};

/// Terminator that closes every canonical docket number.
pub const TERMINATOR: char = '号';

/// Trailing disambiguation character sometimes appended in questions ("…号案").
const CASE_SUFFIX: char = '案';

/// Judgement-result annotation words stripped before canonicalisation.
const ANNOTATION_WORDS: &[&str] = &["判决", "判", "年"];

const OPENING: &[char] = &['(', '（', '[', '［', '【', '{', '｛', '〔', '〖'];
const CLOSING: &[char] = &[')', '）', ']', '］', '】', '}', '｝', '〕', '〗'];

static CANONICAL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[\(（](\d+)[\)）]([\x{4e00}-\x{9fa5}\d]+?)([\x{4e00}-\x{9fa5}]{1,4})(\d+)号$")
        .expect("canonical case number pattern")
});

static EMBEDDED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\((\d+)\)([\x{4e00}-\x{9fa5}\d]+?)([\x{4e00}-\x{9fa5}]{1,4})(\d+)号")
        .expect("embedded case number pattern")
});

static EMBEDDED_FULL_WIDTH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"（(\d{4})）([\x{4e00}-\x{9fa5}\d]+?)([\x{4e00}-\x{9fa5}]{1,4})(\d+)号")
        .expect("full-width case number pattern")
});

/// Bracket profile used when rendering a canonical docket number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BracketStyle {
    /// `(2020)…号`, used by judgement documents.
    Ascii,
    /// `（2020）…号`, used by legal abstracts and consumption-restriction records.
    FullWidth,
}

impl BracketStyle {
    pub fn open(self) -> char {
        match self {
            Self::Ascii => '(',
            Self::FullWidth => '（',
        }
    }

    pub fn close(self) -> char {
        match self {
            Self::Ascii => ')',
            Self::FullWidth => '）',
        }
    }

    /// Rewrite every bracket variant in `s` into this style.
    pub fn apply(self, s: &str) -> String {
        s.chars()
            .map(|c| {
                if OPENING.contains(&c) {
                    self.open()
                } else if CLOSING.contains(&c) {
                    self.close()
                } else {
                    c
                }
            })
            .collect()
    }
}

/// A parsed canonical docket number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaseNumber {
    pub year: String,
    pub court_code: String,
    pub case_type: String,
    pub sequence_number: String,
}

impl CaseNumber {
    /// Parse a canonical docket number in either bracket style.
    pub fn parse(s: &str) -> Option<Self> {
        let caps = CANONICAL.captures(s)?;
        Some(Self {
            year: caps[1].to_string(),
            court_code: caps[2].to_string(),
            case_type: caps[3].to_string(),
            sequence_number: caps[4].to_string(),
        })
    }

    /// Render with the given bracket style.
    pub fn render(&self, style: BracketStyle) -> String {
        format!(
            "{}{}{}{}{}{}{}",
            style.open(),
            self.year,
            style.close(),
            self.court_code,
            self.case_type,
            self.sequence_number,
            TERMINATOR
        )
    }
}

impl fmt::Display for CaseNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render(BracketStyle::Ascii))
    }
}

/// Deterministic docket-number canonicaliser for one bracket profile.
#[derive(Debug, Clone, Copy)]
pub struct CaseNumberNormalizer {
    style: BracketStyle,
}

impl CaseNumberNormalizer {
    /// Profile for judgement documents (ASCII parentheses).
    pub const STANDARD: Self = Self {
        style: BracketStyle::Ascii,
    };

    /// Profile for consumption-restriction records (full-width parentheses).
    pub const RESTRICTION: Self = Self {
        style: BracketStyle::FullWidth,
    };

    pub fn style(&self) -> BracketStyle {
        self.style
    }

    /// Strip noise and leave at most one bracket pair around the leading year.
    ///
    /// Idempotent: `normalize(normalize(x)) == normalize(x)`.
    pub fn normalize(&self, raw: &str) -> String {
        let mut s: String = raw
            .chars()
            .filter(|c| !c.is_whitespace() && *c != ',' && *c != '，')
            .collect();
        for word in ANNOTATION_WORDS {
            s = s.replace(word, "");
        }

        let had_bracket = s.chars().any(|c| OPENING.contains(&c) || CLOSING.contains(&c));
        let bare: String = s
            .chars()
            .filter(|c| !OPENING.contains(c) && !CLOSING.contains(c))
            .collect();
        if !had_bracket {
            return bare;
        }

        let digits: String = bare.chars().take_while(|c| c.is_ascii_digit()).collect();
        if digits.is_empty() {
            return bare;
        }
        format!(
            "{}{}{}{}",
            self.style.open(),
            digits,
            self.style.close(),
            &bare[digits.len()..]
        )
    }

    /// Repair the year and bracket structure and force the terminator.
    ///
    /// A two-digit year becomes `20YY`; a missing bracket pair is inserted
    /// around the leading numeral run (or around the first four characters
    /// when the number has no leading year).
    pub fn correct(&self, raw: &str) -> String {
        let mut rest = raw.trim();
        if let Some(c) = rest.chars().next()
            && OPENING.contains(&c)
        {
            rest = &rest[c.len_utf8()..];
        }

        let digits_end = rest
            .char_indices()
            .find(|(_, c)| !c.is_ascii_digit())
            .map(|(i, _)| i)
            .unwrap_or(rest.len());
        let digits = &rest[..digits_end];
        let mut tail = &rest[digits_end..];

        let mut out = String::with_capacity(raw.len() + 8);
        if digits.is_empty() {
            // No year: bracket the first four characters of whatever is there.
            let body: String = tail.chars().filter(|c| !CLOSING.contains(c)).collect();
            let split = body
                .char_indices()
                .nth(4)
                .map(|(i, _)| i)
                .unwrap_or(body.len());
            out.push(self.style.open());
            out.push_str(&body[..split]);
            out.push(self.style.close());
            out.push_str(&body[split..]);
        } else {
            if let Some(c) = tail.chars().next()
                && CLOSING.contains(&c)
            {
                tail = &tail[c.len_utf8()..];
            }
            out.push(self.style.open());
            if digits.len() == 2 {
                out.push_str("20");
            }
            out.push_str(digits);
            out.push(self.style.close());
            out.push_str(tail);
        }

        if out.ends_with(CASE_SUFFIX) {
            out.pop();
        }
        if !out.ends_with(TERMINATOR) {
            out.push(TERMINATOR);
        }
        out
    }

    /// `correct(normalize(raw))`.
    pub fn canonicalize(&self, raw: &str) -> String {
        self.correct(&self.normalize(raw))
    }

    /// Canonical form plus de-duplicated-character variants, in try order.
    ///
    /// The canonical form always comes first. Year variants that are not
    /// four digits and case-type variants longer than three characters are
    /// dropped before the cartesian product is taken.
    pub fn augment(&self, raw: &str) -> Vec<String> {
        let canonical = self.canonicalize(raw);
        let mut out = vec![canonical.clone()];

        let Some(parsed) = CaseNumber::parse(&canonical) else {
            return out;
        };

        let years = variants(&parsed.year, |y| y.chars().count() == 4);
        let courts = variants(&parsed.court_code, |_| true);
        let types = variants(&parsed.case_type, |t| t.chars().count() <= 3);

        for year in &years {
            for court_code in &courts {
                for case_type in &types {
                    let candidate = CaseNumber {
                        year: year.clone(),
                        court_code: court_code.clone(),
                        case_type: case_type.clone(),
                        sequence_number: parsed.sequence_number.clone(),
                    };
                    push_unique(&mut out, candidate.render(self.style));
                }
            }
        }
        out
    }
}

/// Original value and its collapsed form, deduplicated, filtered by `keep`.
fn variants(value: &str, keep: impl Fn(&str) -> bool) -> Vec<String> {
    let mut out = Vec::with_capacity(2);
    for v in [value.to_string(), collapse_doubled(value)] {
        if keep(&v) {
            push_unique(&mut out, v);
        }
    }
    out
}

/// First ASCII-bracketed docket number embedded in free text.
pub fn find_in_text(text: &str) -> Option<CaseNumber> {
    let caps = EMBEDDED.captures(text)?;
    Some(CaseNumber {
        year: caps[1].to_string(),
        court_code: caps[2].to_string(),
        case_type: caps[3].to_string(),
        sequence_number: caps[4].to_string(),
    })
}

/// Rewrite full-width-bracketed docket numbers in free text to ASCII brackets.
pub fn ascii_brackets_in_text(text: &str) -> String {
    EMBEDDED_FULL_WIDTH
        .replace_all(text, "(${1})${2}${3}${4}号")
        .into_owned()
}
