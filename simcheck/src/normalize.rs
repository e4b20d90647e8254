//! Canonicalization of extracted text into a comparison-stable token sequence.
use std::fmt;
use std::ops::Range;

use serde::{Deserialize, Serialize};
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

const TATWEEL: char = '\u{0640}';

/// Dominant script of a document, which decides the letter-folding rules.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Script {
    /// More Arabic letters than other letters.
    Arabic,
    /// Everything else.
    General,
}

impl fmt::Display for Script {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Arabic => f.write_str("arabic"),
            Self::General => f.write_str("general"),
        }
    }
}

/// Normalized text of a non-empty document.
///
/// `text` is always the tokens joined by single spaces, so it is serialized alone and the
/// tokens are rebuilt on deserialization.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "NormalizedTextRepr", into = "NormalizedTextRepr")]
pub struct NormalizedText {
    text: String,
    tokens: Vec<String>,
    script: Script,
}

#[derive(Serialize, Deserialize)]
struct NormalizedTextRepr {
    text: String,
    script: Script,
}

impl From<NormalizedTextRepr> for NormalizedText {
    fn from(repr: NormalizedTextRepr) -> Self {
        let tokens = repr
            .text
            .split(' ')
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .collect();
        Self {
            text: repr.text,
            tokens,
            script: repr.script,
        }
    }
}

impl From<NormalizedText> for NormalizedTextRepr {
    fn from(normalized: NormalizedText) -> Self {
        Self {
            text: normalized.text,
            script: normalized.script,
        }
    }
}

impl NormalizedText {
    /// Gets the canonical text.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Gets the word tokens.
    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }

    /// Gets the detected script.
    pub const fn script(&self) -> Script {
        self.script
    }

    /// Gets the number of tokens.
    pub fn word_count(&self) -> usize {
        self.tokens.len()
    }

    /// Joins the tokens in `range` (clamped to the document) by spaces,
    /// truncated to `max_chars` characters.
    pub fn excerpt(&self, range: Range<usize>, max_chars: usize) -> String {
        let end = range.end.min(self.tokens.len());
        let start = range.start.min(end);
        let joined = self.tokens[start..end].join(" ");
        if joined.chars().count() <= max_chars {
            joined
        } else {
            let mut truncated: String = joined.chars().take(max_chars).collect();
            truncated.push('…');
            truncated
        }
    }
}

/// Normalizes raw extracted text.
///
/// Returns `None` if no token survives, which callers must treat as an empty document
/// rather than fingerprinting it.
///
/// # Examples
///
/// ```
/// use simcheck::normalize::normalize;
///
/// let n = normalize("  Héllo,\tWORLD!\n").unwrap();
/// assert_eq!(n.text(), "hello world");
/// assert!(normalize(" \n\t ").is_none());
/// ```
pub fn normalize(raw: &str) -> Option<NormalizedText> {
    let script = detect_script(raw);

    let mut tokens = vec![];
    let mut current = String::new();
    for c in raw.nfkd() {
        if is_invisible(c) || (c.is_control() && !c.is_whitespace()) || is_combining_mark(c) {
            continue;
        }
        if script == Script::Arabic && c == TATWEEL {
            continue;
        }
        if c.is_alphanumeric() {
            let c = fold_digit(c);
            let c = match script {
                Script::Arabic => fold_arabic_letter(c),
                Script::General => c,
            };
            current.extend(c.to_lowercase());
        } else if !current.is_empty() {
            tokens.push(std::mem::take(&mut current));
        }
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    if tokens.is_empty() {
        return None;
    }

    Some(NormalizedText {
        text: tokens.join(" "),
        tokens,
        script,
    })
}

fn detect_script(raw: &str) -> Script {
    let mut arabic = 0usize;
    let mut other = 0usize;
    for c in raw
        .chars()
        .filter(|&c| c.is_alphabetic() && !is_combining_mark(c))
    {
        if is_arabic_letter(c) {
            arabic += 1;
        } else {
            other += 1;
        }
    }
    if arabic > other {
        Script::Arabic
    } else {
        Script::General
    }
}

const fn is_arabic_letter(c: char) -> bool {
    matches!(c,
        '\u{0620}'..='\u{064A}'
        | '\u{066E}'..='\u{06D3}'
        | '\u{06D5}'
        | '\u{06FA}'..='\u{06FF}'
        | '\u{0750}'..='\u{077F}'
        | '\u{FB50}'..='\u{FDFF}'
        | '\u{FE70}'..='\u{FEFF}')
}

/// Zero-width and soft-hyphen characters left behind by PDF extraction.
const fn is_invisible(c: char) -> bool {
    matches!(c, '\u{00AD}' | '\u{200B}'..='\u{200F}' | '\u{2060}' | '\u{FEFF}')
}

/// Maps Arabic-Indic and Extended Arabic-Indic digits to ASCII digits.
fn fold_digit(c: char) -> char {
    match c {
        '\u{0660}'..='\u{0669}' => char::from(b'0' + (c as u32 - 0x0660) as u8),
        '\u{06F0}'..='\u{06F9}' => char::from(b'0' + (c as u32 - 0x06F0) as u8),
        _ => c,
    }
}

/// Unifies Arabic letter variants. Hamza carriers are already split by NFKD.
const fn fold_arabic_letter(c: char) -> char {
    match c {
        '\u{0622}' | '\u{0623}' | '\u{0625}' | '\u{0671}' => '\u{0627}',
        '\u{0649}' => '\u{064A}',
        '\u{0629}' => '\u{0647}',
        '\u{0624}' => '\u{0648}',
        '\u{0626}' => '\u{064A}',
        _ => c,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_whitespace_and_case() {
        let n = normalize("The   QUICK\tbrown\r\n\nfox").unwrap();
        assert_eq!(n.text(), "the quick brown fox");
        assert_eq!(n.tokens(), &["the", "quick", "brown", "fox"]);
        assert_eq!(n.word_count(), 4);
        assert_eq!(n.script(), Script::General);
    }

    #[test]
    fn test_punctuation_splits_tokens() {
        let n = normalize("end.Start, (middle) -- \"quoted\"; well-known").unwrap();
        assert_eq!(n.text(), "end start middle quoted well known");
    }

    #[test]
    fn test_control_and_invisible_characters() {
        let n = normalize("pla\u{00AD}gia\u{200B}rism\u{0007} check").unwrap();
        assert_eq!(n.text(), "plagiarism check");
    }

    #[test]
    fn test_diacritics_removed() {
        let n = normalize("Café naïve résumé").unwrap();
        assert_eq!(n.text(), "cafe naive resume");
    }

    #[test]
    fn test_compatibility_forms() {
        let n = normalize("ﬁnal ＡＢＣ").unwrap();
        assert_eq!(n.text(), "final abc");
    }

    #[test]
    fn test_arabic_folding() {
        let plain = normalize("الطالب كتب مدرسة على اسم").unwrap();
        let decorated = normalize("الطَّالِبُ كَتَبَ مَدرسـةٌ عَلى إسم").unwrap();
        assert_eq!(plain.script(), Script::Arabic);
        assert_eq!(decorated.script(), Script::Arabic);
        assert_eq!(plain.text(), decorated.text());
    }

    #[test]
    fn test_arabic_digits() {
        let n = normalize("سنة ٢٠٢٤ و ۱۲").unwrap();
        assert_eq!(n.tokens()[1], "2024");
        assert_eq!(n.tokens()[3], "12");
    }

    #[test]
    fn test_empty() {
        assert!(normalize("").is_none());
        assert!(normalize("   \n\t  ").is_none());
        assert!(normalize("... --- !!!").is_none());
    }

    #[test]
    fn test_deterministic() {
        let raw = "Some text, with Ünïcödé and  spaces.";
        assert_eq!(normalize(raw), normalize(raw));
    }

    #[test]
    fn test_excerpt() {
        let n = normalize("one two three four five").unwrap();
        assert_eq!(n.excerpt(1..4, 100), "two three four");
        assert_eq!(n.excerpt(3..10, 100), "four five");
        assert_eq!(n.excerpt(0..5, 7), "one two…");
    }

    #[test]
    fn test_serde_rebuilds_tokens() {
        let n = normalize("alpha beta gamma").unwrap();
        let json = serde_json::to_string(&n).unwrap();
        assert!(!json.contains("tokens"));
        let back: NormalizedText = serde_json::from_str(&json).unwrap();
        assert_eq!(back, n);
    }
}
