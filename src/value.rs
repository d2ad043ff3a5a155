//! SQL literal decoding.
//!
//! Maps one raw literal token from a VALUES tuple to a typed value. Decode
//! order matters and follows the documented rules: empty, NULL/TRUE/FALSE,
//! quoted strings, bit literals, integers, decimals, then verbatim text.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

/// Largest integer that survives a double-precision round trip. Dump ids
/// beyond this are kept as strings to avoid silent precision loss.
pub const MAX_SAFE_INTEGER: i64 = 9_007_199_254_740_991;

static BIT_LITERAL_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(?i)b'([01]+)'$").unwrap());
static INT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^-?\d+$").unwrap());
static DECIMAL_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^-?\d+\.\d+$").unwrap());

#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl SqlValue {
    /// Plain JSON representation (the engine-native form; the document store
    /// client reshapes this into its tagged wire format on its own side).
    pub fn to_json(&self) -> Value {
        match self {
            SqlValue::Null => Value::Null,
            SqlValue::Bool(b) => Value::Bool(*b),
            SqlValue::Int(n) => Value::from(*n),
            SqlValue::Float(f) => serde_json::Number::from_f64(*f)
                .map(Value::Number)
                .unwrap_or_else(|| Value::String(f.to_string())),
            SqlValue::Str(s) => Value::String(s.clone()),
        }
    }

    /// Interprets this value as a row id: a finite number truncated toward
    /// zero, numeric strings included. NULL, empty, and non-numeric text
    /// yield `None`.
    pub fn as_numeric_id(&self) -> Option<i64> {
        match self {
            SqlValue::Null => None,
            SqlValue::Bool(b) => Some(i64::from(*b)),
            SqlValue::Int(n) => Some(*n),
            SqlValue::Float(f) if f.is_finite() => Some(f.trunc() as i64),
            SqlValue::Float(_) => None,
            SqlValue::Str(s) => {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    return None;
                }
                trimmed
                    .parse::<f64>()
                    .ok()
                    .filter(|f| f.is_finite())
                    .map(|f| f.trunc() as i64)
            }
        }
    }
}

/// Decodes one raw literal token.
pub fn decode(raw: &str) -> SqlValue {
    let token = raw.trim();

    if token.is_empty() {
        return SqlValue::Str(String::new());
    }
    if token.eq_ignore_ascii_case("null") {
        return SqlValue::Null;
    }
    if token.eq_ignore_ascii_case("true") {
        return SqlValue::Bool(true);
    }
    if token.eq_ignore_ascii_case("false") {
        return SqlValue::Bool(false);
    }

    if is_quoted(token, '\'') || is_quoted(token, '"') {
        return SqlValue::Str(decode_quoted(token));
    }

    if let Some(caps) = BIT_LITERAL_RE.captures(token) {
        if let Ok(n) = i64::from_str_radix(&caps[1], 2) {
            return SqlValue::Int(n);
        }
        return SqlValue::Str(token.to_string());
    }

    if INT_RE.is_match(token) {
        return match token.parse::<i64>() {
            Ok(n) if n.abs() <= MAX_SAFE_INTEGER => SqlValue::Int(n),
            // too large for a safe integer, keep the original text
            _ => SqlValue::Str(token.to_string()),
        };
    }

    if DECIMAL_RE.is_match(token) {
        if let Ok(f) = token.parse::<f64>() {
            return SqlValue::Float(f);
        }
    }

    SqlValue::Str(token.to_string())
}

fn is_quoted(token: &str, quote: char) -> bool {
    token.len() >= 2 && token.starts_with(quote) && token.ends_with(quote)
}

/// Strips the delimiters, collapses doubled delimiters, then applies
/// backslash unescaping.
fn decode_quoted(token: &str) -> String {
    let quote = token.chars().next().unwrap_or('\'');
    let inner = &token[1..token.len() - 1];

    let doubled: String = [quote, quote].iter().collect();
    let undoubled = inner.replace(&doubled, &quote.to_string());

    unescape(&undoubled)
}

/// Single left-to-right pass over MySQL escape sequences. A produced control
/// character is never re-scanned, so `\\0` yields a literal backslash
/// followed by `0`, not a NUL.
fn unescape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();

    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('0') => out.push('\0'),
            Some('b') => out.push('\u{0008}'),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('t') => out.push('\t'),
            Some('Z') => out.push('\u{001a}'),
            Some('"') => out.push('"'),
            Some('\'') => out.push('\''),
            Some('\\') => out.push('\\'),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keywords_decode_case_insensitively() {
        assert_eq!(decode("NULL"), SqlValue::Null);
        assert_eq!(decode("null"), SqlValue::Null);
        assert_eq!(decode("TRUE"), SqlValue::Bool(true));
        assert_eq!(decode("false"), SqlValue::Bool(false));
    }

    #[test]
    fn empty_token_is_empty_string() {
        assert_eq!(decode(""), SqlValue::Str(String::new()));
        assert_eq!(decode("  "), SqlValue::Str(String::new()));
    }

    #[test]
    fn doubled_single_quote_becomes_one_quote() {
        assert_eq!(decode("'O'' Brien'"), SqlValue::Str("O' Brien".to_string()));
    }

    #[test]
    fn escape_sequences_collapse() {
        assert_eq!(
            decode(r"'line1\nline2\ttab'"),
            SqlValue::Str("line1\nline2\ttab".to_string())
        );
        assert_eq!(decode(r"'a\\b'"), SqlValue::Str(r"a\b".to_string()));
        assert_eq!(decode(r"'it\'s'"), SqlValue::Str("it's".to_string()));
    }

    #[test]
    fn escaped_backslash_before_digit_is_not_a_nul() {
        // \\0 is an escaped backslash followed by the digit zero
        assert_eq!(decode(r"'a\\0'"), SqlValue::Str("a\\0".to_string()));
        // \0 alone is a NUL
        assert_eq!(decode(r"'a\0'"), SqlValue::Str("a\0".to_string()));
    }

    #[test]
    fn double_quoted_strings_decode() {
        assert_eq!(decode(r#""hi there""#), SqlValue::Str("hi there".to_string()));
    }

    #[test]
    fn integers_and_decimals() {
        assert_eq!(decode("42"), SqlValue::Int(42));
        assert_eq!(decode("-7"), SqlValue::Int(-7));
        assert_eq!(decode("3.25"), SqlValue::Float(3.25));
        assert_eq!(decode("-0.5"), SqlValue::Float(-0.5));
    }

    #[test]
    fn oversized_integer_stays_text() {
        let big = "9007199254740993";
        assert_eq!(decode(big), SqlValue::Str(big.to_string()));
    }

    #[test]
    fn bit_literals_parse_base_two() {
        assert_eq!(decode("b'101'"), SqlValue::Int(5));
        assert_eq!(decode("B'1'"), SqlValue::Int(1));
    }

    #[test]
    fn unknown_tokens_pass_through() {
        assert_eq!(decode("0x1F"), SqlValue::Str("0x1F".to_string()));
        assert_eq!(decode("NOW()"), SqlValue::Str("NOW()".to_string()));
    }

    #[test]
    fn numeric_id_extraction() {
        assert_eq!(SqlValue::Int(9).as_numeric_id(), Some(9));
        assert_eq!(SqlValue::Float(9.7).as_numeric_id(), Some(9));
        assert_eq!(SqlValue::Str("123".into()).as_numeric_id(), Some(123));
        assert_eq!(SqlValue::Str("abc".into()).as_numeric_id(), None);
        assert_eq!(SqlValue::Str("".into()).as_numeric_id(), None);
        assert_eq!(SqlValue::Null.as_numeric_id(), None);
    }
}
