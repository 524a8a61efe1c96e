//! Tokenizer for delimited multi-value attribute strings.
//!
//! Grammar:
//!
//! ```text
//! list  := token (delim token)*
//! delim := ',' | ';'                      (only at nesting depth 0)
//! token := (group | any char but delim)*
//! group := '(' .. ')' | '[' .. ']' | '{' .. '}'   (may nest)
//! ```
//!
//! Tokens are trimmed and empty tokens are dropped. A token with an unmatched
//! closing character, a mismatched closer, or an unterminated group is
//! reported as a [`FilterParseAnomaly`] and skipped; parsing continues with the
//! next token.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("skipped malformed token `{token}` at byte {offset}: {reason}")]
pub struct FilterParseAnomaly {
    pub token: String,
    pub offset: usize,
    pub reason: &'static str,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Tokenized {
    pub tokens: Vec<String>,
    pub anomalies: Vec<FilterParseAnomaly>,
}

fn is_delim(c: char) -> bool {
    c == ',' || c == ';'
}

fn closer_for(open: char) -> Option<char> {
    match open {
        '(' => Some(')'),
        '[' => Some(']'),
        '{' => Some('}'),
        _ => None,
    }
}

fn is_closer(c: char) -> bool {
    matches!(c, ')' | ']' | '}')
}

/// Splits `raw` on top-level delimiters.
pub fn tokenize_entity_list(raw: &str) -> Tokenized {
    let mut out = Tokenized::default();

    let mut stack: Vec<char> = Vec::new();
    let mut start = 0usize;
    let mut broken: Option<&'static str> = None;

    for (i, c) in raw.char_indices() {
        if is_delim(c) && stack.is_empty() {
            finish_token(&mut out, raw, start, i, broken.take());
            start = i + c.len_utf8();
            continue;
        }
        if broken.is_some() {
            // Token already condemned; skip to the next top-level delimiter.
            // Its nesting state is meaningless, so treat delimiters as top-level.
            if is_delim(c) {
                stack.clear();
                finish_token(&mut out, raw, start, i, broken.take());
                start = i + c.len_utf8();
            }
            continue;
        }
        if let Some(close) = closer_for(c) {
            stack.push(close);
        } else if is_closer(c) {
            match stack.pop() {
                Some(expected) if expected == c => {}
                Some(_) => broken = Some("mismatched closing bracket"),
                None => broken = Some("unmatched closing bracket"),
            }
        }
    }

    if broken.is_none() && !stack.is_empty() {
        broken = Some("unterminated group");
    }
    finish_token(&mut out, raw, start, raw.len(), broken);
    out
}

fn finish_token(
    out: &mut Tokenized,
    raw: &str,
    start: usize,
    end: usize,
    broken: Option<&'static str>,
) {
    let slice = &raw[start..end];
    let token = slice.trim();
    if let Some(reason) = broken {
        let offset = start + (slice.len() - slice.trim_start().len());
        out.anomalies.push(FilterParseAnomaly {
            token: token.to_string(),
            offset,
            reason,
        });
        return;
    }
    if !token.is_empty() {
        out.tokens.push(token.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::tokenize_entity_list;

    #[test]
    fn table() {
        let cases: &[(&str, &[&str])] = &[
            ("", &[]),
            ("   ", &[]),
            ("Salmon", &["Salmon"]),
            ("Salmon, Tuna", &["Salmon", "Tuna"]),
            ("Salmon;Tuna ; Pollock", &["Salmon", "Tuna", "Pollock"]),
            (",,Salmon,,", &["Salmon"]),
            // Comma inside parentheses must not split the name.
            (
                "Korea (Republic of), Japan",
                &["Korea (Republic of)", "Japan"],
            ),
            (
                "Tuna (Skipjack, Yellowfin); Salmon",
                &["Tuna (Skipjack, Yellowfin)", "Salmon"],
            ),
            ("A (b [c, d] e), F", &["A (b [c, d] e)", "F"]),
            ("Chinese Taipei {TW, TWN}", &["Chinese Taipei {TW, TWN}"]),
        ];

        for (raw, expected) in cases {
            let got = tokenize_entity_list(raw);
            assert_eq!(got.tokens, *expected, "input: {raw:?}");
            assert!(got.anomalies.is_empty(), "input: {raw:?}");
        }
    }

    #[test]
    fn anomalies_skip_only_the_bad_token() {
        let cases: &[(&str, &[&str], &str)] = &[
            ("Salmon, Tuna), Cod", &["Salmon", "Cod"], "Tuna)"),
            ("Salmon, Tuna (Bigeye", &["Salmon"], "Tuna (Bigeye"),
            ("Tuna (Bigeye], Cod", &["Cod"], "Tuna (Bigeye]"),
        ];

        for (raw, expected, bad) in cases {
            let got = tokenize_entity_list(raw);
            assert_eq!(got.tokens, *expected, "input: {raw:?}");
            assert_eq!(got.anomalies.len(), 1, "input: {raw:?}");
            assert_eq!(got.anomalies[0].token, *bad, "input: {raw:?}");
        }
    }

    #[test]
    fn anomaly_offset_points_at_token() {
        let raw = "Salmon, Tuna), Cod";
        let got = tokenize_entity_list(raw);
        let a = &got.anomalies[0];
        assert_eq!(&raw[a.offset..a.offset + a.token.len()], "Tuna)");
    }
}
