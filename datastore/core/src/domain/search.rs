// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Full-text search input normalization.
//!
//! Turns free text from a search box into a prefix-matching `to_tsquery`
//! expression: `"jane.doe@example"` becomes
//! `"jane:* & doe:* & example:*"`. The output is not escaped and must only
//! ever be bound as a parameter, e.g. `search_vector @@ to_tsquery($1)`.

use percent_encoding::percent_decode_str;

const PREFIX_AND: &str = ":* & ";
const PREFIX_MARK: &str = ":*";

/// Convert raw (possibly URL-encoded) search text into a tsquery expression.
///
/// Never fails: text that cannot be URL-decoded falls back to treating each
/// literal `%20` as a token separator.
pub fn format_search(raw: &str) -> String {
    if raw.is_empty() {
        return String::new();
    }

    let decoded = query_unescape(raw).unwrap_or_else(|| raw.replace("%20", " "));
    let cleaned = decoded.replace(['@', '.'], " ");
    let tokens: Vec<&str> = cleaned.split_whitespace().collect();
    if tokens.is_empty() {
        return String::new();
    }

    let mut query = tokens.join(PREFIX_AND);
    query.push_str(PREFIX_MARK);
    query
}

/// Query-string unescaping: `+` is a space, `%XX` is a byte.
///
/// Returns `None` on a malformed escape or when the bytes are not UTF-8.
fn query_unescape(raw: &str) -> Option<String> {
    let bytes = raw.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hex = bytes.get(i + 1..i + 3)?;
            if !hex.iter().all(u8::is_ascii_hexdigit) {
                return None;
            }
            i += 3;
        } else {
            i += 1;
        }
    }

    let spaced = raw.replace('+', " ");
    percent_decode_str(&spaced)
        .decode_utf8()
        .ok()
        .map(|s| s.into_owned())
}
