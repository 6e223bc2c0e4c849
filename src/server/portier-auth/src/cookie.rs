//! `Cookie` header scanning.

use http::header::COOKIE;
use http::HeaderMap;

/// Returns the value of the last cookie named `name` across every `Cookie`
/// header in `headers`.
///
/// Pairs without `=` and pairs that are not valid UTF-8 are skipped; the
/// rest of their header is still scanned. A value wrapped in double quotes
/// is unquoted.
pub fn last_cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    let mut found = None;
    for header in headers.get_all(COOKIE) {
        for pair in header.as_bytes().split(|&b| b == b';') {
            let Ok(pair) = std::str::from_utf8(pair) else {
                continue;
            };
            let Some((key, value)) = pair.split_once('=') else {
                continue;
            };
            if key.trim() != name {
                continue;
            }
            let value = value.trim();
            let value = value
                .strip_prefix('"')
                .and_then(|v| v.strip_suffix('"'))
                .unwrap_or(value);
            found = Some(value.to_string());
        }
    }
    found
}
