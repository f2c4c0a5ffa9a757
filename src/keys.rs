//! Mapping session keys onto backend identifiers
//!
//! Cache backends share a keyspace, so session keys are namespaced with a
//! prefix. Record-id backends only accept `[A-Za-z0-9_]` identifiers, so keys
//! are escaped with a reversible scheme: alphanumerics pass through, `_`
//! doubles to `__`, and every other char becomes `_<hex codepoint>_`.

use std::fmt::Write;

/// Namespaced cache key
pub fn prefixed(prefix: &str, key: &str) -> String {
    let mut out = String::with_capacity(prefix.len() + key.len());
    out.push_str(prefix);
    out.push_str(key);
    out
}

/// Table name rewritten into identifier grammar (`telegraf-sessions` -> `telegraf_sessions`)
pub fn table_ident(name: &str) -> String {
    name.replace('-', "_")
}

/// Escape a session key into a record identifier
///
/// Distinct keys always produce distinct identifiers; see [`session_key`]
/// for the inverse.
pub fn record_id(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    for ch in key.chars() {
        match ch {
            'a'..='z' | 'A'..='Z' | '0'..='9' => out.push(ch),
            '_' => out.push_str("__"),
            other => {
                // infallible for String
                let _ = write!(out, "_{:x}_", other as u32);
            }
        }
    }
    out
}

/// Recover the session key from a record identifier
///
/// Returns `None` for identifiers that [`record_id`] never produces.
pub fn session_key(id: &str) -> Option<String> {
    let mut out = String::with_capacity(id.len());
    let mut chars = id.chars();
    while let Some(ch) = chars.next() {
        if ch != '_' {
            if !ch.is_ascii_alphanumeric() {
                return None;
            }
            out.push(ch);
            continue;
        }

        let mut hex = String::new();
        loop {
            match chars.next()? {
                '_' => break,
                digit if digit.is_ascii_hexdigit() => hex.push(digit),
                _ => return None,
            }
        }

        if hex.is_empty() {
            out.push('_');
        } else {
            let code = u32::from_str_radix(&hex, 16).ok()?;
            let decoded = char::from_u32(code)?;
            // plain alphanumerics and '_' have a shorter canonical form
            if decoded.is_ascii_alphanumeric() || decoded == '_' {
                return None;
            }
            out.push(decoded);
        }
    }
    Some(out)
}
