//! Input sanitization helpers applied to every piece of user text before it
//! is persisted or echoed back.

use uuid::Uuid;

use crate::constants::{UPLOADS_PATH_PREFIX, UPLOAD_EXTENSIONS, URL_MAX};

/// Remove every `<...>` tag. A `<` with no closing `>` is kept as text.
pub fn strip_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;
    while let Some(open) = rest.find('<') {
        out.push_str(&rest[..open]);
        match rest[open..].find('>') {
            Some(close) => rest = &rest[open + close + 1..],
            None => {
                rest = &rest[open..];
                break;
            }
        }
    }
    out.push_str(rest);
    out
}

/// Strip tags and control characters, squeeze blank lines, trim.
///
/// Spaces and tabs on otherwise empty lines do not break a run of blank
/// lines.
pub fn sanitize_text(input: &str) -> String {
    let stripped = strip_html(input);
    let mut out = String::with_capacity(stripped.len());
    let mut newlines = 0usize;
    let mut pending = String::new();

    for c in stripped.chars() {
        match c {
            '\r' => {}
            '\n' => {
                pending.clear();
                newlines += 1;
                if newlines <= 2 {
                    out.push(c);
                }
            }
            ' ' | '\t' if newlines > 0 => pending.push(c),
            _ if c.is_control() && c != '\t' => {}
            _ => {
                out.push_str(&pending);
                pending.clear();
                newlines = 0;
                out.push(c);
            }
        }
    }

    out.trim().to_string()
}

/// Sanitize a single-line value (names, titles, locations).
pub fn sanitize_line(input: &str) -> String {
    let text = sanitize_text(input);
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(c),
        }
    }
    out
}

/// Accept absolute http(s) URLs and `/uploads/<uuid>[.ext]` paths served by
/// this instance. Anything else yields `None`.
pub fn sanitize_url(input: &str) -> Option<String> {
    let url = input.trim();
    if url.is_empty() || url.len() > URL_MAX {
        return None;
    }
    if url.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return None;
    }
    if url.contains('<') || url.contains('>') || url.contains('"') {
        return None;
    }

    if let Some(rest) = url.strip_prefix(UPLOADS_PATH_PREFIX) {
        let (stem, ext) = rest.split_once('.').unwrap_or((rest, ""));
        let known_ext = ext.is_empty() || UPLOAD_EXTENSIONS.contains(&ext);
        return (known_ext && Uuid::parse_str(stem).is_ok()).then(|| url.to_string());
    }

    let lower = url.to_ascii_lowercase();
    let rest = lower
        .strip_prefix("https://")
        .or_else(|| lower.strip_prefix("http://"))?;
    let host = rest.split(['/', '?', '#']).next().unwrap_or("");
    if host.is_empty() || host.starts_with('@') || host.starts_with(':') {
        return None;
    }

    Some(url.to_string())
}

pub fn normalize_email(input: &str) -> String {
    input.trim().to_lowercase()
}

/// Loose email shape check: one `@`, non-empty local part, dotted domain.
pub fn is_valid_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.contains('@') {
        return false;
    }
    if email.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return false;
    }
    let labels: Vec<&str> = domain.split('.').collect();
    labels.len() >= 2 && labels.iter().all(|l| !l.is_empty())
}

/// Detect script injection attempts that survive tag stripping.
pub fn contains_script(input: &str) -> bool {
    let lower = input.to_ascii_lowercase();
    if lower.contains("<script") || lower.contains("javascript:") || lower.contains("vbscript:")
    {
        return true;
    }

    // Inline handlers such as `onerror=` or `onload =`.
    let bytes = lower.as_bytes();
    let mut i = 0;
    while let Some(pos) = lower[i..].find("on") {
        let start = i + pos;
        let boundary = start == 0 || !bytes[start - 1].is_ascii_alphanumeric();
        let mut j = start + 2;
        while j < bytes.len() && bytes[j].is_ascii_alphabetic() {
            j += 1;
        }
        let name_len = j - (start + 2);
        while j < bytes.len() && bytes[j] == b' ' {
            j += 1;
        }
        if boundary && name_len >= 3 && j < bytes.len() && bytes[j] == b'=' {
            return true;
        }
        i = start + 2;
    }

    false
}
