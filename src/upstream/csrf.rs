//! Purpose: Extract a CSRF token from an upstream project-page response.
//! Exports: `extract_csrf_token`.
//! Role: Pure strategy chain over a response body and its set-cookie headers.
//! Invariants: Strategies run in priority order (meta tag, script assignment,
//! Invariants: csrf-named cookie); the first non-empty token wins.
//! Invariants: Tolerates arbitrary large non-JSON HTML; never panics on input.

/// Token names the inline-script strategy searches for, in order.
const SCRIPT_NEEDLES: [&str; 2] = ["csrfToken", "_csrf"];

/// Run the extraction chain. Returns `None` only when no strategy yields a
/// non-empty token.
pub fn extract_csrf_token(body: &str, set_cookie_headers: &[String]) -> Option<String> {
    from_meta_tag(body)
        .or_else(|| from_script_assignment(body))
        .or_else(|| from_cookie_headers(set_cookie_headers))
}

/// Strategy 1: `<meta name="csrf-token" content="...">` anywhere in the body.
fn from_meta_tag(body: &str) -> Option<String> {
    for (start, _) in body.match_indices("<meta") {
        let rest = &body[start..];
        let Some(end) = rest.find('>') else {
            continue;
        };
        let tag = &rest[..end];
        let names_token = attr_value(tag, "name")
            .is_some_and(|name| name.eq_ignore_ascii_case("csrf-token"));
        if !names_token {
            continue;
        }
        if let Some(content) = attr_value(tag, "content")
            && !content.is_empty()
        {
            return Some(content.to_string());
        }
    }
    None
}

/// Strategy 2: an inline assignment like `window._csrf = "..."` or
/// `"csrfToken":"..."` in a script block.
fn from_script_assignment(body: &str) -> Option<String> {
    for needle in SCRIPT_NEEDLES {
        for (start, _) in body.match_indices(needle) {
            let rest = &body[start + needle.len()..];
            if let Some(token) = quoted_value_after_assignment(rest)
                && !token.is_empty()
            {
                return Some(token.to_string());
            }
        }
    }
    None
}

/// Strategy 3: a set-cookie header whose cookie name contains "csrf"
/// (case-insensitive).
fn from_cookie_headers(set_cookie_headers: &[String]) -> Option<String> {
    for header in set_cookie_headers {
        let Some((name, value)) = header.split_once('=') else {
            continue;
        };
        if !name.trim().to_ascii_lowercase().contains("csrf") {
            continue;
        }
        let value = value.split(';').next().unwrap_or("").trim();
        if !value.is_empty() {
            return Some(value.to_string());
        }
    }
    None
}

/// Value of `attr="..."` (or single-quoted) inside one tag's text.
///
/// The attribute name must sit on a whitespace boundary, so `data-name=`
/// never matches as `name=`.
fn attr_value<'a>(tag: &'a str, attr: &str) -> Option<&'a str> {
    for quote in ['"', '\''] {
        let needle = format!("{attr}={quote}");
        for (start, _) in tag.match_indices(&needle) {
            let preceded_by_space = tag[..start]
                .chars()
                .next_back()
                .is_some_and(|ch| ch.is_ascii_whitespace());
            if !preceded_by_space {
                continue;
            }
            let rest = &tag[start + needle.len()..];
            if let Some(end) = rest.find(quote) {
                return Some(&rest[..end]);
            }
        }
    }
    None
}

/// Quoted string following `=`, `:`, or a quote-closed key, skipping
/// whitespace. Returns `None` when no quoted value follows.
fn quoted_value_after_assignment(rest: &str) -> Option<&str> {
    let mut seen_assign = false;
    for (index, ch) in rest.char_indices() {
        match ch {
            ' ' | '\t' | '\r' | '\n' => continue,
            // `"csrfToken": "..."` leaves a closing quote before the colon.
            '"' | '\'' if !seen_assign => continue,
            '=' | ':' if !seen_assign => {
                seen_assign = true;
                continue;
            }
            '"' | '\'' if seen_assign => {
                let rest = &rest[index + 1..];
                let end = rest.find(ch)?;
                return Some(&rest[..end]);
            }
            _ => return None,
        }
    }
    None
}
