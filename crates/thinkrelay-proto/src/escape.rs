//! Payload encoding for single-line SSE events.
//!
//! SSE frames are newline-delimited, so the relay rewrites line breaks inside
//! model output into literal backslash sequences ([`escape_line_breaks`]).
//! Consumers undo this with [`decode_payload`], which also tolerates
//! percent-encoded text from peers that URL-encode their payloads.

use std::borrow::Cow;

use percent_encoding::percent_decode_str;

/// Replace `\n` and `\r` with the two-character sequences `\` `n` / `\` `r`.
///
/// No other character is touched. Returns the input unchanged (borrowed) when
/// it contains no line breaks.
pub fn escape_line_breaks(text: &str) -> Cow<'_, str> {
    if !text.contains(['\n', '\r']) {
        return Cow::Borrowed(text);
    }
    let mut out = String::with_capacity(text.len() + 8);
    for c in text.chars() {
        match c {
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            other => out.push(other),
        }
    }
    Cow::Owned(out)
}

/// Decode a raw wire payload into display text.
///
/// Total: every input produces an output, nothing is rejected. Layers run in a
/// fixed order:
///
/// 1. Percent layer: applied only if the text has at least one `%XX` escape
///    and the decoded bytes are valid UTF-8. A bare `%` or `%zz` is literal.
/// 2. Escape layer: a single left-to-right scan resolving `\n \r \t \" \' \\
///    \/ \b \f` and `\uXXXX`. Unknown escapes and a trailing lone backslash
///    are kept verbatim.
pub fn decode_payload(raw: &str) -> String {
    let text = percent_layer(raw);
    unescape(&text)
}

fn percent_layer(raw: &str) -> Cow<'_, str> {
    if !has_percent_escape(raw) {
        return Cow::Borrowed(raw);
    }
    percent_decode_str(raw)
        .decode_utf8()
        .unwrap_or(Cow::Borrowed(raw))
}

fn has_percent_escape(raw: &str) -> bool {
    raw.as_bytes()
        .windows(3)
        .any(|w| w[0] == b'%' && w[1].is_ascii_hexdigit() && w[2].is_ascii_hexdigit())
}

fn unescape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(pos) = rest.find('\\') {
        out.push_str(&rest[..pos]);
        let tail = &rest[pos + 1..];

        let Some(c) = tail.chars().next() else {
            // Trailing lone backslash.
            out.push('\\');
            return out;
        };

        if let Some(mapped) = simple_escape(c) {
            out.push(mapped);
            rest = &tail[c.len_utf8()..];
        } else if c == 'u'
            && let Some(mapped) = unicode_escape(&tail[1..])
        {
            out.push(mapped);
            rest = &tail[5..];
        } else {
            out.push('\\');
            out.push(c);
            rest = &tail[c.len_utf8()..];
        }
    }

    out.push_str(rest);
    out
}

fn simple_escape(c: char) -> Option<char> {
    Some(match c {
        'n' => '\n',
        'r' => '\r',
        't' => '\t',
        '"' => '"',
        '\'' => '\'',
        '\\' => '\\',
        '/' => '/',
        'b' => '\u{8}',
        'f' => '\u{c}',
        _ => return None,
    })
}

/// Parse the four hex digits following `\u`. Surrogate halves are rejected.
fn unicode_escape(s: &str) -> Option<char> {
    let hex = s.get(..4)?;
    if !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    u32::from_str_radix(hex, 16).ok().and_then(char::from_u32)
}

// ── Tests ──────────────────────────────────────────────────────────────────────
