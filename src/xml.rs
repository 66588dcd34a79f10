//! XML character-data escaping.

/// Written in place of any character XML 1.0 does not allow, and of any
/// undecodable input byte. This is the six-character text `\uFFFD`, not the
/// replacement character itself.
pub const INVALID_MARKER: &str = "\\uFFFD";

/// Appends `text` to `dest` with the five XML entities escaped and illegal
/// characters replaced by [`INVALID_MARKER`].
///
/// Runs of text that need no escaping are copied as whole slices.
pub fn append_escaped(dest: &mut String, text: &str) {
    let mut last = 0;

    for (i, ch) in text.char_indices() {
        let esc = match ch {
            '"' => "&quot;",
            '\'' => "&apos;",
            '&' => "&amp;",
            '<' => "&lt;",
            '>' => "&gt;",
            c if is_xml_char(c) => continue,
            _ => INVALID_MARKER,
        };

        dest.push_str(&text[last..i]);
        dest.push_str(esc);
        last = i + ch.len_utf8();
    }

    dest.push_str(&text[last..]);
}

/// Same as [`append_escaped`] for input that may not be valid UTF-8.
///
/// Each byte that is not part of a well-formed sequence produces one marker.
pub fn append_escaped_bytes(dest: &mut String, text: &[u8]) {
    for chunk in text.utf8_chunks() {
        append_escaped(dest, chunk.valid());
        for _ in chunk.invalid() {
            dest.push_str(INVALID_MARKER);
        }
    }
}

/// Appends `<tag>escaped text</tag>`.
///
/// String-buffer counterpart of the elements [`crate::feed::FeedWriter`]
/// emits through quick-xml, for building XML fragments by hand.
pub fn append_tag(dest: &mut String, tag: &str, text: &str) {
    dest.push('<');
    dest.push_str(tag);
    dest.push('>');
    append_escaped(dest, text);
    dest.push_str("</");
    dest.push_str(tag);
    dest.push('>');
}

// Char production of XML 1.0, section 2.2. Surrogates cannot occur in a
// Rust char, so only the ranges need checking.
pub(crate) fn is_xml_char(c: char) -> bool {
    matches!(c,
        '\u{09}' | '\u{0A}' | '\u{0D}'
        | '\u{20}'..='\u{D7FF}'
        | '\u{E000}'..='\u{FFFD}'
        | '\u{10000}'..='\u{10FFFF}')
}
