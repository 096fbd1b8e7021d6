use std::borrow::Cow;

/// Removes every `<...>` tag from a string.
///
/// Matches the regex `<[^>]*>` applied globally: each `<` through the next
/// `>` is dropped, tag contents included. This is not an HTML parser, so
/// entities are left alone and a `<` with no closing `>` after it is kept as
/// literal text.
///
/// Returns `Cow::Borrowed` when the input has no tag to remove.
///
/// # Examples
///
/// ```
/// use hatena_blog_mcp::util::strip_html_tags;
///
/// assert_eq!(strip_html_tags("<p>Hello <b>World</b></p>"), "Hello World");
/// assert_eq!(strip_html_tags("1 < 2"), "1 < 2");
/// ```
pub fn strip_html_tags(s: &str) -> Cow<'_, str> {
    let Some(first) = find_tag(s, 0) else {
        return Cow::Borrowed(s);
    };

    let mut out = String::with_capacity(s.len());
    let mut copied_to = 0;
    let mut next = Some(first);

    while let Some((open, close)) = next {
        out.push_str(&s[copied_to..open]);
        copied_to = close + 1;
        next = find_tag(s, copied_to);
    }
    out.push_str(&s[copied_to..]);

    Cow::Owned(out)
}

/// Byte range `(open, close)` of the next `<` and the first `>` after it.
fn find_tag(s: &str, from: usize) -> Option<(usize, usize)> {
    let open = from + s[from..].find('<')?;
    let close = open + s[open..].find('>')?;
    Some((open, close))
}

/// Keeps at most `max_chars` characters, with no ellipsis marker.
///
/// Counts Unicode scalar values, so multi-byte text is never split
/// mid-character.
pub fn truncate_chars(s: &str, max_chars: usize) -> Cow<'_, str> {
    match s.char_indices().nth(max_chars) {
        Some((cut, _)) => Cow::Owned(s[..cut].to_string()),
        None => Cow::Borrowed(s),
    }
}

/// SEC-001: Strip terminal control characters and ANSI escape sequences from text.
///
/// Feed titles and bodies are remote, untrusted text; this runs before the
/// CLI prints any of it.
///
/// Strips ASCII control characters other than tab, newline and carriage
/// return, DEL, CSI sequences (`ESC [` ... final byte `0x40..=0x7E`), OSC
/// sequences (`ESC ]` ... BEL or `ESC \`), and bare ESC.
///
/// Returns `Cow::Borrowed` when the input contains no control characters.
pub fn strip_control_chars(s: &str) -> Cow<'_, str> {
    fn is_stripped(c: char) -> bool {
        c == '\x7f' || (c.is_ascii_control() && !matches!(c, '\t' | '\n' | '\r'))
    }

    if !s.chars().any(is_stripped) {
        return Cow::Borrowed(s);
    }

    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '\x1b' {
            if !is_stripped(c) {
                out.push(c);
            }
            continue;
        }

        match chars.peek() {
            Some('[') => {
                chars.next();
                // Parameter and intermediate bytes run until the final byte
                for c in chars.by_ref() {
                    if ('\x40'..='\x7e').contains(&c) {
                        break;
                    }
                }
            }
            Some(']') => {
                chars.next();
                while let Some(c) = chars.next() {
                    if c == '\x07' {
                        break;
                    }
                    if c == '\x1b' && chars.peek() == Some(&'\\') {
                        chars.next();
                        break;
                    }
                }
            }
            _ => {}
        }
    }

    Cow::Owned(out)
}
