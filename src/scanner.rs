//! Shallow lexical helpers shared by the stripping passes.
//!
//! Nothing here builds a token stream. Callers walk the source by byte offset
//! and use these helpers to jump over literals, comments and balanced
//! brackets. All structural characters are ASCII, so every offset returned
//! sits on a char boundary.

pub fn is_ident_start(b: u8) -> bool {
    b.is_ascii_alphabetic() || b == b'_' || b == b'$'
}

pub fn is_ident_char(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b == b'$'
}

pub fn is_valid_identifier(s: &str) -> bool {
    let bytes = s.as_bytes();
    !bytes.is_empty()
        && is_ident_start(bytes[0])
        && bytes.iter().all(|&b| is_ident_char(b))
        && !is_reserved_word(s)
}

/// Words that can never name a binding.
pub fn is_reserved_word(word: &str) -> bool {
    matches!(
        word,
        "break"
            | "case"
            | "catch"
            | "class"
            | "const"
            | "continue"
            | "debugger"
            | "default"
            | "delete"
            | "do"
            | "else"
            | "export"
            | "extends"
            | "finally"
            | "for"
            | "function"
            | "if"
            | "import"
            | "in"
            | "instanceof"
            | "new"
            | "return"
            | "super"
            | "switch"
            | "this"
            | "throw"
            | "try"
            | "typeof"
            | "var"
            | "void"
            | "while"
            | "with"
            | "yield"
            | "let"
            | "static"
            | "enum"
            | "await"
            | "null"
            | "true"
            | "false"
    )
}

/// Skips spaces, tabs and newlines.
pub fn skip_ws(bytes: &[u8], mut pos: usize) -> usize {
    while pos < bytes.len() && bytes[pos].is_ascii_whitespace() {
        pos += 1;
    }
    pos
}

/// Skips whitespace and comments.
pub fn skip_trivia(bytes: &[u8], mut pos: usize) -> usize {
    loop {
        pos = skip_ws(bytes, pos);
        if pos + 1 < bytes.len() && bytes[pos] == b'/' && bytes[pos + 1] == b'/' {
            pos = skip_line_comment(bytes, pos);
        } else if pos + 1 < bytes.len() && bytes[pos] == b'/' && bytes[pos + 1] == b'*' {
            pos = skip_block_comment(bytes, pos);
        } else {
            return pos;
        }
    }
}

/// Skips horizontal whitespace only.
pub fn skip_inline_ws(bytes: &[u8], mut pos: usize) -> usize {
    while pos < bytes.len() && (bytes[pos] == b' ' || bytes[pos] == b'\t') {
        pos += 1;
    }
    pos
}

/// Returns the offset after an identifier starting at `pos`, or `pos` if none.
pub fn ident_end(bytes: &[u8], pos: usize) -> usize {
    if pos >= bytes.len() || !is_ident_start(bytes[pos]) {
        return pos;
    }
    let mut end = pos + 1;
    while end < bytes.len() && is_ident_char(bytes[end]) {
        end += 1;
    }
    end
}

/// Identifier starting exactly at `pos`.
pub fn word_at(src: &str, pos: usize) -> Option<&str> {
    let end = ident_end(src.as_bytes(), pos);
    if end > pos {
        Some(&src[pos..end])
    } else {
        None
    }
}

/// True if `word` occurs at `pos` as a whole identifier.
pub fn keyword_at(src: &str, pos: usize, word: &str) -> bool {
    word_at(src, pos) == Some(word)
}

/// `pos` points at the opening quote. Returns the offset after the closing one.
pub fn skip_string(bytes: &[u8], pos: usize) -> usize {
    let quote = bytes[pos];
    let mut i = pos + 1;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            b'\n' => return i,
            b if b == quote => return i + 1,
            _ => i += 1,
        }
    }
    bytes.len()
}

/// `pos` points at the opening backtick.
pub fn skip_template(bytes: &[u8], pos: usize) -> usize {
    let mut i = pos + 1;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            b'`' => return i + 1,
            b'$' if i + 1 < bytes.len() && bytes[i + 1] == b'{' => {
                i = match match_bracket(bytes, i + 1) {
                    Some(end) => end,
                    None => return bytes.len(),
                };
            }
            _ => i += 1,
        }
    }
    bytes.len()
}

pub fn skip_line_comment(bytes: &[u8], pos: usize) -> usize {
    let mut i = pos;
    while i < bytes.len() && bytes[i] != b'\n' {
        i += 1;
    }
    i
}

pub fn skip_block_comment(bytes: &[u8], pos: usize) -> usize {
    let mut i = pos + 2;
    while i + 1 < bytes.len() {
        if bytes[i] == b'*' && bytes[i + 1] == b'/' {
            return i + 2;
        }
        i += 1;
    }
    bytes.len()
}

/// `pos` points at `(`, `[` or `{`. Returns the offset after the matching
/// closer, skipping literals and comments. Angle brackets are not counted.
pub fn match_bracket(bytes: &[u8], pos: usize) -> Option<usize> {
    let mut stack: Vec<u8> = Vec::new();
    let mut i = pos;
    while i < bytes.len() {
        let b = bytes[i];
        match b {
            b'(' | b'[' | b'{' => {
                stack.push(b);
                i += 1;
            }
            b')' | b']' | b'}' => {
                let open = stack.pop()?;
                if !brackets_pair(open, b) {
                    return None;
                }
                i += 1;
                if stack.is_empty() {
                    return Some(i);
                }
            }
            b'"' | b'\'' => i = skip_string(bytes, i),
            b'`' => i = skip_template(bytes, i),
            b'/' if i + 1 < bytes.len() && bytes[i + 1] == b'/' => {
                i = skip_line_comment(bytes, i)
            }
            b'/' if i + 1 < bytes.len() && bytes[i + 1] == b'*' => {
                i = skip_block_comment(bytes, i)
            }
            _ => i += 1,
        }
        if stack.is_empty() && i > pos {
            // The opener was not a bracket at all.
            return None;
        }
    }
    None
}

fn brackets_pair(open: u8, close: u8) -> bool {
    matches!((open, close), (b'(', b')') | (b'[', b']') | (b'{', b'}'))
}

/// Byte length of the char starting at `pos`.
pub fn char_len(src: &str, pos: usize) -> usize {
    src[pos..].chars().next().map(|c| c.len_utf8()).unwrap_or(1)
}

/// True if only horizontal whitespace precedes `pos` on its line.
pub fn at_line_start(bytes: &[u8], pos: usize) -> bool {
    let mut i = pos;
    while i > 0 {
        match bytes[i - 1] {
            b' ' | b'\t' => i -= 1,
            b'\n' => return true,
            _ => return false,
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_match_bracket_skips_literals() {
        let src = b"(a, ')', `${(b)}`, /* ) */ c)";
        assert_eq!(match_bracket(src, 0), Some(src.len()));
        assert_eq!(match_bracket(b"{ a: [1, 2] } rest", 0), Some(13));
        assert_eq!(match_bracket(b"(unclosed", 0), None);
        assert_eq!(match_bracket(b"(a]", 0), None);
    }

    #[test]
    fn test_skip_template_nested() {
        let src = b"`a ${ `b ${c}` } d` tail";
        assert_eq!(skip_template(src, 0), 19);
    }

    #[test]
    fn test_identifier_helpers() {
        assert!(is_valid_identifier("Card"));
        assert!(is_valid_identifier("$el"));
        assert!(!is_valid_identifier("2fast"));
        assert!(!is_valid_identifier("default"));
        assert_eq!(word_at("const x", 0), Some("const"));
        assert!(keyword_at("type Props", 0, "type"));
        assert!(!keyword_at("typeof x", 0, "type"));
    }

    #[test]
    fn test_at_line_start() {
        let src = b"a\n   b";
        assert!(at_line_start(src, 5));
        assert!(at_line_start(src, 0));
        assert!(!at_line_start(src, 1));
    }
}
