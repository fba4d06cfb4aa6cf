//! Glob pattern matching for key listing and pattern subscriptions
//!
//! Supports:
//! - `*` : any run of bytes (including none)
//! - `?` : exactly one byte
//! - `[abc]`, `[a-z]`, `[^a]` : byte classes
//! - `\x` : literal `x`

/// Check if `input` matches the glob `pattern`
pub fn glob_match(pattern: &[u8], input: &[u8]) -> bool {
    let (mut p, mut i) = (0, 0);
    // Position after the last `*` and the input position it was tried at
    let mut backtrack: Option<(usize, usize)> = None;

    while i < input.len() {
        let step = match pattern.get(p) {
            Some(b'*') => {
                backtrack = Some((p + 1, i));
                p += 1;
                continue;
            }
            Some(b'?') => Some(1),
            Some(b'[') => match match_class(&pattern[p..], input[i]) {
                Some((true, width)) => Some(width),
                _ => None,
            },
            Some(b'\\') if p + 1 < pattern.len() => {
                if pattern[p + 1] == input[i] {
                    Some(2)
                } else {
                    None
                }
            }
            Some(&c) if c == input[i] => Some(1),
            _ => None,
        };

        match (step, backtrack) {
            (Some(width), _) => {
                p += width;
                i += 1;
            }
            (None, Some((star_p, star_i))) => {
                // let the last `*` swallow one more byte
                p = star_p;
                i = star_i + 1;
                backtrack = Some((star_p, star_i + 1));
            }
            (None, None) => return false,
        }
    }

    pattern[p..].iter().all(|&c| c == b'*')
}

/// Match one byte against a `[...]` class at the start of `pattern`
///
/// Returns whether it matched and the width of the class in the pattern,
/// or `None` when the class is unterminated.
fn match_class(pattern: &[u8], byte: u8) -> Option<(bool, usize)> {
    let mut idx = 1;
    let negate = pattern.get(idx) == Some(&b'^');
    if negate {
        idx += 1;
    }

    let mut matched = false;
    loop {
        let c = *pattern.get(idx)?;
        if c == b']' {
            break;
        }
        if c == b'\\' {
            idx += 1;
            if *pattern.get(idx)? == byte {
                matched = true;
            }
            idx += 1;
        } else if pattern.get(idx + 1) == Some(&b'-') && pattern.get(idx + 2).is_some_and(|&e| e != b']') {
            let (lo, hi) = (c.min(pattern[idx + 2]), c.max(pattern[idx + 2]));
            if (lo..=hi).contains(&byte) {
                matched = true;
            }
            idx += 3;
        } else {
            if c == byte {
                matched = true;
            }
            idx += 1;
        }
    }

    Some((matched != negate, idx + 1))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn m(pattern: &str, input: &str) -> bool {
        glob_match(pattern.as_bytes(), input.as_bytes())
    }

    #[test]
    fn test_star() {
        assert!(m("*", ""));
        assert!(m("*", "anything"));
        assert!(m("user:*", "user:1"));
        assert!(m("*:1", "user:1"));
        assert!(m("*ser*", "user:1"));
        assert!(m("u*r:*1", "user:11"));
        assert!(!m("user:*", "session:1"));
    }

    #[test]
    fn test_question_mark() {
        assert!(m("h?llo", "hello"));
        assert!(m("h?llo", "hallo"));
        assert!(!m("h?llo", "hllo"));
    }

    #[test]
    fn test_classes() {
        assert!(m("h[ae]llo", "hello"));
        assert!(!m("h[ae]llo", "hillo"));
        assert!(m("h[^e]llo", "hallo"));
        assert!(!m("h[^e]llo", "hello"));
        assert!(m("key[0-9]", "key7"));
        assert!(!m("key[0-9]", "keyx"));
        assert!(!m("h[ae", "hello"));
    }

    #[test]
    fn test_escape_and_exact() {
        assert!(m("news\\*", "news*"));
        assert!(!m("news\\*", "newsx"));
        assert!(m("my-channel", "my-channel"));
        assert!(!m("my-channel", "my-channel2"));
    }
}
