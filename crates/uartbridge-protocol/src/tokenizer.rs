//! Splitting of raw serial bytes into delimiter-separated tokens.
//!
//! The tokenizer works on a byte slice whose length is known; it never looks
//! for a NUL terminator, so stale bytes beyond the valid region of a reused
//! buffer can not leak into a token.

use std::iter::FusedIterator;

/// Lazy iterator over the tokens of a byte buffer.
///
/// Created by [`tokenize`]. Consecutive delimiters yield empty tokens, which
/// callers treat as no-ops. The empty remainder after a trailing delimiter is
/// not yielded, so `"A>>>B>>>"` produces exactly `A` and `B`.
#[derive(Debug, Clone)]
pub struct Tokens<'a> {
    /// Unconsumed input, `None` once exhausted.
    rest: Option<&'a [u8]>,
    delimiter: &'a [u8],
}

/// Split `buf` on every occurrence of `delimiter`.
///
/// An empty delimiter yields the whole buffer as a single token.
pub fn tokenize<'a>(buf: &'a [u8], delimiter: &'a [u8]) -> Tokens<'a> {
    Tokens {
        rest: Some(buf),
        delimiter,
    }
}

impl<'a> Iterator for Tokens<'a> {
    type Item = &'a [u8];

    fn next(&mut self) -> Option<&'a [u8]> {
        let rest = self.rest?;
        if rest.is_empty() {
            self.rest = None;
            return None;
        }

        match find_subslice(rest, self.delimiter) {
            Some(pos) => {
                self.rest = Some(&rest[pos + self.delimiter.len()..]);
                Some(&rest[..pos])
            }
            None => {
                self.rest = None;
                Some(rest)
            }
        }
    }
}

impl FusedIterator for Tokens<'_> {}

impl<'a> Tokens<'a> {
    /// Only the tokens that were closed by a delimiter.
    ///
    /// A trailing segment with no delimiter after it may be the first half of
    /// a frame split across two reads; it is dropped here. With an empty
    /// delimiter nothing is ever terminated.
    pub fn terminated(self) -> Terminated<'a> {
        Terminated { tokens: self }
    }
}

/// Iterator over delimiter-terminated tokens, created by
/// [`Tokens::terminated`].
#[derive(Debug, Clone)]
pub struct Terminated<'a> {
    tokens: Tokens<'a>,
}

impl<'a> Terminated<'a> {
    /// The unterminated tail, if any input is left without a delimiter.
    pub fn remainder(&self) -> Option<&'a [u8]> {
        self.tokens
            .rest
            .filter(|rest| !rest.is_empty() && find_subslice(rest, self.tokens.delimiter).is_none())
    }
}

impl<'a> Iterator for Terminated<'a> {
    type Item = &'a [u8];

    fn next(&mut self) -> Option<&'a [u8]> {
        let rest = self.tokens.rest?;
        find_subslice(rest, self.tokens.delimiter)?;
        self.tokens.next()
    }
}

impl FusedIterator for Terminated<'_> {}

/// Position of the first occurrence of `needle` in `haystack`.
pub(crate) fn find_subslice(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || needle.len() > haystack.len() {
        return None;
    }
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::FRAME_DELIMITER;

    fn tokens(buf: &[u8]) -> Vec<&[u8]> {
        tokenize(buf, FRAME_DELIMITER.as_bytes()).collect()
    }

    #[test]
    fn test_two_terminated_frames() {
        let out = tokens(b"CMD+TEM=21>>>CMD+TEM=22>>>");
        assert_eq!(out, vec![&b"CMD+TEM=21"[..], &b"CMD+TEM=22"[..]]);
    }

    #[test]
    fn test_unterminated_tail_is_yielded() {
        let out = tokens(b"CMD+TEM=21>>>CMD+TEM=2");
        assert_eq!(out, vec![&b"CMD+TEM=21"[..], &b"CMD+TEM=2"[..]]);
    }

    #[test]
    fn test_terminated_drops_split_frame() {
        let buf = b"CMD+TEM=21>>>CMD+TEM=2";
        let mut frames = tokenize(buf, FRAME_DELIMITER.as_bytes()).terminated();
        assert_eq!(frames.next(), Some(&b"CMD+TEM=21"[..]));
        assert_eq!(frames.remainder(), Some(&b"CMD+TEM=2"[..]));
        assert_eq!(frames.next(), None);
        assert_eq!(frames.next(), None);
    }

    #[test]
    fn test_terminated_keeps_every_closed_token() {
        let out: Vec<_> = tokenize(b"A>>>>>>B>>>", FRAME_DELIMITER.as_bytes())
            .terminated()
            .collect();
        assert_eq!(out, vec![&b"A"[..], &b""[..], &b"B"[..]]);

        let mut frames = tokenize(b"A>>>B>>>", FRAME_DELIMITER.as_bytes()).terminated();
        assert_eq!(frames.by_ref().count(), 2);
        assert_eq!(frames.remainder(), None);
    }

    #[test]
    fn test_terminated_without_delimiter_is_empty() {
        let mut frames = tokenize(b"5", FRAME_DELIMITER.as_bytes()).terminated();
        assert_eq!(frames.remainder(), Some(&b"5"[..]));
        assert_eq!(frames.next(), None);
        assert_eq!(tokenize(b"abc", b"").terminated().count(), 0);
    }

    #[test]
    fn test_consecutive_delimiters_yield_empty_tokens() {
        let out = tokens(b"A>>>>>>B");
        assert_eq!(out, vec![&b"A"[..], &b""[..], &b"B"[..]]);

        let out = tokens(b">>>A");
        assert_eq!(out, vec![&b""[..], &b"A"[..]]);
    }

    #[test]
    fn test_empty_input() {
        assert!(tokens(b"").is_empty());
    }

    #[test]
    fn test_delimiter_only() {
        assert_eq!(tokens(b">>>"), vec![&b""[..]]);
    }

    #[test]
    fn test_partial_delimiter_stays_in_token() {
        // An LED frame read back ends with one '>' too many.
        let out = tokens(b"CMD+LED=1>>>>");
        assert_eq!(out, vec![&b"CMD+LED=1"[..], &b">"[..]]);
    }

    #[test]
    fn test_empty_delimiter() {
        let out: Vec<_> = tokenize(b"abc", b"").collect();
        assert_eq!(out, vec![&b"abc"[..]]);
    }

    #[test]
    fn test_fused_after_exhaustion() {
        let mut iter = tokenize(b"A>>>", b">>>");
        assert_eq!(iter.next(), Some(&b"A"[..]));
        assert_eq!(iter.next(), None);
        assert_eq!(iter.next(), None);
    }

    #[test]
    fn test_non_utf8_bytes() {
        let out = tokens(&[0xff, 0xfe, b'>', b'>', b'>', b'x']);
        assert_eq!(out, vec![&[0xff, 0xfe][..], &b"x"[..]]);
    }
}
