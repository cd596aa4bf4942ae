use std::fmt::{self, Debug, Display};
use std::ops::Range;

use bstr::{BString, ByteSlice};
use nodemarshal::PatternFlags;
use regex::bytes::{Regex, RegexBuilder};

use crate::errors::ErrorKind;

/// A compiled pattern. Matching works on bytes, so positions are byte
/// offsets.
pub struct Regexp {
    pub source: BString,
    pub flags: PatternFlags,
    compiled: Regex,
}

/// Rewrite the escapes whose meaning differs between the two dialects.
fn translate(source: &str) -> String {
    let mut out = String::with_capacity(source.len());
    let mut chars = source.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('h') => out.push_str("[0-9a-fA-F]"),
            Some('H') => out.push_str("[^0-9a-fA-F]"),
            Some('Z') => out.push_str(r"(?:\n?\z)"),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

impl Regexp {
    pub fn new(source: impl Into<BString>, flags: PatternFlags) -> Result<Self, ErrorKind> {
        let source = source.into();
        let text = source
            .to_str()
            .map_err(|_| ErrorKind::InvalidRegex("pattern is not valid UTF-8".into()))?;

        let compiled = RegexBuilder::new(&translate(text))
            // `^` and `$` always match at line boundaries
            .multi_line(true)
            .case_insensitive(flags.contains(PatternFlags::IGNORECASE))
            .ignore_whitespace(flags.contains(PatternFlags::EXTENDED))
            .dot_matches_new_line(flags.contains(PatternFlags::MULTILINE))
            .build()
            .map_err(|e| ErrorKind::InvalidRegex(e.to_string()))?;

        Ok(Regexp {
            source,
            flags,
            compiled,
        })
    }

    /// Byte offset of the first match in `haystack`.
    pub fn find(&self, haystack: &[u8]) -> Option<usize> {
        self.compiled.find(haystack).map(|m| m.start())
    }

    pub fn is_match(&self, haystack: &[u8]) -> bool {
        self.compiled.is_match(haystack)
    }

    /// Byte ranges of all non-overlapping matches.
    pub fn ranges(&self, haystack: &[u8]) -> Vec<Range<usize>> {
        self.compiled.find_iter(haystack).map(|m| m.range()).collect()
    }
}

impl PartialEq for Regexp {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source && self.flags == other.flags
    }
}

impl Debug for Regexp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Regexp({self})")
    }
}

impl Display for Regexp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}/", self.source)?;
        for (flag, letter) in [
            (PatternFlags::MULTILINE, 'm'),
            (PatternFlags::IGNORECASE, 'i'),
            (PatternFlags::EXTENDED, 'x'),
        ] {
            if self.flags.contains(flag) {
                write!(f, "{letter}")?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use nodemarshal::PatternFlags;
    use rstest::rstest;

    use super::Regexp;

    #[rstest]
    #[case::plain("abc", PatternFlags::empty(), b"  d--abc", Some(5))]
    #[case::no_match("abc", PatternFlags::empty(), b"ABC", None)]
    #[case::ignorecase("abc", PatternFlags::IGNORECASE, b"xABC", Some(1))]
    #[case::line_anchor("^b", PatternFlags::empty(), b"a\nb", Some(2))]
    #[case::hex_digit(r"\h+", PatternFlags::empty(), b"zz0f", Some(2))]
    #[case::dot_all("a.b", PatternFlags::MULTILINE, b"a\nb", Some(0))]
    fn find(
        #[case] source: &str,
        #[case] flags: PatternFlags,
        #[case] haystack: &[u8],
        #[case] expected: Option<usize>,
    ) {
        let re = Regexp::new(source, flags).unwrap();
        assert_eq!(expected, re.find(haystack));
    }

    #[test]
    fn inspect() {
        let re = Regexp::new("a+", PatternFlags::IGNORECASE | PatternFlags::MULTILINE).unwrap();
        assert_eq!("/a+/mi", re.to_string());
    }

    #[test]
    fn invalid() {
        assert!(Regexp::new("(", PatternFlags::empty()).is_err());
    }
}
