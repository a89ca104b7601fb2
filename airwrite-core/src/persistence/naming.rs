//! Dataset entry names and natural ordering.

use std::cmp::Ordering;
use std::fmt;
use std::sync::LazyLock;

use regex::Regex;

/// Extension of every dataset entry.
pub const ENTRY_EXTENSION: &str = "npy";

static ENTRY_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d+)_(\d+)\.npy$").expect("entry pattern is a valid regex")
});

/// `{index}_{length}.npy`: `index` is unique within the directory and
/// `length` is the number of points in the stroke.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EntryName {
    pub index: u64,
    pub length: usize,
}

impl EntryName {
    pub fn new(index: u64, length: usize) -> Self {
        Self { index, length }
    }

    /// Parse a file name; anything not matching the pattern is not an entry.
    pub fn parse(file_name: &str) -> Option<Self> {
        let caps = ENTRY_PATTERN.captures(file_name)?;
        Some(Self {
            index: caps[1].parse().ok()?,
            length: caps[2].parse().ok()?,
        })
    }
}

impl fmt::Display for EntryName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}.{}", self.index, self.length, ENTRY_EXTENSION)
    }
}

/// Compare two strings treating each run of ASCII digits as a number, so
/// `"9_20.npy" < "10_3.npy"`.  Equal numeric values with different zero
/// padding order the shorter run first.
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    let mut ta = Tokens::new(a);
    let mut tb = Tokens::new(b);
    loop {
        match (ta.next(), tb.next()) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(x), Some(y)) => {
                let ord = match (x, y) {
                    (Token::Digits(x), Token::Digits(y)) => cmp_digits(x, y),
                    (Token::Digits(_), Token::Text(_)) => Ordering::Less,
                    (Token::Text(_), Token::Digits(_)) => Ordering::Greater,
                    (Token::Text(x), Token::Text(y)) => x.cmp(y),
                };
                if ord != Ordering::Equal {
                    return ord;
                }
            }
        }
    }
}

fn cmp_digits(a: &str, b: &str) -> Ordering {
    let ta = a.trim_start_matches('0');
    let tb = b.trim_start_matches('0');
    ta.len()
        .cmp(&tb.len())
        .then_with(|| ta.cmp(tb))
        .then_with(|| a.len().cmp(&b.len()))
}

#[derive(Debug, Clone, Copy)]
enum Token<'a> {
    Digits(&'a str),
    Text(&'a str),
}

struct Tokens<'a> {
    rest: &'a str,
}

impl<'a> Tokens<'a> {
    fn new(s: &'a str) -> Self {
        Self { rest: s }
    }
}

impl<'a> Iterator for Tokens<'a> {
    type Item = Token<'a>;

    fn next(&mut self) -> Option<Token<'a>> {
        let first = self.rest.chars().next()?;
        let digits = first.is_ascii_digit();
        let end = self
            .rest
            .find(|c: char| c.is_ascii_digit() != digits)
            .unwrap_or(self.rest.len());
        let (run, rest) = self.rest.split_at(end);
        self.rest = rest;
        Some(if digits {
            Token::Digits(run)
        } else {
            Token::Text(run)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_display() {
        let name = EntryName::parse("12_345.npy").expect("entry");
        assert_eq!(name, EntryName::new(12, 345));
        assert_eq!(name.to_string(), "12_345.npy");

        assert_eq!(EntryName::parse("12_345.npz"), None);
        assert_eq!(EntryName::parse("notes.npy"), None);
        assert_eq!(EntryName::parse("1_2_3.npy"), None);
        assert_eq!(EntryName::parse("_3.npy"), None);
    }

    #[test]
    fn test_numeric_runs_compare_numerically() {
        assert_eq!(natural_cmp("9_20.npy", "10_3.npy"), Ordering::Less);
        assert_eq!(natural_cmp("2_11.npy", "2_9.npy"), Ordering::Greater);
        assert_eq!(natural_cmp("frame100.png", "frame20.png"), Ordering::Greater);
        assert_eq!(natural_cmp("a", "a"), Ordering::Equal);
        assert_eq!(natural_cmp("a1", "a1b"), Ordering::Less);
        assert_eq!(natural_cmp("007", "7"), Ordering::Greater);
    }

    #[test]
    fn test_sorting_a_listing() {
        let mut names = vec!["10_12.npy", "2_40.npy", "1_15.npy", "100_11.npy", "11_13.npy"];
        names.sort_by(|a, b| natural_cmp(a, b));
        assert_eq!(
            names,
            vec!["1_15.npy", "2_40.npy", "10_12.npy", "11_13.npy", "100_11.npy"]
        );
    }
}
