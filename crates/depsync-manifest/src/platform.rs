//! Platform predicates.
//!
//! Predicates are written as `cfg(...)` expressions over platform names and
//! evaluated once, at load time, against the configured universe of
//! platforms. The result is a [`PlatformSet`]: the subset of the universe on
//! which the predicate holds. Disjunction of predicates is set union,
//! conjunction is intersection, and two predicates are compatible when their
//! sets intersect.
//!
//! ```
//! use depsync_manifest::platform::{PlatformUniverse, parse_predicate};
//!
//! let universe = PlatformUniverse::new(["linux", "macos", "windows"]);
//! let unix = parse_predicate("cfg(not(windows))", &universe).unwrap();
//! assert_eq!(unix.to_string(), "linux, macos");
//! ```

use std::collections::BTreeSet;
use std::fmt;

use serde::Serialize;

use crate::error::{Error, Result};

/// The closed set of platform names a workspace builds for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformUniverse {
    names: BTreeSet<String>,
}

impl PlatformUniverse {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: names.into_iter().map(Into::into).collect(),
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    /// The set containing every platform.
    pub fn all(&self) -> PlatformSet {
        PlatformSet(self.names.clone())
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }
}

impl Default for PlatformUniverse {
    fn default() -> Self {
        Self::new(["linux", "macos", "windows"])
    }
}

/// A set of platforms, always a subset of some [`PlatformUniverse`].
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct PlatformSet(BTreeSet<String>);

impl PlatformSet {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn single(name: impl Into<String>) -> Self {
        Self(BTreeSet::from([name.into()]))
    }

    pub fn union(&self, other: &Self) -> Self {
        Self(self.0.union(&other.0).cloned().collect())
    }

    pub fn intersection(&self, other: &Self) -> Self {
        Self(self.0.intersection(&other.0).cloned().collect())
    }

    pub fn difference(&self, other: &Self) -> Self {
        Self(self.0.difference(&other.0).cloned().collect())
    }

    /// Compatible predicates share at least one platform.
    pub fn intersects(&self, other: &Self) -> bool {
        !self.0.is_disjoint(&other.0)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains(name)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

impl fmt::Display for PlatformSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return f.write_str("none");
        }
        let names: Vec<&str> = self.iter().collect();
        f.write_str(&names.join(", "))
    }
}

impl<S: Into<String>> FromIterator<S> for PlatformSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token<'a> {
    Ident(&'a str),
    Open,
    Close,
    Comma,
}

fn tokenize(input: &str) -> std::result::Result<Vec<Token<'_>>, String> {
    let mut tokens = Vec::new();
    let mut chars = input.char_indices().peekable();

    while let Some(&(start, c)) = chars.peek() {
        match c {
            '(' => {
                tokens.push(Token::Open);
                chars.next();
            }
            ')' => {
                tokens.push(Token::Close);
                chars.next();
            }
            ',' => {
                tokens.push(Token::Comma);
                chars.next();
            }
            c if c.is_whitespace() => {
                chars.next();
            }
            c if c.is_ascii_alphanumeric() || c == '_' || c == '-' => {
                let mut end = start;
                while let Some(&(i, c)) = chars.peek() {
                    if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                        end = i + c.len_utf8();
                        chars.next();
                    } else {
                        break;
                    }
                }
                tokens.push(Token::Ident(&input[start..end]));
            }
            other => return Err(format!("unexpected character '{other}'")),
        }
    }

    Ok(tokens)
}

struct Parser<'a, 'u> {
    tokens: Vec<Token<'a>>,
    pos: usize,
    universe: &'u PlatformUniverse,
}

impl<'a> Parser<'a, '_> {
    fn peek(&self) -> Option<&Token<'a>> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token<'a>> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    fn expect(&mut self, expected: Token<'a>) -> std::result::Result<(), String> {
        match self.next() {
            Some(token) if token == expected => Ok(()),
            Some(token) => Err(format!("expected {expected:?}, found {token:?}")),
            None => Err(format!("expected {expected:?}, found end of input")),
        }
    }

    fn predicate(&mut self) -> std::result::Result<PlatformSet, String> {
        if self.peek() == Some(&Token::Ident("cfg")) {
            self.next();
            self.expect(Token::Open)?;
            let set = self.expr()?;
            self.expect(Token::Close)?;
            Ok(set)
        } else {
            self.expr()
        }
    }

    fn expr(&mut self) -> std::result::Result<PlatformSet, String> {
        match self.next() {
            Some(Token::Ident("not")) => {
                self.expect(Token::Open)?;
                let inner = self.expr()?;
                self.expect(Token::Close)?;
                Ok(self.universe.all().difference(&inner))
            }
            Some(Token::Ident("any")) => {
                let items = self.list()?;
                Ok(items
                    .iter()
                    .fold(PlatformSet::empty(), |acc, set| acc.union(set)))
            }
            Some(Token::Ident("all")) => {
                let items = self.list()?;
                Ok(items
                    .iter()
                    .fold(self.universe.all(), |acc, set| acc.intersection(set)))
            }
            Some(Token::Ident(name)) => {
                if self.universe.contains(name) {
                    Ok(PlatformSet::single(name))
                } else {
                    Err(format!("unknown platform '{name}'"))
                }
            }
            Some(token) => Err(format!("unexpected {token:?}")),
            None => Err("unexpected end of input".to_string()),
        }
    }

    fn list(&mut self) -> std::result::Result<Vec<PlatformSet>, String> {
        self.expect(Token::Open)?;
        let mut items = Vec::new();
        if self.peek() == Some(&Token::Close) {
            self.next();
            return Ok(items);
        }
        loop {
            items.push(self.expr()?);
            match self.next() {
                Some(Token::Comma) if self.peek() == Some(&Token::Close) => {
                    self.next();
                    return Ok(items);
                }
                Some(Token::Comma) => continue,
                Some(Token::Close) => return Ok(items),
                Some(token) => return Err(format!("expected ',' or ')', found {token:?}")),
                None => return Err("unterminated list".to_string()),
            }
        }
    }
}

/// Evaluate a platform predicate against `universe`.
pub fn parse_predicate(predicate: &str, universe: &PlatformUniverse) -> Result<PlatformSet> {
    let invalid = |reason: String| Error::InvalidPlatform {
        predicate: predicate.to_string(),
        reason,
    };

    let tokens = tokenize(predicate).map_err(invalid)?;
    if tokens.is_empty() {
        return Err(invalid("empty predicate".to_string()));
    }

    let mut parser = Parser {
        tokens,
        pos: 0,
        universe,
    };
    let set = parser.predicate().map_err(invalid)?;
    if let Some(token) = parser.peek() {
        return Err(invalid(format!("trailing input at {token:?}")));
    }
    Ok(set)
}
