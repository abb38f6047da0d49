//! Hierarchical names for components, instances, and ports.
//!
//! A [`Reference`] is a sequence of identifier and index parts with the
//! textual form `macro.out` or `micro[3][7].in[2]`. Component names are
//! references without index parts; an instance reference is a component
//! name followed by its index in the instance array.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::error::ReferenceError;

/// An index vector: the position of an instance in its component's
/// instance array, or a slot of a vector port.
///
/// Uses `SmallVec<[usize; 4]>` so arrays of up to four dimensions stay
/// off the heap.
pub type Index = SmallVec<[usize; 4]>;

// ── Identifier ──────────────────────────────────────────────────

/// A validated name part matching `[A-Za-z_][A-Za-z0-9_]*`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Identifier(String);

impl Identifier {
    /// Validate and wrap an identifier.
    pub fn new(text: impl Into<String>) -> Result<Self, ReferenceError> {
        let text = text.into();
        if is_valid_identifier(&text) {
            Ok(Self(text))
        } else {
            Err(ReferenceError::InvalidIdentifier { text })
        }
    }

    /// The identifier text.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn is_valid_identifier(text: &str) -> bool {
    let mut chars = text.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Identifier {
    type Error = ReferenceError;

    fn try_from(text: String) -> Result<Self, Self::Error> {
        Self::new(text)
    }
}

impl TryFrom<&str> for Identifier {
    type Error = ReferenceError;

    fn try_from(text: &str) -> Result<Self, Self::Error> {
        Self::new(text)
    }
}

impl From<Identifier> for String {
    fn from(id: Identifier) -> Self {
        id.0
    }
}

impl FromStr for Identifier {
    type Err = ReferenceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

// ── Part ────────────────────────────────────────────────────────

/// One part of a [`Reference`].
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Part {
    /// A named part, e.g. `micro` or `out`.
    Id(Identifier),
    /// An index part, e.g. the `3` in `micro[3]`.
    Index(usize),
}

// ── Reference ───────────────────────────────────────────────────

/// A hierarchical name made of identifier and index parts.
///
/// Always non-empty and always starts with an identifier.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Reference {
    parts: SmallVec<[Part; 4]>,
}

impl Reference {
    /// Build a reference from parts.
    ///
    /// Fails if `parts` is empty or does not start with an identifier.
    pub fn from_parts(parts: impl IntoIterator<Item = Part>) -> Result<Self, ReferenceError> {
        let parts: SmallVec<[Part; 4]> = parts.into_iter().collect();
        match parts.first() {
            None => Err(ReferenceError::Empty),
            Some(Part::Index(_)) => Err(ReferenceError::MustStartWithIdentifier {
                text: render(&parts),
            }),
            Some(Part::Id(_)) => Ok(Self { parts }),
        }
    }

    /// A single-identifier reference.
    pub fn from_identifier(id: Identifier) -> Self {
        let mut parts = SmallVec::new();
        parts.push(Part::Id(id));
        Self { parts }
    }

    /// All parts, in order.
    pub fn parts(&self) -> &[Part] {
        &self.parts
    }

    /// Number of parts.
    pub fn len(&self) -> usize {
        self.parts.len()
    }

    /// Always `false`; references have at least one part.
    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    /// Append an identifier part, e.g. `micro[3]` + `out` = `micro[3].out`.
    pub fn join(&self, id: &Identifier) -> Self {
        let mut parts = self.parts.clone();
        parts.push(Part::Id(id.clone()));
        Self { parts }
    }

    /// Append index parts, e.g. `micro` + `[3, 7]` = `micro[3][7]`.
    pub fn with_index(&self, index: &[usize]) -> Self {
        let mut parts = self.parts.clone();
        parts.extend(index.iter().copied().map(Part::Index));
        Self { parts }
    }

    /// The reference with any trailing index parts removed.
    pub fn without_trailing_ints(&self) -> Self {
        let keep = self.parts.len() - self.trailing_int_count();
        Self {
            parts: self.parts[..keep].iter().cloned().collect(),
        }
    }

    /// The trailing index parts as an index vector (empty if none).
    pub fn trailing_ints(&self) -> Index {
        let start = self.parts.len() - self.trailing_int_count();
        self.parts[start..]
            .iter()
            .filter_map(|p| match p {
                Part::Index(i) => Some(*i),
                Part::Id(_) => None,
            })
            .collect()
    }

    fn trailing_int_count(&self) -> usize {
        self.parts
            .iter()
            .rev()
            .take_while(|p| matches!(p, Part::Index(_)))
            .count()
    }

    /// Whether any part is an index.
    pub fn has_index(&self) -> bool {
        self.parts.iter().any(|p| matches!(p, Part::Index(_)))
    }

    /// Split off a trailing identifier: `a.b.port` → (`a.b`, `port`).
    ///
    /// Returns `None` if the reference has a single part or ends in an index.
    pub fn split_last_id(&self) -> Option<(Reference, &Identifier)> {
        if self.parts.len() < 2 {
            return None;
        }
        match self.parts.last() {
            Some(Part::Id(id)) => {
                let head = Self {
                    parts: self.parts[..self.parts.len() - 1].iter().cloned().collect(),
                };
                Some((head, id))
            }
            _ => None,
        }
    }
}

fn render(parts: &[Part]) -> String {
    let mut out = String::new();
    for (i, part) in parts.iter().enumerate() {
        match part {
            Part::Id(id) => {
                if i > 0 {
                    out.push('.');
                }
                out.push_str(id.as_str());
            }
            Part::Index(n) => {
                out.push('[');
                out.push_str(&n.to_string());
                out.push(']');
            }
        }
    }
    out
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&render(&self.parts))
    }
}

impl FromStr for Reference {
    type Err = ReferenceError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        if text.is_empty() {
            return Err(ReferenceError::Empty);
        }
        let invalid_index = || ReferenceError::InvalidIndex {
            text: text.to_string(),
        };

        let mut parts: SmallVec<[Part; 4]> = SmallVec::new();
        let mut rest = text;
        // A leading identifier, then any mix of `.ident` and `[n]`.
        let mut expect_id = true;
        while !rest.is_empty() {
            if expect_id {
                let end = rest.find(['.', '[']).unwrap_or(rest.len());
                let (name, tail) = rest.split_at(end);
                if name.is_empty() && parts.is_empty() {
                    return Err(ReferenceError::MustStartWithIdentifier {
                        text: text.to_string(),
                    });
                }
                parts.push(Part::Id(Identifier::new(name)?));
                rest = tail;
                expect_id = false;
            } else if let Some(tail) = rest.strip_prefix('.') {
                if tail.is_empty() {
                    return Err(ReferenceError::InvalidIdentifier {
                        text: String::new(),
                    });
                }
                rest = tail;
                expect_id = true;
            } else if let Some(tail) = rest.strip_prefix('[') {
                let close = tail.find(']').ok_or_else(invalid_index)?;
                let digits = &tail[..close];
                if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
                    return Err(invalid_index());
                }
                let n: usize = digits.parse().map_err(|_| invalid_index())?;
                parts.push(Part::Index(n));
                rest = &tail[close + 1..];
            } else {
                return Err(ReferenceError::InvalidIdentifier {
                    text: rest.to_string(),
                });
            }
        }
        Self::from_parts(parts)
    }
}

impl TryFrom<String> for Reference {
    type Error = ReferenceError;

    fn try_from(text: String) -> Result<Self, Self::Error> {
        text.parse()
    }
}

impl TryFrom<&str> for Reference {
    type Error = ReferenceError;

    fn try_from(text: &str) -> Result<Self, Self::Error> {
        text.parse()
    }
}

impl From<Reference> for String {
    fn from(r: Reference) -> Self {
        r.to_string()
    }
}

impl From<Identifier> for Reference {
    fn from(id: Identifier) -> Self {
        Self::from_identifier(id)
    }
}
