use serde::{Deserialize, Serialize};
use std::fmt;

use super::Dot;

/// An ordered sequence of distinct dots owned by one object. Serialized as a
/// list of `[x, y]` pairs.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Location(Vec<Dot>);

impl Location {
    pub fn new(dots: Vec<Dot>) -> Self {
        Self(dots)
    }

    pub fn dot(dot: Dot) -> Self {
        Self(vec![dot])
    }

    pub fn contains(&self, dot: Dot) -> bool {
        self.0.contains(&dot)
    }

    /// A copy of this location without `dot`.
    pub fn delete(&self, dot: Dot) -> Location {
        Location(self.0.iter().copied().filter(|d| *d != dot).collect())
    }

    pub fn reversed(&self) -> Location {
        let mut dots = self.0.clone();
        dots.reverse();
        Location(dots)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Set equality: the same dots regardless of order.
    pub fn same_dots(&self, other: &Location) -> bool {
        self.0.len() == other.0.len() && self.0.iter().all(|dot| other.contains(*dot))
    }

    pub fn iter(&self) -> impl Iterator<Item = Dot> + '_ {
        self.0.iter().copied()
    }

    pub fn first(&self) -> Option<Dot> {
        self.0.first().copied()
    }

    pub fn dots(&self) -> &[Dot] {
        &self.0
    }

    pub fn into_dots(self) -> Vec<Dot> {
        self.0
    }
}

impl From<Vec<Dot>> for Location {
    fn from(dots: Vec<Dot>) -> Self {
        Location(dots)
    }
}

impl FromIterator<Dot> for Location {
    fn from_iter<I: IntoIterator<Item = Dot>>(iter: I) -> Self {
        Location(iter.into_iter().collect())
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (index, dot) in self.0.iter().enumerate() {
            if index > 0 {
                write!(f, ",")?;
            }
            write!(f, "{dot}")?;
        }
        write!(f, "]")
    }
}
