//! Kinds classify types
//!
//! - `Individual`: a concrete value type (`int`, `(*s -- *s int)`)
//! - `Generic`: a type constructor or polymorphic type, applied to arguments
//!   of the listed parameter kinds to produce an `Individual`
//! - `Sequence`: stack types and rest variables
//! - `Item`: anything that may sit on the stack (`Individual` or `Generic`)
//!
//! `Sequence` and `Item` are incomparable, which is what keeps a stack type
//! from ever being pushed as a stack item.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Kind {
    Individual,
    Generic(Vec<Kind>),
    Sequence,
    Item,
}

impl Kind {
    pub fn generic(params: impl IntoIterator<Item = Kind>) -> Self {
        Kind::Generic(params.into_iter().collect())
    }

    /// Number of arguments a type of this kind accepts
    pub fn arity(&self) -> usize {
        match self {
            Kind::Generic(params) => params.len(),
            _ => 0,
        }
    }

    pub fn is_item(&self) -> bool {
        self.is_subkind_of(&Kind::Item)
    }

    /// `self <: other` in the kind lattice
    ///
    /// Generic kinds of the same arity are contravariant in their parameter
    /// kinds: a constructor accepting any `Item` may stand in for one that
    /// only needs to accept `Individual` arguments.
    pub fn is_subkind_of(&self, other: &Kind) -> bool {
        match (self, other) {
            (Kind::Individual, Kind::Individual)
            | (Kind::Sequence, Kind::Sequence)
            | (Kind::Item, Kind::Item) => true,
            (Kind::Individual, Kind::Item) | (Kind::Generic(_), Kind::Item) => true,
            (Kind::Generic(ours), Kind::Generic(theirs)) => {
                ours.len() == theirs.len()
                    && ours
                        .iter()
                        .zip(theirs)
                        .all(|(ours, theirs)| theirs.is_subkind_of(ours))
            }
            _ => false,
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Kind::Individual => write!(f, "Individual"),
            Kind::Sequence => write!(f, "Sequence"),
            Kind::Item => write!(f, "Item"),
            Kind::Generic(params) => {
                write!(f, "Generic[")?;
                for (i, param) in params.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", param)?;
                }
                write!(f, "]")
            }
        }
    }
}
