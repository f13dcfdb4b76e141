use crate::prelude::*;

/// A term identifier consisting of an ID string (which is required to be unique)
/// and the source position of the term.
#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Hash, Clone, PartialOrd, Ord)]
pub struct Tid {
    /// The unique ID of the term.
    id: String,
    /// The source position of the term, e.g. `file.go:12:3`.
    pub position: String,
}

impl Tid {
    /// Generate a new term identifier with the given ID string
    /// and with unknown position.
    pub fn new<T: ToString>(val: T) -> Tid {
        Tid {
            id: val.to_string(),
            position: "UNKNOWN".to_string(),
        }
    }

    /// Set the source position of the term identifier.
    pub fn with_position(self, position: impl ToString) -> Tid {
        Tid {
            id: self.id,
            position: position.to_string(),
        }
    }

    /// The ID string of the term.
    pub fn id(&self) -> &str {
        &self.id
    }
}

impl std::fmt::Display for Tid {
    fn fmt(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(formatter, "{}", self.id)
    }
}

/// A term is an object inside a program with a source position and an unique ID (both contained in the `tid`).
#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Hash, Clone)]
pub struct Term<T> {
    /// The term identifier, which also contains the position of the term
    pub tid: Tid,
    /// The object
    pub term: T,
}

impl<T> Term<T> {
    /// Wrap an object into a term with the given ID string.
    pub fn new(id: impl ToString, term: T) -> Term<T> {
        Term {
            tid: Tid::new(id),
            term,
        }
    }
}
