//! Validated result count (`k`).

use std::fmt;
use std::num::NonZeroUsize;
use std::str::FromStr;

use crate::errors::IndexError;

/// Number of nearest neighbours to return; always at least 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ResultCount(NonZeroUsize);

impl ResultCount {
    pub fn new(k: usize) -> Result<Self, IndexError> {
        NonZeroUsize::new(k)
            .map(Self)
            .ok_or_else(|| IndexError::InvalidCount(k.to_string()))
    }

    pub fn get(self) -> usize {
        self.0.get()
    }
}

/// Parses the decimal string form sent by clients. Surrounding whitespace is
/// ignored; zero, negatives, and non-numbers are rejected.
impl FromStr for ResultCount {
    type Err = IndexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<NonZeroUsize>()
            .map(Self)
            .map_err(|_| IndexError::InvalidCount(s.to_string()))
    }
}

impl fmt::Display for ResultCount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}
