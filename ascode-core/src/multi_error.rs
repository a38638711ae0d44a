//! Aggregate of independent failures.

use std::error::Error as StdError;
use std::fmt;

pub type BoxError = Box<dyn StdError + Send + Sync>;

/// Collects independent errors so they can be reported together.
#[derive(Debug, Default)]
pub struct MultiError(Vec<BoxError>);

impl MultiError {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, err: impl Into<BoxError>) {
        self.0.push(err.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &(dyn StdError + Send + Sync + 'static)> {
        self.0.iter().map(|e| e.as_ref())
    }
}

impl fmt::Display for MultiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, err) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{err}")?;
        }
        Ok(())
    }
}

impl StdError for MultiError {}
