use indexmap::IndexSet;

use crate::error::{Error, Result};

/// Maximum cardinality of a scale (root scale defines the kappa class count).
pub const MAX_SCALE_SIZE: usize = 127;

/// An ordered discrete value set of an attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scale {
    /// Whether the scale is monotone (ordered). Non-ordered scales are accepted
    /// but play no special role in the core.
    pub order: bool,
    values: IndexSet<String>,
}

impl Scale {
    /// Builds a scale from an ordered list of value names.
    pub fn new<I, S>(order: bool, values: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let values: IndexSet<String> = values.into_iter().map(Into::into).collect();
        if values.is_empty() || values.len() > MAX_SCALE_SIZE {
            return Err(Error::ModelParseError(format!(
                "scale cardinality {} out of range [1, {}]",
                values.len(),
                MAX_SCALE_SIZE
            )));
        }
        Ok(Self { order, values })
    }

    /// Number of values in the scale, `|S|`.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the scale has no values (never true for a constructed `Scale`).
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Index of a scale value by name.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.values.get_index_of(name)
    }

    /// Name of a scale value by index.
    pub fn name_of(&self, index: usize) -> Option<&str> {
        self.values.get_index(index).map(String::as_str)
    }

    /// All value names in scale order.
    pub fn values(&self) -> impl Iterator<Item = &str> {
        self.values.iter().map(String::as_str)
    }
}
