use ndarray::Array1;

use super::{RavelMultiIndex, Scale};
use crate::error::{Error, Result};

/// A tree node holding a name and a scale; inner nodes additionally own an
/// aggregation table.
#[derive(Debug, Clone)]
pub struct Attribute {
    /// Unique attribute name.
    pub name: String,
    /// Optional free-text description, mirrored from the source format.
    pub description: Option<String>,
    /// Optional group label, mirrored from the source format.
    pub group: Option<String>,
    /// The scale owned by this attribute.
    pub scale: Scale,
    /// Indices of child attributes, in fixed order. Empty for a leaf.
    pub children: Vec<usize>,
    /// Mixed-radix encoder for this attribute's child tuple, `None` for a leaf.
    pub(crate) ravel: Option<RavelMultiIndex>,
    /// Aggregation table, row-major in `ravel`'s encoding. `None` for a leaf.
    pub(crate) table: Option<Array1<u8>>,
}

impl Attribute {
    /// Builds a basic (leaf) attribute.
    pub fn leaf(name: impl Into<String>, scale: Scale) -> Self {
        Self {
            name: name.into(),
            description: None,
            group: None,
            scale,
            children: Vec::new(),
            ravel: None,
            table: None,
        }
    }

    /// Builds an inner attribute with an aggregation table.
    ///
    /// `child_scale_sizes` must list each child's `|S|` in the same order as
    /// `children`; `table` must have exactly `∏ child_scale_sizes` rows.
    pub fn inner(
        name: impl Into<String>,
        scale: Scale,
        children: Vec<usize>,
        child_scale_sizes: Vec<usize>,
        table: Array1<u8>,
    ) -> Result<Self> {
        if children.is_empty() {
            return Err(Error::ModelParseError(format!(
                "attribute {} declared as inner but has no children",
                name.into()
            )));
        }
        if children.len() != child_scale_sizes.len() {
            return Err(Error::InternalError(
                "children and child_scale_sizes length mismatch".into(),
            ));
        }
        let ravel = RavelMultiIndex::new(child_scale_sizes);
        if table.len() != ravel.len() {
            return Err(Error::ModelParseError(format!(
                "aggregation table for {} has {} rows, expected {}",
                name.into(),
                table.len(),
                ravel.len()
            )));
        }
        if table.iter().any(|&v| v as usize >= scale.len()) {
            return Err(Error::ModelParseError(format!(
                "aggregation table for {} references a value outside its scale",
                name.into()
            )));
        }
        Ok(Self {
            name: name.into(),
            description: None,
            group: None,
            scale,
            children,
            ravel: Some(ravel),
            table: Some(table),
        })
    }

    /// Whether this attribute is a basic attribute (leaf).
    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    /// Row count of this attribute's aggregation table, `0` for a leaf.
    pub fn row_count(&self) -> usize {
        self.ravel.as_ref().map_or(0, RavelMultiIndex::len)
    }

    /// Encodes a tuple of child values into a table row index.
    pub(crate) fn row_of<I>(&self, child_values: I) -> Option<usize>
    where
        I: IntoIterator<Item = usize>,
    {
        self.ravel.as_ref().map(|ravel| ravel.call(child_values))
    }
}
