use ndarray::Array1;

use super::Attribute;
use crate::error::{Error, Result};

/// A set of working aggregation tables, one slot per attribute (empty for leaves).
///
/// Cloning a `Tables` is the per-thread/per-walker "working copy" the search
/// mutates via `apply`/`restore` without touching the immutable [`Model`].
#[derive(Debug, Clone, PartialEq)]
pub struct Tables(Vec<Array1<u8>>);

impl Tables {
    /// Table for attribute `a`; empty for a leaf.
    pub fn get(&self, a: usize) -> &Array1<u8> {
        &self.0[a]
    }

    /// Cell `(a, row)`.
    pub fn cell(&self, a: usize, row: usize) -> u8 {
        self.0[a][row]
    }

    /// Overwrites cell `(a, row)`, returning the previous value.
    pub fn set_cell(&mut self, a: usize, row: usize, value: u8) -> u8 {
        let slot = &mut self.0[a][row];
        std::mem::replace(slot, value)
    }
}

/// An ordered deque of attributes; attribute `0` is the root.
#[derive(Debug, Clone)]
pub struct Model {
    attributes: Vec<Attribute>,
    leaves: Vec<usize>,
}

impl Model {
    /// Builds and validates a model from its attribute list (root at index 0).
    ///
    /// Validates: every child index is in bounds; the attributes form a tree
    /// (no cycles, every non-root attribute reachable exactly once from the
    /// root); every inner attribute's table row count matches its children.
    pub fn new(attributes: Vec<Attribute>) -> Result<Self> {
        if attributes.is_empty() {
            return Err(Error::ModelParseError("model has no attributes".into()));
        }
        for (i, attribute) in attributes.iter().enumerate() {
            for &child in &attribute.children {
                if child >= attributes.len() {
                    return Err(Error::ModelParseError(format!(
                        "attribute {} references out-of-bounds child {}",
                        i, child
                    )));
                }
            }
        }

        let mut visited = vec![false; attributes.len()];
        let mut stack = vec![0usize];
        while let Some(i) = stack.pop() {
            if visited[i] {
                return Err(Error::ModelParseError(format!(
                    "attribute {} reached more than once: not a tree",
                    i
                )));
            }
            visited[i] = true;
            for &child in &attributes[i].children {
                stack.push(child);
            }
        }
        if let Some(i) = visited.iter().position(|&v| !v) {
            return Err(Error::ModelParseError(format!(
                "attribute {} is unreachable from the root",
                i
            )));
        }

        let leaves: Vec<usize> = attributes
            .iter()
            .enumerate()
            .filter(|(_, a)| a.is_leaf())
            .map(|(i, _)| i)
            .collect();

        Ok(Self { attributes, leaves })
    }

    /// All attributes, root-first, index-addressable.
    pub fn attributes(&self) -> &[Attribute] {
        &self.attributes
    }

    /// The root attribute (index `0`).
    pub fn root(&self) -> &Attribute {
        &self.attributes[0]
    }

    /// Indices of leaf (basic) attributes, in fixed leaf order (ascending
    /// attribute index). Option rows are aligned to this order.
    pub fn leaves(&self) -> &[usize] {
        &self.leaves
    }

    /// Number of leaves, `L`.
    pub fn leaf_count(&self) -> usize {
        self.leaves.len()
    }

    /// Cardinality of the root scale, `C`, the kappa class count.
    pub fn class_count(&self) -> usize {
        self.root().scale.len()
    }

    /// Indices of inner (aggregation-table-owning) attributes.
    pub fn inner_attributes(&self) -> impl Iterator<Item = usize> + '_ {
        (0..self.attributes.len()).filter(|&i| !self.attributes[i].is_leaf())
    }

    /// Finds an attribute's index by name.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.attributes.iter().position(|a| a.name == name)
    }

    /// A fresh clone of the model's baseline aggregation tables.
    pub fn tables(&self) -> Tables {
        Tables(
            self.attributes
                .iter()
                .map(|a| a.table.clone().unwrap_or_else(|| Array1::from(Vec::new())))
                .collect(),
        )
    }
}
