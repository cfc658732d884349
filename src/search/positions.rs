use std::collections::BTreeSet;

use crate::model::evaluate_recursive_at;
use crate::model::Model;
use crate::options::Options;

/// One mutable position: a row of an inner attribute's aggregation table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Position {
    /// Attribute owning the table.
    pub attribute: usize,
    /// Row within that attribute's table.
    pub row: usize,
}

/// The set of positions a walker may edit, `P` in the design notes.
#[derive(Debug, Clone)]
pub struct Positions {
    positions: Vec<Position>,
}

impl Positions {
    /// All `(attribute, row)` pairs over every inner attribute's table.
    pub fn full(model: &Model) -> Self {
        let mut positions = Vec::new();
        for a in model.inner_attributes() {
            for row in 0..model.attributes()[a].row_count() {
                positions.push(Position { attribute: a, row });
            }
        }
        Self { positions }
    }

    /// Positions pruned to rows actually touched by evaluating `options`
    /// against the model's baseline tables ("reduce mode").
    pub fn reduced(model: &Model, options: &Options) -> crate::error::Result<Self> {
        let tables = model.tables();
        let mut touched: BTreeSet<Position> = BTreeSet::new();
        for i in 0..options.len() {
            let row: Vec<u8> = options.row(i).to_vec();
            let mut sink = |attribute: usize, row: usize| {
                touched.insert(Position { attribute, row });
            };
            evaluate_recursive_at(model, &tables, &row, 0, &mut sink)?;
        }
        Ok(Self {
            positions: touched.into_iter().collect(),
        })
    }

    /// Number of mutable positions, `P_count`.
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    /// Whether there are no mutable positions.
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Position at index `i` in the fixed enumeration order.
    pub fn get(&self, i: usize) -> Position {
        self.positions[i]
    }

    /// All positions, in fixed enumeration order.
    pub fn as_slice(&self) -> &[Position] {
        &self.positions
    }
}
