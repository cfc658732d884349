use std::sync::Arc;

use serde::Serialize;

use crate::error::{Error, Result};
use crate::model::{Model, Tables};

use super::positions::{Position, Positions};

/// One `(attribute, row, value)` edit the walker currently proposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Updater {
    /// Attribute whose table is edited.
    pub attribute: usize,
    /// Row within that attribute's table.
    pub row: usize,
    /// Replacement value for the cell.
    pub value: u8,
}

/// Enumerates, for a fixed edit budget `k`, all `k`-position edit tuples and
/// the cartesian product of replacement values at those positions.
///
/// Owns a working copy of the model's aggregation tables; `apply`/`restore`
/// mutate and revert exactly the `k` cells named by the current line.
pub struct Walker {
    model: Arc<Model>,
    positions: Positions,
    exclude_original: bool,
    tables: Tables,

    k: usize,
    line: Vec<usize>,
    line_done: bool,

    value_ranges: Vec<Vec<u8>>,
    original_values: Vec<u8>,
    value_idx: Vec<usize>,
    value_done: bool,
}

impl Walker {
    /// Builds a walker over `positions`, excluding the original cell value
    /// from the replacement set when `exclude_original` is set (the
    /// default recommended by the design notes).
    pub fn new(model: Arc<Model>, positions: Positions, exclude_original: bool) -> Self {
        let tables = model.tables();
        Self {
            model,
            positions,
            exclude_original,
            tables,
            k: 0,
            line: Vec::new(),
            line_done: true,
            value_ranges: Vec::new(),
            original_values: Vec::new(),
            value_idx: Vec::new(),
            value_done: true,
        }
    }

    /// Current working tables, reflecting any applied (not yet restored) edit.
    pub fn tables(&self) -> &Tables {
        &self.tables
    }

    /// Sets the edit-tuple size `k` and resets both enumerations to their
    /// first configuration.
    pub fn init_walkers(&mut self, k: usize) -> Result<()> {
        if k == 0 || k > self.positions.len() {
            return Err(Error::InternalError(format!(
                "walker k={} out of range [1, {}]",
                k,
                self.positions.len()
            )));
        }
        log::trace!("walker: init_walkers k={k} over {} positions", self.positions.len());
        self.k = k;
        self.line = (0..k).collect();
        self.line_done = false;
        self.init_next_value();
        Ok(())
    }

    /// Resets the value (inner) enumeration for the current line, without
    /// touching the line (outer) enumeration.
    pub fn init_next_value(&mut self) {
        self.value_ranges = self
            .line
            .iter()
            .map(|&idx| self.candidate_values(self.positions.get(idx)))
            .collect();
        self.original_values = self
            .line
            .iter()
            .map(|&idx| {
                let position = self.positions.get(idx);
                self.tables.cell(position.attribute, position.row)
            })
            .collect();
        self.value_idx = vec![0; self.k];
        self.value_done = self.value_ranges.iter().any(Vec::is_empty);
    }

    fn candidate_values(&self, position: Position) -> Vec<u8> {
        let scale_size = self.model.attributes()[position.attribute].scale.len();
        let original = self.tables.cell(position.attribute, position.row);
        (0..scale_size as u8)
            .filter(|&v| !self.exclude_original || v != original)
            .collect()
    }

    /// Whether the value enumeration currently holds a usable tuple (false
    /// only when some position's candidate-value range is empty).
    pub fn has_value(&self) -> bool {
        !self.value_done
    }

    /// Advances the value (inner) enumeration; mixed-radix, last position
    /// fastest. Returns `false` once the cartesian product is exhausted.
    pub fn next_value(&mut self) -> bool {
        if self.value_done {
            return false;
        }
        let mut i = self.k;
        loop {
            if i == 0 {
                self.value_done = true;
                return false;
            }
            i -= 1;
            self.value_idx[i] += 1;
            if self.value_idx[i] < self.value_ranges[i].len() {
                return true;
            }
            self.value_idx[i] = 0;
        }
    }

    /// Advances the line (outer) enumeration by one `k`-combination step;
    /// resets the value enumeration when it advances. Returns `false` once
    /// the outer combinations are exhausted.
    pub fn next_line(&mut self) -> bool {
        if self.line_done {
            return false;
        }
        let n = self.positions.len();
        let k = self.k;
        let mut t = k;
        loop {
            if t == 0 {
                self.line_done = true;
                return false;
            }
            t -= 1;
            if self.line[t] + 1 < n - (k - 1 - t) {
                self.line[t] += 1;
                for j in (t + 1)..k {
                    self.line[j] = self.line[j - 1] + 1;
                }
                self.init_next_value();
                return true;
            }
        }
    }

    /// Skips `steps` line advances at once (used by the parallel coordinator
    /// to stride-partition the outer enumeration across workers).
    pub fn skip_lines(&mut self, steps: usize) -> bool {
        for _ in 0..steps {
            if !self.next_line() {
                return false;
            }
        }
        true
    }

    /// Materializes the current edit tuple into the working tables.
    pub fn apply(&mut self) {
        for (t, &idx) in self.line.iter().enumerate() {
            let position = self.positions.get(idx);
            let value = self.value_ranges[t][self.value_idx[t]];
            self.tables.set_cell(position.attribute, position.row, value);
        }
    }

    /// Materializes an explicit value tuple (same order as the current line)
    /// into the working tables, bypassing the value enumeration. Used to
    /// replay a cached winning tuple found on a different options subset.
    pub fn apply_values(&mut self, values: &[u8]) {
        for (t, &idx) in self.line.iter().enumerate() {
            let position = self.positions.get(idx);
            self.tables.set_cell(position.attribute, position.row, values[t]);
        }
    }

    /// Reverts the working tables to their pre-`apply` state.
    pub fn restore(&mut self) {
        for (t, &idx) in self.line.iter().enumerate() {
            let position = self.positions.get(idx);
            self.tables
                .set_cell(position.attribute, position.row, self.original_values[t]);
        }
    }

    /// The current `k` edits as `(attribute, row, value)` triples.
    pub fn updaters(&self) -> Vec<Updater> {
        let values: Vec<u8> = (0..self.k).map(|t| self.value_ranges[t][self.value_idx[t]]).collect();
        self.updaters_for(&values)
    }

    /// Builds `(attribute, row, value)` triples for the current line from an
    /// explicit value tuple, without touching the tables.
    pub fn updaters_for(&self, values: &[u8]) -> Vec<Updater> {
        self.line
            .iter()
            .enumerate()
            .map(|(t, &idx)| {
                let position = self.positions.get(idx);
                Updater {
                    attribute: position.attribute,
                    row: position.row,
                    value: values[t],
                }
            })
            .collect()
    }
}
