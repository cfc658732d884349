use super::model::Tables;
use super::Model;
use crate::error::{Error, Result};

/// One step of the postorder-linearized evaluation program.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpCode {
    /// Pushes the basic value at leaf position `.0` (index into the option row).
    PushLeaf(usize),
    /// Pops the children of attribute `.0`, looks up the aggregation table, pushes the result.
    Reduce(usize),
}

/// A precompiled postorder evaluation program for a [`Model`].
///
/// Building the opcode stream once and replaying it per option row avoids
/// re-walking the attribute tree on every evaluation; see the walker and
/// search driver, which call `evaluate` once per option per candidate edit.
#[derive(Debug, Clone)]
pub struct Evaluator {
    ops: Vec<OpCode>,
}

impl Evaluator {
    /// Compiles the model into a postorder opcode stream.
    pub fn compile(model: &Model) -> Self {
        let mut ops = Vec::with_capacity(model.attributes().len() * 2);
        Self::compile_from(model, 0, &mut ops);
        Self { ops }
    }

    fn compile_from(model: &Model, attribute: usize, ops: &mut Vec<OpCode>) {
        let node = &model.attributes()[attribute];
        if node.is_leaf() {
            let leaf_position = model
                .leaves()
                .iter()
                .position(|&i| i == attribute)
                .expect("leaf attribute must appear in model.leaves()");
            ops.push(OpCode::PushLeaf(leaf_position));
            return;
        }
        for &child in &node.children {
            Self::compile_from(model, child, ops);
        }
        ops.push(OpCode::Reduce(attribute));
    }

    /// Opcodes in evaluation order.
    pub fn ops(&self) -> &[OpCode] {
        &self.ops
    }

    /// Evaluates a basic-value row `x` (indexed in `model.leaves()` order)
    /// against `tables`, returning the root scale value.
    pub fn evaluate(&self, model: &Model, tables: &Tables, x: &[u8]) -> Result<u8> {
        let mut stack: Vec<u8> = Vec::with_capacity(model.attributes().len());
        for op in &self.ops {
            match *op {
                OpCode::PushLeaf(j) => {
                    let value = *x.get(j).ok_or_else(|| {
                        Error::InternalError(format!("basic value row missing leaf {}", j))
                    })?;
                    stack.push(value);
                }
                OpCode::Reduce(a) => {
                    let attribute = &model.attributes()[a];
                    let n = attribute.children.len();
                    if stack.len() < n {
                        return Err(Error::InternalError(
                            "evaluator stack underflow".into(),
                        ));
                    }
                    let start = stack.len() - n;
                    let row = attribute
                        .row_of(stack[start..].iter().map(|&v| v as usize))
                        .ok_or_else(|| Error::InternalError("reduce on a leaf attribute".into()))?;
                    stack.truncate(start);
                    let value = tables.cell(a, row);
                    stack.push(value);
                }
            }
        }
        stack
            .pop()
            .filter(|_| stack.is_empty())
            .ok_or_else(|| Error::InternalError("evaluator did not reduce to a single root value".into()))
    }
}

/// Direct recursive evaluation (no precompiled opcode stream).
///
/// Used to test evaluator equivalence (invariant 2) and as the basis of
/// reduce-mode's touched-row discovery, which needs to observe every
/// intermediate `(attribute, row)` pair a row actually exercises.
pub fn evaluate_recursive(model: &Model, tables: &Tables, x: &[u8]) -> Result<u8> {
    evaluate_recursive_at(model, tables, x, 0, &mut |_, _| {})
}

pub(crate) fn evaluate_recursive_at<F: FnMut(usize, usize)>(
    model: &Model,
    tables: &Tables,
    x: &[u8],
    attribute: usize,
    touched: &mut F,
) -> Result<u8> {
    let node = &model.attributes()[attribute];
    if node.is_leaf() {
        let position = model
            .leaves()
            .iter()
            .position(|&i| i == attribute)
            .expect("leaf attribute must appear in model.leaves()");
        return x.get(position).copied().ok_or_else(|| {
            Error::InternalError(format!("basic value row missing leaf {}", position))
        });
    }
    let mut values = Vec::with_capacity(node.children.len());
    for &child in &node.children {
        values.push(evaluate_recursive_at(model, tables, x, child, touched)? as usize);
    }
    let row = node
        .row_of(values)
        .ok_or_else(|| Error::InternalError("reduce on a leaf attribute".into()))?;
    touched(attribute, row);
    Ok(tables.cell(attribute, row))
}

#[cfg(test)]
mod tests {
    use ndarray::Array1;

    use super::*;
    use crate::model::{Attribute, Scale};

    fn toy_model() -> Model {
        let a = Attribute::leaf("a", Scale::new(true, ["lo", "hi"]).unwrap());
        let b = Attribute::leaf("b", Scale::new(true, ["lo", "mid", "hi"]).unwrap());
        let root_scale = Scale::new(true, ["bad", "good"]).unwrap();
        let table = Array1::from(vec![0u8, 0, 0, 1, 1, 1]);
        let root = Attribute::inner("root", root_scale, vec![1, 2], vec![2, 3], table).unwrap();
        Model::new(vec![root, a, b]).unwrap()
    }

    #[test]
    fn compiles_to_postorder_opcodes() {
        let model = toy_model();
        let evaluator = Evaluator::compile(&model);
        assert_eq!(
            evaluator.ops(),
            &[OpCode::PushLeaf(0), OpCode::PushLeaf(1), OpCode::Reduce(0)]
        );
    }

    #[test]
    fn evaluates_known_rows() {
        let model = toy_model();
        let evaluator = Evaluator::compile(&model);
        let tables = model.tables();
        assert_eq!(evaluator.evaluate(&model, &tables, &[0, 0]).unwrap(), 0);
        assert_eq!(evaluator.evaluate(&model, &tables, &[1, 2]).unwrap(), 1);
        assert_eq!(evaluator.evaluate(&model, &tables, &[0, 2]).unwrap(), 0);
    }

    #[test]
    fn stays_within_root_scale_for_every_row() {
        let model = toy_model();
        let evaluator = Evaluator::compile(&model);
        let tables = model.tables();
        for av in 0..2u8 {
            for bv in 0..3u8 {
                let value = evaluator.evaluate(&model, &tables, &[av, bv]).unwrap();
                assert!((value as usize) < model.class_count());
            }
        }
    }

    #[test]
    fn stack_and_recursive_evaluation_agree() {
        let model = toy_model();
        let evaluator = Evaluator::compile(&model);
        let tables = model.tables();
        for av in 0..2u8 {
            for bv in 0..3u8 {
                let x = [av, bv];
                let stack = evaluator.evaluate(&model, &tables, &x).unwrap();
                let recursive = evaluate_recursive(&model, &tables, &x).unwrap();
                assert_eq!(stack, recursive);
            }
        }
    }
}
