//! Combinational lookup tables over 4-valued logic.
//!
//! A [`LookupTable`] represents an n-ary function as a chain of 4-way
//! branches, one level per input, terminating in an output value. Tables are
//! immutable once built; the standard gate functions are process-wide
//! singletons initialized on first use and shared by every network.

use std::sync::{Arc, LazyLock};

use crate::logic::LogicValue;

/// One level of a lookup table: either a 4-way branch on the next input or a
/// terminal output value.
#[derive(Clone, Debug)]
enum TableNode {
    Branch(Box<[TableNode; 4]>),
    Leaf(LogicValue),
}

/// An immutable n-input combinational function table.
#[derive(Clone, Debug)]
pub struct LookupTable {
    root: TableNode,
    arity: usize,
}

impl LookupTable {
    /// Builds a table for `arity` inputs from an evaluation function.
    ///
    /// The function is invoked once per input combination (4^arity leaves),
    /// so tables are built eagerly and shared, never rebuilt per evaluation.
    pub fn from_fn<F>(arity: usize, f: F) -> Self
    where
        F: Fn(&[LogicValue]) -> LogicValue,
    {
        let mut inputs = Vec::with_capacity(arity);
        let root = Self::build(arity, &f, &mut inputs);
        LookupTable { root, arity }
    }

    fn build<F>(remaining: usize, f: &F, inputs: &mut Vec<LogicValue>) -> TableNode
    where
        F: Fn(&[LogicValue]) -> LogicValue,
    {
        if remaining == 0 {
            return TableNode::Leaf(f(inputs));
        }
        let mut children = Vec::with_capacity(4);
        for v in LogicValue::ALL {
            inputs.push(v);
            children.push(Self::build(remaining - 1, f, inputs));
            inputs.pop();
        }
        let boxed: Box<[TableNode; 4]> = match children.try_into() {
            Ok(arr) => Box::new(arr),
            Err(_) => unreachable!("exactly four children per branch"),
        };
        TableNode::Branch(boxed)
    }

    /// Builds an n-ary table by left-folding a binary function.
    pub fn fold2<F>(arity: usize, f: F) -> Self
    where
        F: Fn(LogicValue, LogicValue) -> LogicValue + Copy,
    {
        Self::from_fn(arity, move |inputs| {
            let mut acc = inputs[0];
            for &v in &inputs[1..] {
                acc = f(acc, v);
            }
            acc
        })
    }

    /// Inverts every leaf of the table.
    pub fn inverted(&self) -> Self {
        fn invert(node: &TableNode) -> TableNode {
            match node {
                TableNode::Leaf(v) => TableNode::Leaf(match v {
                    LogicValue::Zero => LogicValue::One,
                    LogicValue::One => LogicValue::Zero,
                    other => *other,
                }),
                TableNode::Branch(children) => TableNode::Branch(Box::new([
                    invert(&children[0]),
                    invert(&children[1]),
                    invert(&children[2]),
                    invert(&children[3]),
                ])),
            }
        }
        LookupTable {
            root: invert(&self.root),
            arity: self.arity,
        }
    }

    pub fn arity(&self) -> usize {
        self.arity
    }

    /// Walks the branch chain with one input per level.
    ///
    /// `inputs` must have exactly `arity` elements.
    pub fn lookup(&self, inputs: &[LogicValue]) -> LogicValue {
        debug_assert_eq!(inputs.len(), self.arity);
        let mut node = &self.root;
        for &v in inputs {
            match node {
                TableNode::Branch(children) => node = &children[v.index()],
                TableNode::Leaf(out) => return *out,
            }
        }
        match node {
            TableNode::Leaf(out) => *out,
            // Arity mismatch: fewer inputs than branch levels.
            TableNode::Branch(_) => LogicValue::X,
        }
    }
}

/// 4-valued AND: 0 is dominant, 1 & 1 = 1, anything else is X.
pub fn and2(a: LogicValue, b: LogicValue) -> LogicValue {
    use LogicValue::*;
    match (a, b) {
        (Zero, _) | (_, Zero) => Zero,
        (One, One) => One,
        _ => X,
    }
}

/// 4-valued OR: 1 is dominant, 0 | 0 = 0, anything else is X.
pub fn or2(a: LogicValue, b: LogicValue) -> LogicValue {
    use LogicValue::*;
    match (a, b) {
        (One, _) | (_, One) => One,
        (Zero, Zero) => Zero,
        _ => X,
    }
}

/// 4-valued XOR: defined only for driven inputs, X otherwise.
pub fn xor2(a: LogicValue, b: LogicValue) -> LogicValue {
    use LogicValue::*;
    match (a, b) {
        (Zero, Zero) | (One, One) => Zero,
        (Zero, One) | (One, Zero) => One,
        _ => X,
    }
}

/// Tristate bus resolution for two drivers.
///
/// Z resolves against anything to the other value; agreeing driven values
/// keep their value; any conflicting or unknown combination resolves to X.
pub fn resolve2(a: LogicValue, b: LogicValue) -> LogicValue {
    use LogicValue::*;
    match (a, b) {
        (Z, v) | (v, Z) => v,
        (Zero, Zero) => Zero,
        (One, One) => One,
        _ => X,
    }
}

/// The gate functions a network can instantiate by name.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum GateFn {
    And,
    Or,
    Nand,
    Nor,
    Xor,
    Xnor,
    /// 2:1 multiplexer; inputs are `[sel, a, b]`, output `a` when sel=0.
    Mux2,
    /// Tristate buffer; inputs are `[enable, data]`, output Z when disabled.
    TristateBuf,
}

impl GateFn {
    /// Fixed arity, or `None` for n-ary gates (2 or more inputs).
    pub fn fixed_arity(self) -> Option<usize> {
        match self {
            GateFn::Mux2 => Some(3),
            GateFn::TristateBuf => Some(2),
            _ => None,
        }
    }

    /// True when outputs of this gate may share a bus with other drivers.
    pub fn is_tristate(self) -> bool {
        matches!(self, GateFn::TristateBuf)
    }

    /// Returns the shared table for 2-input forms, or builds an n-ary one.
    pub fn table(self, arity: usize) -> Arc<LookupTable> {
        if arity == 2 || self.fixed_arity().is_some() {
            return match self {
                GateFn::And => AND2.clone(),
                GateFn::Or => OR2.clone(),
                GateFn::Nand => NAND2.clone(),
                GateFn::Nor => NOR2.clone(),
                GateFn::Xor => XOR2.clone(),
                GateFn::Xnor => XNOR2.clone(),
                GateFn::Mux2 => MUX2.clone(),
                GateFn::TristateBuf => TRISTATE_BUF.clone(),
            };
        }
        Arc::new(match self {
            GateFn::And => LookupTable::fold2(arity, and2),
            GateFn::Or => LookupTable::fold2(arity, or2),
            GateFn::Nand => LookupTable::fold2(arity, and2).inverted(),
            GateFn::Nor => LookupTable::fold2(arity, or2).inverted(),
            GateFn::Xor => LookupTable::fold2(arity, xor2),
            GateFn::Xnor => LookupTable::fold2(arity, xor2).inverted(),
            GateFn::Mux2 | GateFn::TristateBuf => unreachable!("fixed arity"),
        })
    }
}

impl std::fmt::Display for GateFn {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            GateFn::And => "and",
            GateFn::Or => "or",
            GateFn::Nand => "nand",
            GateFn::Nor => "nor",
            GateFn::Xor => "xor",
            GateFn::Xnor => "xnor",
            GateFn::Mux2 => "mux2",
            GateFn::TristateBuf => "tristate",
        };
        f.write_str(s)
    }
}

// Shared immutable singletons. Read-only after initialization, so they can be
// handed to any number of devices without synchronization.

pub static AND2: LazyLock<Arc<LookupTable>> =
    LazyLock::new(|| Arc::new(LookupTable::fold2(2, and2)));

pub static OR2: LazyLock<Arc<LookupTable>> =
    LazyLock::new(|| Arc::new(LookupTable::fold2(2, or2)));

pub static NAND2: LazyLock<Arc<LookupTable>> =
    LazyLock::new(|| Arc::new(LookupTable::fold2(2, and2).inverted()));

pub static NOR2: LazyLock<Arc<LookupTable>> =
    LazyLock::new(|| Arc::new(LookupTable::fold2(2, or2).inverted()));

pub static XOR2: LazyLock<Arc<LookupTable>> =
    LazyLock::new(|| Arc::new(LookupTable::fold2(2, xor2)));

pub static XNOR2: LazyLock<Arc<LookupTable>> =
    LazyLock::new(|| Arc::new(LookupTable::fold2(2, xor2).inverted()));

/// 2:1 mux on `[sel, a, b]`. An unknown select still produces a driven
/// output when both data inputs agree.
pub static MUX2: LazyLock<Arc<LookupTable>> = LazyLock::new(|| {
    Arc::new(LookupTable::from_fn(3, |inputs| {
        let (sel, a, b) = (inputs[0], inputs[1], inputs[2]);
        match sel {
            LogicValue::Zero => a,
            LogicValue::One => b,
            _ => {
                if a == b && a.is_driven() {
                    a
                } else {
                    LogicValue::X
                }
            }
        }
    }))
});

/// Tristate buffer on `[enable, data]`: Z when disabled, X on unknown enable.
pub static TRISTATE_BUF: LazyLock<Arc<LookupTable>> = LazyLock::new(|| {
    Arc::new(LookupTable::from_fn(2, |inputs| {
        let (en, data) = (inputs[0], inputs[1]);
        match en {
            LogicValue::One => data,
            LogicValue::Zero => LogicValue::Z,
            _ => LogicValue::X,
        }
    }))
});

/// N-ary bus resolution table for synthesized bus-resolver devices.
pub fn bus_resolution(arity: usize) -> Arc<LookupTable> {
    if arity == 2 {
        BUS2.clone()
    } else {
        Arc::new(LookupTable::fold2(arity, resolve2))
    }
}

pub static BUS2: LazyLock<Arc<LookupTable>> =
    LazyLock::new(|| Arc::new(LookupTable::fold2(2, resolve2)));

#[cfg(test)]
mod tests {
    use super::*;
    use LogicValue::*;

    #[test]
    fn test_and2_table() {
        assert_eq!(AND2.lookup(&[One, One]), One);
        assert_eq!(AND2.lookup(&[Zero, X]), Zero);
        assert_eq!(AND2.lookup(&[One, X]), X);
        assert_eq!(AND2.lookup(&[Z, One]), X);
    }

    #[test]
    fn test_or_xor_tables() {
        assert_eq!(OR2.lookup(&[One, X]), One);
        assert_eq!(OR2.lookup(&[Zero, Zero]), Zero);
        assert_eq!(XOR2.lookup(&[One, Zero]), One);
        assert_eq!(XOR2.lookup(&[One, Z]), X);
        assert_eq!(XNOR2.lookup(&[One, One]), One);
    }

    #[test]
    fn test_inverted() {
        assert_eq!(NAND2.lookup(&[One, One]), Zero);
        assert_eq!(NAND2.lookup(&[Zero, X]), One);
        // X stays X under inversion
        assert_eq!(NAND2.lookup(&[One, X]), X);
    }

    #[test]
    fn test_mux2() {
        assert_eq!(MUX2.lookup(&[Zero, One, Zero]), One);
        assert_eq!(MUX2.lookup(&[One, One, Zero]), Zero);
        // Unknown select, agreeing data
        assert_eq!(MUX2.lookup(&[X, One, One]), One);
        assert_eq!(MUX2.lookup(&[X, One, Zero]), X);
    }

    #[test]
    fn test_tristate() {
        assert_eq!(TRISTATE_BUF.lookup(&[One, Zero]), Zero);
        assert_eq!(TRISTATE_BUF.lookup(&[Zero, One]), Z);
        assert_eq!(TRISTATE_BUF.lookup(&[X, One]), X);
    }

    #[test]
    fn test_bus_resolution() {
        assert_eq!(BUS2.lookup(&[Z, One]), One);
        assert_eq!(BUS2.lookup(&[Zero, One]), X);
        assert_eq!(BUS2.lookup(&[Z, Z]), Z);
        assert_eq!(BUS2.lookup(&[Zero, Zero]), Zero);

        let bus3 = bus_resolution(3);
        assert_eq!(bus3.lookup(&[Z, Z, One]), One);
        assert_eq!(bus3.lookup(&[Z, Zero, One]), X);
    }

    #[test]
    fn test_nary_fold() {
        let and4 = GateFn::And.table(4);
        assert_eq!(and4.lookup(&[One, One, One, One]), One);
        assert_eq!(and4.lookup(&[One, One, Zero, One]), Zero);
        assert_eq!(and4.lookup(&[One, One, X, One]), X);
    }

    #[test]
    fn test_singleton_sharing() {
        let a = GateFn::And.table(2);
        let b = GateFn::And.table(2);
        assert!(Arc::ptr_eq(&a, &b));
    }
}
