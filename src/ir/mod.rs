//! SSA intermediate representation.
//!
//! Every IR entity is an index into per-function arenas: blocks refer to
//! instructions by [`InstId`], values refer to their defining instruction the
//! same way, and phi operands name predecessor blocks by [`BlockId`]. This
//! keeps the graph cycle-free from an ownership point of view even though
//! phis in loops reference each other.

pub mod builder;
pub mod printer;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstId(pub usize);

/// An SSA value: a constant, a function parameter, or the result of an
/// instruction (phis included).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Value {
    Const(i64),
    Param(usize),
    Inst(InstId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ty {
    I1,
    I8,
    I16,
    I32,
    I64,
    Ptr,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AluOp {
    Add,
    Sub,
    Mul,
    Sdiv,
    Srem,
    And,
    Or,
    Xor,
    Shl,
    Ashr,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    Ne,
    Slt,
    Sle,
    Sgt,
    Sge,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Inst {
    /// 64-bit arithmetic, bitwise, or shift operation.
    Alu { op: AluOp, lhs: Value, rhs: Value },
    /// Signed comparison, result is i1.
    Cmp { op: CmpOp, lhs: Value, rhs: Value },
    /// Sign-extend to i64.
    Sext { value: Value },
    /// Zero-extend to i64.
    Zext { value: Value },
    Select {
        cond: Value,
        if_true: Value,
        if_false: Value,
    },
    Load { ty: Ty, addr: Value },
    /// Store `value` (i64) through `addr`; narrow element types truncate.
    Store { ty: Ty, value: Value, addr: Value },
    /// Element address: `base` scaled by `index` elements of `ty`.
    Gep { ty: Ty, base: Value, index: Value },
    /// One i64 stack slot in the entry block, named after its variable.
    Alloca { name: String },
    PtrToInt { value: Value },
    IntToPtr { value: Value },
    Call { callee: String, args: Vec<Value> },
    Phi { incoming: Vec<(Value, BlockId)> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Terminator {
    Br {
        target: BlockId,
    },
    CondBr {
        cond: Value,
        then_target: BlockId,
        else_target: BlockId,
    },
    Ret {
        value: Value,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct BasicBlock {
    pub label: String,
    /// Phi instructions, kept ahead of the ordinary instruction list.
    pub phis: Vec<InstId>,
    pub instructions: Vec<InstId>,
    pub terminator: Option<Terminator>,
    pub predecessors: Vec<BlockId>,
}

impl BasicBlock {
    pub fn new(label: String) -> Self {
        Self {
            label,
            phis: Vec::new(),
            instructions: Vec::new(),
            terminator: None,
            predecessors: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Function {
    pub name: String,
    pub params: Vec<String>,
    /// Instruction arena; blocks hold indices into it.
    pub insts: Vec<Inst>,
    pub blocks: Vec<BasicBlock>,
    pub entry: BlockId,
}

impl Function {
    pub fn new(name: String, params: Vec<String>) -> Self {
        Self {
            name,
            params,
            insts: Vec::new(),
            blocks: Vec::new(),
            entry: BlockId(0),
        }
    }

    pub fn inst(&self, id: InstId) -> &Inst {
        &self.insts[id.0]
    }

    pub fn block(&self, id: BlockId) -> &BasicBlock {
        &self.blocks[id.0]
    }

    /// Type of a value, derived from its defining instruction. Everything is
    /// i64 except comparison results (i1), addresses (ptr), and narrow loads.
    pub fn value_ty(&self, value: Value) -> Ty {
        match value {
            Value::Const(_) | Value::Param(_) => Ty::I64,
            Value::Inst(id) => match self.inst(id) {
                Inst::Cmp { .. } => Ty::I1,
                Inst::Load { ty, .. } => *ty,
                Inst::Gep { .. } | Inst::Alloca { .. } | Inst::IntToPtr { .. } => Ty::Ptr,
                _ => Ty::I64,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Module {
    pub functions: Vec<Function>,
    pub externs: Vec<(String, usize)>,
}

/// Structural invariants the builder must uphold; a failure here is a bug in
/// the front end, not in the input program.
pub fn verify(module: &Module) -> Result<(), String> {
    for function in &module.functions {
        for block in &function.blocks {
            if block.terminator.is_none() {
                return Err(format!(
                    "block {} in @{} has no terminator",
                    block.label, function.name
                ));
            }
            for &phi_id in &block.phis {
                let Inst::Phi { incoming } = function.inst(phi_id) else {
                    return Err(format!(
                        "non-phi instruction in the phi list of block {} in @{}",
                        block.label, function.name
                    ));
                };
                if incoming.len() != block.predecessors.len() {
                    return Err(format!(
                        "phi in block {} of @{} has {} operands for {} predecessors",
                        block.label,
                        function.name,
                        incoming.len(),
                        block.predecessors.len()
                    ));
                }
                for (_, pred) in incoming {
                    if !block.predecessors.contains(pred) {
                        return Err(format!(
                            "phi in block {} of @{} names {} which is not a predecessor",
                            block.label,
                            function.name,
                            function.block(*pred).label
                        ));
                    }
                }
            }
        }
    }
    Ok(())
}
