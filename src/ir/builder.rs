//! AST to SSA lowering.
//!
//! SSA form is built on the fly while walking the AST, following Braun et
//! al.'s "Simple and Efficient SSA Construction": each block keeps a map
//! from variable name to its current value, blocks whose predecessor set may
//! still grow are left unsealed, and reads in unsealed blocks produce
//! incomplete phis that are filled in when the block is sealed.

use std::collections::HashMap;

use super::{
    AluOp, BasicBlock, BlockId, CmpOp, Function, Inst, InstId, Module, Terminator, Ty, Value,
};
use crate::parser::ast::{self, BinaryOp, DeclKind, Expr, Stmt, UnaryOp};

/// Lower a parsed program. The AST must be diagnostic-free; lowering does
/// not re-validate what the parser already checked.
pub fn lower_program(program: &ast::Program) -> Module {
    Module {
        functions: program.functions.iter().map(lower_function).collect(),
        externs: program.externs.clone(),
    }
}

fn lower_function(source: &ast::Function) -> Function {
    let params = source.params.iter().map(|param| param.name.clone()).collect();
    let mut lowering = FunctionLowering::new(Function::new(source.name.clone(), params));

    let entry = lowering.new_block("entry".to_string(), true);
    lowering.switch_to(entry);
    for (index, param) in source.params.iter().enumerate() {
        lowering.write_variable(entry, &param.name, Value::Param(index));
    }
    for name in &source.auto_locals {
        let slot = lowering.emit(Inst::Alloca { name: name.clone() });
        lowering.autos.insert(name.clone(), slot);
    }

    lowering.lower_block(&source.body);
    if !lowering.terminated {
        lowering.ret(Value::Const(0));
    }
    lowering.function
}

/// Per-block SSA bookkeeping, parallel to `Function::blocks`.
struct SsaBlock {
    sealed: bool,
    mappings: HashMap<String, Value>,
    incomplete_phis: Vec<(String, InstId)>,
}

enum Cond {
    Const(bool),
    Test(Value),
}

struct FunctionLowering {
    function: Function,
    ssa: Vec<SsaBlock>,
    /// Entry-block alloca for each `auto` local, by unique name.
    autos: HashMap<String, Value>,
    current: BlockId,
    terminated: bool,
    label_index: u32,
}

impl FunctionLowering {
    fn new(function: Function) -> Self {
        Self {
            function,
            ssa: Vec::new(),
            autos: HashMap::new(),
            current: BlockId(0),
            terminated: false,
            label_index: 0,
        }
    }

    // ---- blocks and control flow ----

    fn new_block(&mut self, label: String, sealed: bool) -> BlockId {
        let id = BlockId(self.function.blocks.len());
        self.function.blocks.push(BasicBlock::new(label));
        self.ssa.push(SsaBlock {
            sealed,
            mappings: HashMap::new(),
            incomplete_phis: Vec::new(),
        });
        id
    }

    fn switch_to(&mut self, block: BlockId) {
        self.current = block;
        self.terminated = self.function.blocks[block.0].terminator.is_some();
    }

    fn branch(&mut self, target: BlockId) {
        self.function.blocks[self.current.0].terminator = Some(Terminator::Br { target });
        self.function.blocks[target.0].predecessors.push(self.current);
        self.terminated = true;
    }

    fn cond_branch(&mut self, cond: Value, then_target: BlockId, else_target: BlockId) {
        self.function.blocks[self.current.0].terminator = Some(Terminator::CondBr {
            cond,
            then_target,
            else_target,
        });
        self.function.blocks[then_target.0].predecessors.push(self.current);
        self.function.blocks[else_target.0].predecessors.push(self.current);
        self.terminated = true;
    }

    fn ret(&mut self, value: Value) {
        self.function.blocks[self.current.0].terminator = Some(Terminator::Ret { value });
        self.terminated = true;
    }

    fn terminate_into(&mut self, target: BlockId) {
        if !self.terminated {
            self.branch(target);
        }
    }

    fn next_label_index(&mut self) -> u32 {
        let index = self.label_index;
        self.label_index += 1;
        index
    }

    // ---- instructions ----

    fn emit(&mut self, inst: Inst) -> Value {
        let id = InstId(self.function.insts.len());
        self.function.insts.push(inst);
        self.function.blocks[self.current.0].instructions.push(id);
        Value::Inst(id)
    }

    fn new_phi(&mut self, block: BlockId) -> InstId {
        let id = InstId(self.function.insts.len());
        self.function.insts.push(Inst::Phi {
            incoming: Vec::new(),
        });
        self.function.blocks[block.0].phis.push(id);
        id
    }

    // ---- SSA variable handling ----

    fn write_variable(&mut self, block: BlockId, name: &str, value: Value) {
        self.ssa[block.0].mappings.insert(name.to_string(), value);
    }

    fn read_variable(&mut self, block: BlockId, name: &str) -> Value {
        if let Some(&value) = self.ssa[block.0].mappings.get(name) {
            return value;
        }

        let value = if !self.ssa[block.0].sealed {
            // The predecessor set is still growing; complete the phi later.
            let phi = self.new_phi(block);
            self.ssa[block.0]
                .incomplete_phis
                .push((name.to_string(), phi));
            Value::Inst(phi)
        } else if self.function.blocks[block.0].predecessors.is_empty() {
            // Read of a name with no definition on any path into this block;
            // only reachable from dead code, which still needs a value.
            Value::Const(0)
        } else if self.function.blocks[block.0].predecessors.len() == 1 {
            let pred = self.function.blocks[block.0].predecessors[0];
            self.read_variable(pred, name)
        } else {
            // Write the phi before recursing into the predecessors; a loop
            // back to this block must find it and stop.
            let phi = self.new_phi(block);
            self.write_variable(block, name, Value::Inst(phi));
            self.add_phi_operands(name, phi, block)
        };

        self.write_variable(block, name, value);
        value
    }

    fn add_phi_operands(&mut self, name: &str, phi: InstId, block: BlockId) -> Value {
        let predecessors = self.function.blocks[block.0].predecessors.clone();
        for pred in predecessors {
            let value = self.read_variable(pred, name);
            if let Inst::Phi { incoming } = &mut self.function.insts[phi.0] {
                incoming.push((value, pred));
            }
        }
        self.try_remove_trivial_phi(phi)
    }

    fn seal_block(&mut self, block: BlockId) {
        self.ssa[block.0].sealed = true;
        let pending = std::mem::take(&mut self.ssa[block.0].incomplete_phis);
        for (name, phi) in pending {
            let value = self.add_phi_operands(&name, phi, block);
            self.write_variable(block, &name, value);
        }
    }

    /// Replace a phi whose operands (ignoring itself) agree on one value,
    /// then re-examine phis that used it.
    fn try_remove_trivial_phi(&mut self, phi: InstId) -> Value {
        let incoming = match &self.function.insts[phi.0] {
            Inst::Phi { incoming } => incoming.clone(),
            _ => return Value::Inst(phi),
        };

        let mut same = None;
        for (value, _) in &incoming {
            if *value == Value::Inst(phi) || Some(*value) == same {
                continue;
            }
            if same.is_some() {
                return Value::Inst(phi);
            }
            same = Some(*value);
        }
        let Some(replacement) = same else {
            return Value::Inst(phi);
        };

        let users = self.phi_users(phi);
        self.replace_all_uses(phi, replacement);
        for block in &mut self.function.blocks {
            block.phis.retain(|id| *id != phi);
        }
        for user in users {
            if self.phi_block(user).is_some() {
                self.try_remove_trivial_phi(user);
            }
        }
        replacement
    }

    fn phi_users(&self, phi: InstId) -> Vec<InstId> {
        let needle = Value::Inst(phi);
        let mut users = Vec::new();
        for (index, inst) in self.function.insts.iter().enumerate() {
            if let Inst::Phi { incoming } = inst {
                if InstId(index) != phi && incoming.iter().any(|(value, _)| *value == needle) {
                    users.push(InstId(index));
                }
            }
        }
        users
    }

    fn phi_block(&self, phi: InstId) -> Option<BlockId> {
        self.function
            .blocks
            .iter()
            .position(|block| block.phis.contains(&phi))
            .map(BlockId)
    }

    fn replace_all_uses(&mut self, phi: InstId, replacement: Value) {
        let needle = Value::Inst(phi);
        let replace = |value: &mut Value| {
            if *value == needle {
                *value = replacement;
            }
        };

        for inst in &mut self.function.insts {
            match inst {
                Inst::Alu { lhs, rhs, .. } | Inst::Cmp { lhs, rhs, .. } => {
                    replace(lhs);
                    replace(rhs);
                }
                Inst::Sext { value }
                | Inst::Zext { value }
                | Inst::PtrToInt { value }
                | Inst::IntToPtr { value } => replace(value),
                Inst::Select {
                    cond,
                    if_true,
                    if_false,
                } => {
                    replace(cond);
                    replace(if_true);
                    replace(if_false);
                }
                Inst::Load { addr, .. } => replace(addr),
                Inst::Store { value, addr, .. } => {
                    replace(value);
                    replace(addr);
                }
                Inst::Gep { base, index, .. } => {
                    replace(base);
                    replace(index);
                }
                Inst::Alloca { .. } => {}
                Inst::Call { args, .. } => {
                    for arg in args {
                        replace(arg);
                    }
                }
                Inst::Phi { incoming } => {
                    for (value, _) in incoming {
                        replace(value);
                    }
                }
            }
        }

        for block in &mut self.function.blocks {
            match &mut block.terminator {
                Some(Terminator::CondBr { cond, .. }) => replace(cond),
                Some(Terminator::Ret { value }) => replace(value),
                _ => {}
            }
        }

        for ssa in &mut self.ssa {
            for value in ssa.mappings.values_mut() {
                replace(value);
            }
        }
    }

    // ---- statements ----

    fn lower_block(&mut self, block: &ast::Block) {
        for stmt in &block.statements {
            if self.terminated {
                break;
            }
            self.lower_stmt(stmt);
        }
    }

    fn lower_stmt(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::Decl { kind, ident, init } => {
                let value = self.lower_expr(init);
                let block = self.current;
                self.write_variable(block, &ident.name, value);
                if *kind == DeclKind::Auto {
                    if let Some(&slot) = self.autos.get(&ident.name) {
                        self.emit(Inst::Store {
                            ty: Ty::I64,
                            value,
                            addr: slot,
                        });
                    }
                }
            }
            Stmt::Return(expr) => {
                let value = match expr {
                    Some(expr) => self.lower_expr(expr),
                    None => Value::Const(0),
                };
                self.ret(value);
            }
            Stmt::If {
                cond,
                then_branch,
                else_branch,
            } => self.lower_if(cond, then_branch, else_branch.as_deref()),
            Stmt::While { cond, body } => self.lower_while(cond, body),
            Stmt::Block(block) => self.lower_block(block),
            Stmt::Expr(expr) => {
                self.lower_expr(expr);
            }
        }
    }

    fn lower_if(&mut self, cond: &Expr, then_branch: &Stmt, else_branch: Option<&Stmt>) {
        let index = self.next_label_index();
        let cond_block = self.new_block(format!("if{}.cond", index), true);
        self.branch(cond_block);
        self.switch_to(cond_block);

        let condition = self.lower_condition(cond);
        let end_block = self.new_block(format!("if{}.end", index), false);

        match condition {
            Cond::Const(taken) => {
                // Only one edge will ever reach the end block.
                self.seal_block(end_block);
                if taken {
                    self.lower_stmt(then_branch);
                } else if let Some(else_branch) = else_branch {
                    self.lower_stmt(else_branch);
                }
                self.terminate_into(end_block);
                self.switch_to(end_block);
            }
            Cond::Test(test) => {
                let then_block = self.new_block(format!("if{}.body", index), true);
                let else_block =
                    else_branch.map(|_| self.new_block(format!("if{}.else", index), true));

                match else_block {
                    Some(else_block) => self.cond_branch(test, then_block, else_block),
                    None => self.cond_branch(test, then_block, end_block),
                }

                self.switch_to(then_block);
                self.lower_stmt(then_branch);
                self.terminate_into(end_block);

                if let (Some(else_block), Some(else_branch)) = (else_block, else_branch) {
                    self.switch_to(else_block);
                    self.lower_stmt(else_branch);
                    self.terminate_into(end_block);
                }

                self.seal_block(end_block);
                self.switch_to(end_block);
            }
        }
    }

    fn lower_while(&mut self, cond: &Expr, body: &Stmt) {
        let index = self.next_label_index();
        // The condition block gets a back edge later, so it stays unsealed
        // until the body has been lowered.
        let cond_block = self.new_block(format!("loop{}.cond", index), false);
        self.branch(cond_block);
        self.switch_to(cond_block);

        let condition = self.lower_condition(cond);
        let end_block = self.new_block(format!("loop{}.end", index), false);
        let body_block = self.new_block(format!("loop{}.body", index), true);

        match condition {
            Cond::Const(false) => self.branch(end_block),
            Cond::Const(true) => self.branch(body_block),
            Cond::Test(test) => self.cond_branch(test, body_block, end_block),
        }

        self.switch_to(body_block);
        self.lower_stmt(body);
        self.terminate_into(cond_block);

        self.seal_block(cond_block);
        self.seal_block(end_block);
        self.switch_to(end_block);
    }

    // ---- expressions ----

    fn lower_expr(&mut self, expr: &Expr) -> Value {
        match expr {
            Expr::IntLit(value) => Value::Const(*value as i64),
            Expr::Ident(ident) => {
                let block = self.current;
                self.read_variable(block, &ident.name)
            }
            Expr::Unary { op, expr } => self.lower_unary(*op, expr),
            Expr::Binary { op, lhs, rhs } => self.lower_binary(*op, lhs, rhs),
            Expr::Call { callee, args } => {
                let values = args.iter().map(|arg| self.lower_expr(arg)).collect();
                self.emit(Inst::Call {
                    callee: callee.name.clone(),
                    args: values,
                })
            }
            Expr::Index { base, index, size } => {
                let addr = self.lower_index_addr(base, index, *size);
                let value = self.emit(Inst::Load {
                    ty: element_ty(*size),
                    addr,
                });
                if *size < 8 {
                    self.emit(Inst::Sext { value })
                } else {
                    value
                }
            }
        }
    }

    fn lower_unary(&mut self, op: UnaryOp, operand: &Expr) -> Value {
        match op {
            UnaryOp::AddrOf => {
                let addr = self.lower_addr(operand);
                self.emit(Inst::PtrToInt { value: addr })
            }
            UnaryOp::Neg => {
                let value = self.lower_expr(operand);
                self.emit(Inst::Alu {
                    op: AluOp::Sub,
                    lhs: Value::Const(0),
                    rhs: value,
                })
            }
            UnaryOp::Not => {
                let value = self.lower_expr(operand);
                let is_zero = self.emit(Inst::Cmp {
                    op: CmpOp::Eq,
                    lhs: value,
                    rhs: Value::Const(0),
                });
                self.emit(Inst::Zext { value: is_zero })
            }
            UnaryOp::BitNot => {
                let value = self.lower_expr(operand);
                self.emit(Inst::Alu {
                    op: AluOp::Xor,
                    lhs: value,
                    rhs: Value::Const(-1),
                })
            }
        }
    }

    fn lower_binary(&mut self, op: BinaryOp, lhs: &Expr, rhs: &Expr) -> Value {
        match op {
            BinaryOp::Assign => self.lower_assign(lhs, rhs),
            BinaryOp::And => self.lower_short_circuit(false, lhs, rhs),
            BinaryOp::Or => self.lower_short_circuit(true, lhs, rhs),
            op if op.is_comparison() => {
                let value = self.lower_comparison(op, lhs, rhs);
                self.emit(Inst::Sext { value })
            }
            op => {
                let left = self.lower_expr(lhs);
                let right = self.lower_expr(rhs);
                self.emit(Inst::Alu {
                    op: alu_op(op),
                    lhs: left,
                    rhs: right,
                })
            }
        }
    }

    fn lower_comparison(&mut self, op: BinaryOp, lhs: &Expr, rhs: &Expr) -> Value {
        let left = self.lower_expr(lhs);
        let right = self.lower_expr(rhs);
        self.emit(Inst::Cmp {
            op: cmp_op(op),
            lhs: left,
            rhs: right,
        })
    }

    fn lower_assign(&mut self, target: &Expr, source: &Expr) -> Value {
        match target {
            Expr::Ident(ident) => {
                let value = self.lower_expr(source);
                let block = self.current;
                self.write_variable(block, &ident.name, value);
                // Auto locals also live in memory so that reads through
                // their address observe the assignment.
                if let Some(&slot) = self.autos.get(&ident.name) {
                    self.emit(Inst::Store {
                        ty: Ty::I64,
                        value,
                        addr: slot,
                    });
                }
                value
            }
            Expr::Index { base, index, size } => {
                let addr = self.lower_index_addr(base, index, *size);
                let value = self.lower_expr(source);
                self.emit(Inst::Store {
                    ty: element_ty(*size),
                    value,
                    addr,
                });
                value
            }
            target => {
                let _ = self.lower_expr(target);
                self.lower_expr(source)
            }
        }
    }

    fn lower_short_circuit(&mut self, is_or: bool, lhs: &Expr, rhs: &Expr) -> Value {
        let left = self.lower_expr(lhs);
        let entry = self.current;
        let index = self.next_label_index();
        let prefix = if is_or { "or" } else { "and" };
        let rhs_block = self.new_block(format!("{}{}.rhs", prefix, index), true);
        let end_block = self.new_block(format!("{}{}.end", prefix, index), false);

        let left_zero = self.emit(Inst::Cmp {
            op: CmpOp::Eq,
            lhs: left,
            rhs: Value::Const(0),
        });
        if is_or {
            self.cond_branch(left_zero, rhs_block, end_block);
        } else {
            self.cond_branch(left_zero, end_block, rhs_block);
        }

        self.switch_to(rhs_block);
        let right = self.lower_expr(rhs);
        let right_zero = self.emit(Inst::Cmp {
            op: CmpOp::Eq,
            lhs: right,
            rhs: Value::Const(0),
        });
        let result = self.emit(Inst::Select {
            cond: right_zero,
            if_true: Value::Const(0),
            if_false: Value::Const(1),
        });
        // Lowering the rhs may have ended in a different block.
        let rhs_end = self.current;
        self.branch(end_block);

        self.seal_block(end_block);
        self.switch_to(end_block);

        let phi = self.new_phi(end_block);
        if let Inst::Phi { incoming } = &mut self.function.insts[phi.0] {
            incoming.push((result, rhs_end));
            incoming.push((Value::Const(i64::from(is_or)), entry));
        }
        Value::Inst(phi)
    }

    /// Lower an `if`/`while` condition. A top-level comparison feeds its i1
    /// straight into the branch; everything else is compared against zero,
    /// and constants pick their edge statically.
    fn lower_condition(&mut self, expr: &Expr) -> Cond {
        if let Expr::Binary { op, lhs, rhs } = expr {
            if op.is_comparison() {
                return Cond::Test(self.lower_comparison(*op, lhs, rhs));
            }
        }
        match self.lower_expr(expr) {
            Value::Const(value) => Cond::Const(value != 0),
            value => Cond::Test(self.emit(Inst::Cmp {
                op: CmpOp::Ne,
                lhs: value,
                rhs: Value::Const(0),
            })),
        }
    }

    fn lower_index_addr(&mut self, base: &Expr, index: &Expr, size: u8) -> Value {
        let base_int = match base {
            // An auto local holds the pointer in its stack slot.
            Expr::Ident(ident) if self.autos.contains_key(&ident.name) => {
                let slot = self.autos[&ident.name];
                self.emit(Inst::Load {
                    ty: Ty::I64,
                    addr: slot,
                })
            }
            base => self.lower_expr(base),
        };
        let pointer = self.emit(Inst::IntToPtr { value: base_int });
        let index_value = self.lower_expr(index);
        self.emit(Inst::Gep {
            ty: element_ty(size),
            base: pointer,
            index: index_value,
        })
    }

    fn lower_addr(&mut self, expr: &Expr) -> Value {
        match expr {
            Expr::Ident(ident) if self.autos.contains_key(&ident.name) => {
                self.autos[&ident.name]
            }
            Expr::Index { base, index, size } => self.lower_index_addr(base, index, *size),
            expr => {
                let value = self.lower_expr(expr);
                self.emit(Inst::IntToPtr { value })
            }
        }
    }
}

fn element_ty(size: u8) -> Ty {
    match size {
        1 => Ty::I8,
        2 => Ty::I16,
        4 => Ty::I32,
        _ => Ty::I64,
    }
}

fn alu_op(op: BinaryOp) -> AluOp {
    match op {
        BinaryOp::Add => AluOp::Add,
        BinaryOp::Sub => AluOp::Sub,
        BinaryOp::Mul => AluOp::Mul,
        BinaryOp::Div => AluOp::Sdiv,
        BinaryOp::Mod => AluOp::Srem,
        BinaryOp::BitAnd => AluOp::And,
        BinaryOp::BitOr => AluOp::Or,
        BinaryOp::BitXor => AluOp::Xor,
        BinaryOp::Shl => AluOp::Shl,
        BinaryOp::Shr => AluOp::Ashr,
        _ => unreachable!("not an ALU operator: {:?}", op),
    }
}

fn cmp_op(op: BinaryOp) -> CmpOp {
    match op {
        BinaryOp::Eq => CmpOp::Eq,
        BinaryOp::Ne => CmpOp::Ne,
        BinaryOp::Lt => CmpOp::Slt,
        BinaryOp::Le => CmpOp::Sle,
        BinaryOp::Gt => CmpOp::Sgt,
        BinaryOp::Ge => CmpOp::Sge,
        _ => unreachable!("not a comparison operator: {:?}", op),
    }
}
