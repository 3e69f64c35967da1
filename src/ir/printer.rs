//! Textual IR dump.
//!
//! The output is deterministic: instruction results are numbered in print
//! order, allocas print under their variable name, and parameters under
//! their source name.

use std::collections::HashMap;
use std::fmt;

use super::{AluOp, CmpOp, Function, Inst, InstId, Module, Terminator, Ty, Value};

impl fmt::Display for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (name, param_count) in &self.externs {
            let params = vec!["i64"; *param_count].join(", ");
            writeln!(f, "declare i64 @{}({})", name, params)?;
        }
        if !self.externs.is_empty() && !self.functions.is_empty() {
            writeln!(f)?;
        }

        for (index, function) in self.functions.iter().enumerate() {
            if index > 0 {
                writeln!(f)?;
            }
            write!(f, "{}", function)?;
        }
        Ok(())
    }
}

impl fmt::Display for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names = assign_names(self);

        let params = self
            .params
            .iter()
            .map(|param| format!("i64 %{}", param))
            .collect::<Vec<_>>()
            .join(", ");
        writeln!(f, "define i64 @{}({}) {{", self.name, params)?;

        for block in &self.blocks {
            writeln!(f, "{}:", block.label)?;
            for &id in block.phis.iter().chain(block.instructions.iter()) {
                writeln!(f, "  {}", format_inst(self, &names, id))?;
            }
            if let Some(terminator) = &block.terminator {
                writeln!(f, "  {}", format_terminator(self, &names, terminator))?;
            }
        }

        writeln!(f, "}}")
    }
}

fn assign_names(function: &Function) -> HashMap<InstId, String> {
    let mut names = HashMap::new();
    let mut counter = 0usize;
    for block in &function.blocks {
        for &id in block.phis.iter().chain(block.instructions.iter()) {
            match function.inst(id) {
                Inst::Store { .. } => {}
                Inst::Alloca { name } => {
                    names.insert(id, format!("%{}", name));
                }
                _ => {
                    names.insert(id, format!("%{}", counter));
                    counter += 1;
                }
            }
        }
    }
    names
}

fn operand(function: &Function, names: &HashMap<InstId, String>, value: Value) -> String {
    match value {
        Value::Const(value) => value.to_string(),
        Value::Param(index) => format!("%{}", function.params[index]),
        Value::Inst(id) => names.get(&id).cloned().unwrap_or_else(|| "%?".to_string()),
    }
}

fn format_inst(function: &Function, names: &HashMap<InstId, String>, id: InstId) -> String {
    let inst = function.inst(id);
    if let Inst::Store { ty, value, addr } = inst {
        return format!(
            "store {} {}, ptr {}",
            ty,
            operand(function, names, *value),
            operand(function, names, *addr)
        );
    }

    let dest = names.get(&id).map(String::as_str).unwrap_or("%?");
    match inst {
        Inst::Alu { op, lhs, rhs } => format!(
            "{} = {} i64 {}, {}",
            dest,
            op,
            operand(function, names, *lhs),
            operand(function, names, *rhs)
        ),
        Inst::Cmp { op, lhs, rhs } => format!(
            "{} = icmp {} i64 {}, {}",
            dest,
            op,
            operand(function, names, *lhs),
            operand(function, names, *rhs)
        ),
        Inst::Sext { value } => format!(
            "{} = sext {} {} to i64",
            dest,
            function.value_ty(*value),
            operand(function, names, *value)
        ),
        Inst::Zext { value } => format!(
            "{} = zext {} {} to i64",
            dest,
            function.value_ty(*value),
            operand(function, names, *value)
        ),
        Inst::Select {
            cond,
            if_true,
            if_false,
        } => format!(
            "{} = select i1 {}, i64 {}, i64 {}",
            dest,
            operand(function, names, *cond),
            operand(function, names, *if_true),
            operand(function, names, *if_false)
        ),
        Inst::Load { ty, addr } => format!(
            "{} = load {}, ptr {}",
            dest,
            ty,
            operand(function, names, *addr)
        ),
        Inst::Gep { ty, base, index } => format!(
            "{} = getelementptr {}, ptr {}, i64 {}",
            dest,
            ty,
            operand(function, names, *base),
            operand(function, names, *index)
        ),
        Inst::Alloca { .. } => format!("{} = alloca i64", dest),
        Inst::PtrToInt { value } => format!(
            "{} = ptrtoint ptr {} to i64",
            dest,
            operand(function, names, *value)
        ),
        Inst::IntToPtr { value } => format!(
            "{} = inttoptr i64 {} to ptr",
            dest,
            operand(function, names, *value)
        ),
        Inst::Call { callee, args } => {
            let args = args
                .iter()
                .map(|arg| format!("i64 {}", operand(function, names, *arg)))
                .collect::<Vec<_>>()
                .join(", ");
            format!("{} = call i64 @{}({})", dest, callee, args)
        }
        Inst::Phi { incoming } => {
            let incoming = incoming
                .iter()
                .map(|(value, block)| {
                    format!(
                        "[ {}, {} ]",
                        operand(function, names, *value),
                        function.block(*block).label
                    )
                })
                .collect::<Vec<_>>()
                .join(", ");
            format!("{} = phi i64 {}", dest, incoming)
        }
        Inst::Store { .. } => unreachable!(),
    }
}

fn format_terminator(
    function: &Function,
    names: &HashMap<InstId, String>,
    terminator: &Terminator,
) -> String {
    match terminator {
        Terminator::Br { target } => format!("br label {}", function.block(*target).label),
        Terminator::CondBr {
            cond,
            then_target,
            else_target,
        } => format!(
            "br i1 {}, label {}, label {}",
            operand(function, names, *cond),
            function.block(*then_target).label,
            function.block(*else_target).label
        ),
        Terminator::Ret { value } => format!("ret i64 {}", operand(function, names, *value)),
    }
}

impl fmt::Display for Ty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Ty::I1 => "i1",
            Ty::I8 => "i8",
            Ty::I16 => "i16",
            Ty::I32 => "i32",
            Ty::I64 => "i64",
            Ty::Ptr => "ptr",
        };
        write!(f, "{}", text)
    }
}

impl fmt::Display for AluOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            AluOp::Add => "add",
            AluOp::Sub => "sub",
            AluOp::Mul => "mul",
            AluOp::Sdiv => "sdiv",
            AluOp::Srem => "srem",
            AluOp::And => "and",
            AluOp::Or => "or",
            AluOp::Xor => "xor",
            AluOp::Shl => "shl",
            AluOp::Ashr => "ashr",
        };
        write!(f, "{}", text)
    }
}

impl fmt::Display for CmpOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            CmpOp::Eq => "eq",
            CmpOp::Ne => "ne",
            CmpOp::Slt => "slt",
            CmpOp::Sle => "sle",
            CmpOp::Sgt => "sgt",
            CmpOp::Sge => "sge",
        };
        write!(f, "{}", text)
    }
}
