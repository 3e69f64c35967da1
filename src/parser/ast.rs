use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    pub functions: Vec<Function>,
    /// Functions called but never defined, with their argument counts,
    /// in first-encounter order.
    pub externs: Vec<(String, usize)>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Function {
    pub name: String,
    pub params: Vec<Ident>,
    pub body: Block,
    /// Unique names of every `auto` declaration in the function, collected
    /// during parsing so lowering can allocate stack slots up front.
    pub auto_locals: Vec<String>,
}

/// Identifier occurrence. `id` is assigned from a counter threaded through
/// the parser and is unique per occurrence, independent of the textual name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ident {
    pub name: String,
    pub id: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub statements: Vec<Stmt>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeclKind {
    Auto,
    Register,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    Decl {
        kind: DeclKind,
        ident: Ident,
        init: Expr,
    },
    If {
        cond: Expr,
        then_branch: Box<Stmt>,
        else_branch: Option<Box<Stmt>>,
    },
    While {
        cond: Expr,
        body: Box<Stmt>,
    },
    Return(Option<Expr>),
    Block(Block),
    Expr(Expr),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    IntLit(u64),
    Ident(Ident),
    Unary {
        op: UnaryOp,
        expr: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Call {
        callee: Ident,
        args: Vec<Expr>,
    },
    Index {
        base: Box<Expr>,
        index: Box<Expr>,
        size: u8,
    },
}

impl Expr {
    /// Only identifiers and index expressions denote storage locations.
    pub fn is_lvalue(&self) -> bool {
        matches!(self, Expr::Ident(_) | Expr::Index { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Not,
    BitNot,
    AddrOf,
}

impl UnaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            UnaryOp::Neg => "-",
            UnaryOp::Not => "!",
            UnaryOp::BitNot => "~",
            UnaryOp::AddrOf => "&",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Mul,
    Div,
    Mod,
    Add,
    Sub,
    Shl,
    Shr,
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
    BitAnd,
    BitXor,
    BitOr,
    And,
    Or,
    Assign,
}

impl BinaryOp {
    /// Binding strength; higher binds tighter. `Assign` is the only
    /// right-associative operator.
    pub fn precedence(self) -> u8 {
        match self {
            BinaryOp::Mul | BinaryOp::Div | BinaryOp::Mod => 12,
            BinaryOp::Add | BinaryOp::Sub => 11,
            BinaryOp::Shl | BinaryOp::Shr => 10,
            BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => 9,
            BinaryOp::Eq | BinaryOp::Ne => 8,
            BinaryOp::BitAnd => 7,
            BinaryOp::BitXor => 6,
            BinaryOp::BitOr => 5,
            BinaryOp::And => 4,
            BinaryOp::Or => 3,
            BinaryOp::Assign => 1,
        }
    }

    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge | BinaryOp::Eq | BinaryOp::Ne
        )
    }

    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Mod => "%",
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Shl => "<<",
            BinaryOp::Shr => ">>",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::BitAnd => "&",
            BinaryOp::BitXor => "^",
            BinaryOp::BitOr => "|",
            BinaryOp::And => "&&",
            BinaryOp::Or => "||",
            BinaryOp::Assign => "=",
        }
    }
}

impl fmt::Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for function in &self.functions {
            writeln!(f, "{}", function)?;
        }
        Ok(())
    }
}

impl fmt::Display for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(function {} (params", self.name)?;
        for param in &self.params {
            write!(f, " {}", param.name)?;
        }
        write!(f, ") {})", self.body)
    }
}

impl fmt::Display for Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(block")?;
        for statement in &self.statements {
            write!(f, " {}", statement)?;
        }
        write!(f, ")")
    }
}

impl fmt::Display for Stmt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stmt::Decl { ident, init, .. } => write!(f, "(decl {} {})", ident.name, init),
            Stmt::If {
                cond,
                then_branch,
                else_branch,
            } => {
                write!(f, "(if {} {}", cond, then_branch)?;
                if let Some(else_branch) = else_branch {
                    write!(f, " (else {})", else_branch)?;
                }
                write!(f, ")")
            }
            Stmt::While { cond, body } => write!(f, "(while {} {})", cond, body),
            Stmt::Return(None) => write!(f, "(return)"),
            Stmt::Return(Some(expr)) => write!(f, "(return {})", expr),
            Stmt::Block(block) => write!(f, "{}", block),
            Stmt::Expr(expr) => write!(f, "(expr statement {})", expr),
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::IntLit(value) => write!(f, "{}", value),
            Expr::Ident(ident) => write!(f, "{}", ident.name),
            Expr::Unary { op, expr } => write!(f, "({} {})", op.symbol(), expr),
            Expr::Binary { op, lhs, rhs } => write!(f, "({} {} {})", op.symbol(), lhs, rhs),
            Expr::Call { callee, args } => {
                write!(f, "(function call {}", callee.name)?;
                for arg in args {
                    write!(f, " {}", arg)?;
                }
                write!(f, ")")
            }
            Expr::Index { base, index, size } => {
                write!(f, "([] {} {}@{})", base, index, size)
            }
        }
    }
}
