//! Integration test utilities for the scope engine
//!
//! A miniature control-thread language and a lowering pass that drives
//! [`fsm_scope::ScopeTree`] the way the full compiler does: one state per
//! statement, registers named by scope, and jumps patched once the enclosing
//! construct knows its exit state.

pub mod lower;

pub use lower::{lower_program, Fsm, Lowerer, Transition};

use fsm_scope::FunctionDef;
use std::fmt;

/// Binary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    /// `+`
    Add,
    /// `-`
    Sub,
    /// `<`
    Lt,
    /// `==`
    Eq,
}

impl fmt::Display for BinOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Add => "+",
            Self::Sub => "-",
            Self::Lt => "<",
            Self::Eq => "==",
        })
    }
}

/// Expressions
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
    /// Integer literal
    Int(i64),
    /// Variable read
    Var(String),
    /// Binary operation
    Binary {
        /// Operator
        op: BinOp,
        /// Left operand
        lhs: Box<Expr>,
        /// Right operand
        rhs: Box<Expr>,
    },
    /// Function call, inlined at the call site
    Call {
        /// Callee name
        name: String,
        /// Arguments
        args: Vec<Expr>,
    },
}

/// Statements
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Stmt {
    /// `name = value`
    Assign {
        /// Target variable
        name: String,
        /// Assigned value
        value: Expr,
    },
    /// Single-state assignment that only happens while `cond` holds
    AssignIf {
        /// Guard
        cond: Expr,
        /// Target variable
        name: String,
        /// Assigned value
        value: Expr,
    },
    /// Expression evaluated for its effects
    Eval(Expr),
    /// `if cond: then else: otherwise`
    If {
        /// Condition
        cond: Expr,
        /// Taken branch
        then: Vec<Stmt>,
        /// Other branch
        otherwise: Vec<Stmt>,
    },
    /// `while cond: body`
    While {
        /// Loop condition
        cond: Expr,
        /// Loop body
        body: Vec<Stmt>,
    },
    /// `break`
    Break,
    /// `continue`
    Continue,
    /// `return [value]`
    Return(Option<Expr>),
    /// Function definition
    Def(FunctionDecl),
    /// `global name`
    Global(String),
    /// `nonlocal name`
    Nonlocal(String),
}

/// Function definition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionDecl {
    /// Function name
    pub name: String,
    /// Parameter names
    pub params: Vec<String>,
    /// Body statements
    pub body: Vec<Stmt>,
}

impl FunctionDef for FunctionDecl {
    fn name(&self) -> &str {
        &self.name
    }
}

/// Integer literal
#[must_use]
pub fn int(value: i64) -> Expr {
    Expr::Int(value)
}

/// Variable read
#[must_use]
pub fn var(name: &str) -> Expr {
    Expr::Var(name.to_string())
}

/// Binary operation
#[must_use]
pub fn binary(op: BinOp, lhs: Expr, rhs: Expr) -> Expr {
    Expr::Binary {
        op,
        lhs: Box::new(lhs),
        rhs: Box::new(rhs),
    }
}

/// Function call
#[must_use]
pub fn call(name: &str, args: Vec<Expr>) -> Expr {
    Expr::Call {
        name: name.to_string(),
        args,
    }
}

/// Assignment statement
#[must_use]
pub fn assign(name: &str, value: Expr) -> Stmt {
    Stmt::Assign {
        name: name.to_string(),
        value,
    }
}

/// Function definition statement
#[must_use]
pub fn def(name: &str, params: &[&str], body: Vec<Stmt>) -> Stmt {
    Stmt::Def(FunctionDecl {
        name: name.to_string(),
        params: params.iter().map(|param| (*param).to_string()).collect(),
        body,
    })
}
