//! Statement-per-state lowering on top of the scope tree

use crate::{Expr, FunctionDecl, Stmt};
use anyhow::{bail, Result};
use fsm_scope::{BindingTable, FrameKind, ScopeTree, StateId};
use std::fmt;

/// Calls are inlined, so recursion has to stop somewhere
const MAX_CALL_DEPTH: usize = 16;

/// Next-state logic of one state
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// Target not known yet
    Pending,
    /// Unconditional jump
    Goto(StateId),
    /// Two-way branch
    Branch {
        /// Condition
        cond: String,
        /// Target when the condition holds
        then: StateId,
        /// Target otherwise
        otherwise: StateId,
    },
    /// Final state
    Halt,
}

/// Lowered program
#[derive(Debug)]
pub struct Fsm {
    /// Transition of each state, indexed by state number
    pub states: Vec<Transition>,
    /// Register writes per destination
    pub bindings: BindingTable<String>,
}

impl Fsm {
    /// Transition of `state`
    ///
    /// # Panics
    ///
    /// Panics if `state` is out of range.
    #[must_use]
    pub fn transition(&self, state: StateId) -> &Transition {
        &self.states[state.0 as usize]
    }
}

impl fmt::Display for Fsm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, transition) in self.states.iter().enumerate() {
            write!(f, "S{idx}: ")?;
            match transition {
                Transition::Pending => writeln!(f, "pending")?,
                Transition::Goto(target) => writeln!(f, "goto {target}")?,
                Transition::Branch {
                    cond,
                    then,
                    otherwise,
                } => writeln!(f, "if {cond} goto {then} else {otherwise}")?,
                Transition::Halt => writeln!(f, "halt")?,
            }
        }
        for (destination, writes) in self.bindings.iter() {
            for write in writes {
                write!(f, "{destination} <= {} @ {}", write.source, write.state)?;
                if let Some(cond) = &write.condition {
                    write!(f, " if {cond}")?;
                }
                writeln!(f)?;
            }
        }
        Ok(())
    }
}

/// Lowers one program
pub struct Lowerer {
    scopes: ScopeTree<FunctionDecl, String>,
    states: Vec<Transition>,
    /// States that fall through into whatever state is emitted next
    fallthrough: Vec<StateId>,
    call_depth: usize,
}

impl Default for Lowerer {
    fn default() -> Self {
        Self::new()
    }
}

/// Lower a whole program
///
/// # Errors
///
/// Returns scope errors (unknown names, `return` outside a function) and
/// jumps left without a target.
pub fn lower_program(program: &[Stmt]) -> Result<Fsm> {
    Lowerer::new().lower(program)
}

impl Lowerer {
    /// Create a lowerer with a fresh scope tree
    #[must_use]
    pub fn new() -> Self {
        Self::with_scopes(ScopeTree::new())
    }

    /// Create a lowerer around an existing scope tree
    #[must_use]
    pub fn with_scopes(scopes: ScopeTree<FunctionDecl, String>) -> Self {
        Self {
            scopes,
            states: Vec::new(),
            fallthrough: Vec::new(),
            call_depth: 0,
        }
    }

    /// Lower `program` and finish with a halt state
    ///
    /// # Errors
    ///
    /// See [`lower_program`].
    pub fn lower(mut self, program: &[Stmt]) -> Result<Fsm> {
        self.lower_block(program)?;
        let end = self.emit();
        self.states[end.0 as usize] = Transition::Halt;
        self.fallthrough.clear();

        let root = self.scopes.root();
        if !self.scopes.collect_unresolved_break_from(root).is_empty() {
            bail!("break outside of a loop");
        }
        if !self.scopes.collect_unresolved_continue_from(root).is_empty() {
            bail!("continue outside of a loop");
        }

        Ok(Fsm {
            states: self.states,
            bindings: self.scopes.into_bindings(),
        })
    }

    fn next_id(&self) -> StateId {
        StateId(self.states.len() as u32)
    }

    /// Append a state and route every open fallthrough into it
    fn emit(&mut self) -> StateId {
        let id = self.next_id();
        self.states.push(Transition::Pending);
        for open in self.fallthrough.drain(..) {
            self.states[open.0 as usize] = Transition::Goto(id);
        }
        self.fallthrough.push(id);
        id
    }

    fn set(&mut self, state: StateId, transition: Transition) {
        self.states[state.0 as usize] = transition;
    }

    fn lower_block(&mut self, stmts: &[Stmt]) -> Result<()> {
        for stmt in stmts {
            self.lower_stmt(stmt)?;
        }
        Ok(())
    }

    /// Lower one branch arm in its own frame
    ///
    /// Returns the arm's first state, if it emitted any, and the states that
    /// fall out of it.
    fn lower_arm(&mut self, stmts: &[Stmt]) -> Result<(Option<StateId>, Vec<StateId>)> {
        let mark = self.next_id();
        self.scopes.push_frame(None, FrameKind::Block)?;
        self.lower_block(stmts)?;
        self.scopes.pop_frame()?;
        let start = (self.next_id() > mark).then_some(mark);
        Ok((start, std::mem::take(&mut self.fallthrough)))
    }

    fn store_target(&mut self, name: &str) -> String {
        match self.scopes.resolve_variable(name, true) {
            Some(flat) => flat,
            None => self.scopes.declare_variable(name),
        }
    }

    fn lower_stmt(&mut self, stmt: &Stmt) -> Result<()> {
        match stmt {
            Stmt::Assign { name, value } => {
                let source = self.lower_expr(value)?;
                let destination = self.store_target(name);
                let state = self.emit();
                self.scopes.record_binding(state, destination, source, None);
            }

            Stmt::AssignIf { cond, name, value } => {
                let cond = self.lower_expr(cond)?;
                let source = self.lower_expr(value)?;
                let destination = self.store_target(name);
                let state = self.emit();
                self.scopes
                    .record_binding(state, destination, source, Some(cond));
            }

            Stmt::Eval(expr) => {
                self.lower_expr(expr)?;
            }

            Stmt::If {
                cond,
                then,
                otherwise,
            } => {
                let cond = self.lower_expr(cond)?;
                let branch = self.emit();
                self.fallthrough.clear();

                let (then_start, mut open) = self.lower_arm(then)?;
                let (else_start, else_open) = self.lower_arm(otherwise)?;
                open.extend(else_open);

                let join = self.next_id();
                self.set(
                    branch,
                    Transition::Branch {
                        cond,
                        then: then_start.unwrap_or(join),
                        otherwise: else_start.unwrap_or(join),
                    },
                );
                self.fallthrough = open;
            }

            Stmt::While { cond, body } => {
                let head = self.next_id();
                let cond = self.lower_expr(cond)?;
                let test = self.emit();
                self.fallthrough.clear();

                let body_frame = self.scopes.push_frame(None, FrameKind::Block)?;
                let body_start = self.next_id();
                self.lower_block(body)?;
                let back = self.emit();
                self.set(back, Transition::Goto(head));
                self.fallthrough.clear();
                self.scopes.pop_frame()?;

                let exit = self.next_id();
                self.set(
                    test,
                    Transition::Branch {
                        cond,
                        then: body_start,
                        otherwise: exit,
                    },
                );
                for site in self.scopes.collect_unresolved_break_from(body_frame) {
                    self.set(site, Transition::Goto(exit));
                }
                for site in self.scopes.collect_unresolved_continue_from(body_frame) {
                    self.set(site, Transition::Goto(head));
                }
                self.scopes.clear_unresolved_break_from(body_frame);
                self.scopes.clear_unresolved_continue_from(body_frame);
            }

            Stmt::Break => {
                let state = self.emit();
                self.scopes.record_break(state);
                self.fallthrough.clear();
            }

            Stmt::Continue => {
                let state = self.emit();
                self.scopes.record_continue(state);
                self.fallthrough.clear();
            }

            Stmt::Return(value) => {
                let value = value.as_ref().map(|expr| self.lower_expr(expr)).transpose()?;
                let slot = self.scopes.return_target()?.map(str::to_string);
                let state = self.emit();
                if let (Some(slot), Some(source)) = (slot, value.clone()) {
                    self.scopes.record_binding(state, slot, source, None);
                }
                self.scopes.record_return(state, value);
                self.fallthrough.clear();
            }

            Stmt::Def(decl) => self.scopes.declare_function(decl.clone()),
            Stmt::Global(name) => self.scopes.declare_global(name),
            Stmt::Nonlocal(name) => self.scopes.declare_capture(name),
        }
        Ok(())
    }

    fn lower_expr(&mut self, expr: &Expr) -> Result<String> {
        Ok(match expr {
            Expr::Int(value) => value.to_string(),
            Expr::Var(name) => self.scopes.require_variable(name, false)?,
            Expr::Binary { op, lhs, rhs } => {
                let lhs = self.lower_expr(lhs)?;
                let rhs = self.lower_expr(rhs)?;
                format!("({lhs} {op} {rhs})")
            }
            Expr::Call { name, args } => self.lower_call(name, args)?,
        })
    }

    /// Inline a call and return the register holding its result
    fn lower_call(&mut self, name: &str, args: &[Expr]) -> Result<String> {
        if self.call_depth >= MAX_CALL_DEPTH {
            bail!("call depth limit reached while inlining `{name}`");
        }
        let args = args
            .iter()
            .map(|arg| self.lower_expr(arg))
            .collect::<Result<Vec<_>>>()?;
        let func = self.scopes.require_function(name)?.clone();
        if func.params.len() != args.len() {
            bail!(
                "`{name}` takes {} arguments but {} were given",
                func.params.len(),
                args.len()
            );
        }

        self.call_depth += 1;
        let frame = self.scopes.push_frame(None, FrameKind::Call)?;
        for (param, source) in func.params.iter().zip(args) {
            let destination = self.scopes.declare_variable(param);
            let state = self.emit();
            self.scopes.record_binding(state, destination, source, None);
        }
        let slot = self.scopes.allocate_temp_variable();
        self.scopes.set_return_target(slot.clone())?;

        self.lower_block(&func.body)?;
        // Loops inside the body already took their own jumps.
        if !self.scopes.collect_unresolved_break_from(frame).is_empty() {
            bail!("break outside of a loop");
        }
        if !self.scopes.collect_unresolved_continue_from(frame).is_empty() {
            bail!("continue outside of a loop");
        }
        let exit = self.emit();
        for pending in self.scopes.collect_unresolved_return_from(frame) {
            self.set(pending.site, Transition::Goto(exit));
        }
        self.scopes.clear_unresolved_return_from(frame);
        self.scopes.clear_return_target_from(frame);
        self.scopes.pop_frame()?;
        self.call_depth -= 1;

        Ok(slot)
    }
}
