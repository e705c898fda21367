//! Lowering events replayed against a scope tree

use crate::error::ScopeError;
use crate::frame::{FrameKind, FunctionDef};
use crate::state::StateId;
use crate::tree::ScopeTree;

/// One step of the lowering traversal, in source order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScopeEvent<F, V> {
    /// Entering a nested block
    EnterBlock {
        /// Explicit frame label, generated when absent
        label: Option<String>,
    },
    /// Entering a function body at a call site
    EnterCall {
        /// Explicit frame label, generated when absent
        label: Option<String>,
    },
    /// Leaving the innermost block or function body
    Leave,
    /// A local variable declaration
    DeclareVariable(String),
    /// A capture directive
    DeclareCapture(String),
    /// A global directive
    DeclareGlobal(String),
    /// A function definition
    DeclareFunction(F),
    /// `break` whose target state is not yet known
    Break(StateId),
    /// `continue` whose target state is not yet known
    Continue(StateId),
    /// `return` whose target state is not yet known
    Return {
        /// State to patch
        site: StateId,
        /// Returned value
        value: Option<V>,
    },
    /// A register write
    Bind {
        /// State performing the write
        state: StateId,
        /// Register written
        destination: String,
        /// Value written
        source: V,
        /// Optional guard
        condition: Option<V>,
    },
}

impl<F: FunctionDef, V> ScopeTree<F, V> {
    /// Apply a single event at the cursor
    ///
    /// # Errors
    ///
    /// Propagates `ScopeError::InvalidSegment` from entering a frame and
    /// `ScopeError::PopUnderflow` from leaving the root.
    pub fn apply(&mut self, event: ScopeEvent<F, V>) -> Result<(), ScopeError> {
        match event {
            ScopeEvent::EnterBlock { label } => {
                self.push_frame(label.as_deref(), FrameKind::Block)?;
            }
            ScopeEvent::EnterCall { label } => {
                self.push_frame(label.as_deref(), FrameKind::Call)?;
            }
            ScopeEvent::Leave => {
                self.pop_frame()?;
            }
            ScopeEvent::DeclareVariable(name) => {
                self.declare_variable(&name);
            }
            ScopeEvent::DeclareCapture(name) => self.declare_capture(&name),
            ScopeEvent::DeclareGlobal(name) => self.declare_global(&name),
            ScopeEvent::DeclareFunction(def) => self.declare_function(def),
            ScopeEvent::Break(site) => self.record_break(site),
            ScopeEvent::Continue(site) => self.record_continue(site),
            ScopeEvent::Return { site, value } => self.record_return(site, value),
            ScopeEvent::Bind {
                state,
                destination,
                source,
                condition,
            } => self.record_binding(state, destination, source, condition),
        }
        Ok(())
    }

    /// Apply events in order, stopping at the first error
    ///
    /// # Errors
    ///
    /// Returns the first error raised by [`ScopeTree::apply`]; events before it
    /// stay applied.
    pub fn replay<I>(&mut self, events: I) -> Result<(), ScopeError>
    where
        I: IntoIterator<Item = ScopeEvent<F, V>>,
    {
        events.into_iter().try_for_each(|event| self.apply(event))
    }
}
