//! Scope and control-flow bookkeeping for FSM lowering
//!
//! Lowering a structured control program into a finite-state machine turns
//! every statement into a clocked state and every variable into a uniquely
//! named register. Hardware has neither nested scopes nor implicit jump
//! targets, so this crate keeps the static bookkeeping in between:
//!
//! - **Flat names**: nested scope paths joined into one identifier
//!   ([`ScopePath`]).
//! - **Scope tree**: frames for blocks and function bodies, with block-local,
//!   function-local, captured and global visibility ([`ScopeTree`]).
//! - **Pending jumps**: `break`, `continue` and `return` patch sites kept until
//!   the enclosing construct knows its exit state.
//! - **Bindings**: per-register write facts for the code generator
//!   ([`BindingTable`]).
//!
//! # Usage
//!
//! ```rust,ignore
//! use fsm_scope::{FrameKind, ScopeTree, StateId};
//!
//! let mut tree: ScopeTree<Func, Expr> = ScopeTree::new();
//! tree.push_frame(None, FrameKind::Block)?;
//! tree.record_break(StateId(7));
//! tree.pop_frame()?;
//! // once the loop exit state is known
//! for site in tree.collect_unresolved_break_from(body) {
//!     patch(site, exit);
//! }
//! tree.clear_unresolved_break_from(body);
//! ```

pub mod binding;
pub mod config;
pub mod error;
pub mod event;
pub mod frame;
pub mod path;
pub mod state;
pub mod tree;

pub use binding::{Binding, BindingTable};
pub use config::ScopeConfig;
pub use error::ScopeError;
pub use event::ScopeEvent;
pub use frame::{FrameKind, FunctionDef, PendingReturn, ScopeFrame};
pub use path::ScopePath;
pub use state::StateId;
pub use tree::{FrameId, ScopeTree};
