//! A single node of the scope tree

use crate::path::ScopePath;
use crate::state::StateId;
use fsm_intern::{Interner, Symbol};
use indexmap::IndexSet;
use rustc_hash::{FxBuildHasher, FxHashMap};

type FxIndexSet<T> = IndexSet<T, FxBuildHasher>;

/// A function definition that can be stored in a frame
pub trait FunctionDef {
    /// Name the function is called by
    fn name(&self) -> &str;
}

/// Kind of frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrameKind {
    /// Plain nested block (loop body, branch, ...)
    Block,
    /// Function invocation boundary
    Call,
}

/// A `return` waiting for its target state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingReturn<V> {
    /// State whose next-state field must be patched
    pub site: StateId,
    /// Value being returned, if any
    pub value: Option<V>,
}

/// One scope frame
///
/// Frames are compared by handle in the owning tree, never by content: two
/// sibling blocks can carry identical declarations and still be distinct.
#[derive(Debug)]
pub struct ScopeFrame<F, V> {
    path: ScopePath,
    kind: FrameKind,
    variables: FxIndexSet<Symbol>,
    captures: FxIndexSet<Symbol>,
    globals: FxIndexSet<Symbol>,
    functions: FxHashMap<Symbol, F>,
    pending_breaks: Vec<StateId>,
    pending_continues: Vec<StateId>,
    pending_returns: Vec<PendingReturn<V>>,
    return_slot: Option<String>,
}

impl<F, V> ScopeFrame<F, V> {
    /// Create an empty frame
    #[must_use]
    pub fn new(path: ScopePath, kind: FrameKind) -> Self {
        Self {
            path,
            kind,
            variables: FxIndexSet::default(),
            captures: FxIndexSet::default(),
            globals: FxIndexSet::default(),
            functions: FxHashMap::default(),
            pending_breaks: Vec::new(),
            pending_continues: Vec::new(),
            pending_returns: Vec::new(),
            return_slot: None,
        }
    }

    /// Path of this frame
    #[must_use]
    pub fn path(&self) -> &ScopePath {
        &self.path
    }

    /// Kind of this frame
    #[must_use]
    pub fn kind(&self) -> FrameKind {
        self.kind
    }

    /// Whether this frame is a function invocation boundary
    #[must_use]
    pub fn is_call(&self) -> bool {
        self.kind == FrameKind::Call
    }

    // ---- declarations ----

    /// Record a local variable; redeclaring is allowed and changes nothing
    pub fn declare(&mut self, name: Symbol) {
        self.variables.insert(name);
    }

    /// Record a capture directive
    pub fn declare_captured(&mut self, name: Symbol) {
        self.captures.insert(name);
    }

    /// Record a global directive
    pub fn declare_global(&mut self, name: Symbol) {
        self.globals.insert(name);
    }

    /// Store a function, replacing any earlier definition with the same name
    pub fn declare_function(&mut self, name: Symbol, def: F) {
        self.functions.insert(name, def);
    }

    /// Whether `name` is a local of this frame
    #[must_use]
    pub fn has_local(&self, name: Symbol) -> bool {
        self.variables.contains(&name)
    }

    /// Whether this frame carries a capture directive for `name`
    #[must_use]
    pub fn is_captured(&self, name: Symbol) -> bool {
        self.captures.contains(&name)
    }

    /// Whether this frame carries a global directive for `name`
    #[must_use]
    pub fn is_global(&self, name: Symbol) -> bool {
        self.globals.contains(&name)
    }

    /// Flat name of `name` if it is a local of this frame
    #[must_use]
    pub fn lookup_local(&self, name: Symbol, interner: &Interner) -> Option<String> {
        self.has_local(name).then(|| self.path.qualify(interner.resolve(name)))
    }

    /// Flat name of `name` if this frame captures it
    #[must_use]
    pub fn lookup_captured(&self, name: Symbol, interner: &Interner) -> Option<String> {
        self.is_captured(name).then(|| self.path.qualify(interner.resolve(name)))
    }

    /// Flat name of `name` if this frame declares it global
    #[must_use]
    pub fn lookup_global(&self, name: Symbol, interner: &Interner) -> Option<String> {
        self.is_global(name).then(|| self.path.qualify(interner.resolve(name)))
    }

    /// Function defined in this frame under `name`
    #[must_use]
    pub fn lookup_function(&self, name: Symbol) -> Option<&F> {
        self.functions.get(&name)
    }

    /// Local variables in declaration order
    pub fn variables(&self) -> impl Iterator<Item = Symbol> + '_ {
        self.variables.iter().copied()
    }

    /// Captured names in declaration order
    pub fn captures(&self) -> impl Iterator<Item = Symbol> + '_ {
        self.captures.iter().copied()
    }

    /// Global names in declaration order
    pub fn globals(&self) -> impl Iterator<Item = Symbol> + '_ {
        self.globals.iter().copied()
    }

    /// Functions defined directly in this frame
    pub fn functions(&self) -> impl Iterator<Item = (Symbol, &F)> + '_ {
        self.functions.iter().map(|(name, def)| (*name, def))
    }

    // ---- pending jumps ----

    /// Queue a `break` patch site
    pub fn record_break(&mut self, site: StateId) {
        self.pending_breaks.push(site);
    }

    /// Queue a `continue` patch site
    pub fn record_continue(&mut self, site: StateId) {
        self.pending_continues.push(site);
    }

    /// Queue a `return` patch site with its value
    pub fn record_return(&mut self, site: StateId, value: Option<V>) {
        self.pending_returns.push(PendingReturn { site, value });
    }

    /// Whether a `break` is waiting in this frame
    #[must_use]
    pub fn has_pending_break(&self) -> bool {
        !self.pending_breaks.is_empty()
    }

    /// Whether a `continue` is waiting in this frame
    #[must_use]
    pub fn has_pending_continue(&self) -> bool {
        !self.pending_continues.is_empty()
    }

    /// Whether a `return` is waiting in this frame
    #[must_use]
    pub fn has_pending_return(&self) -> bool {
        !self.pending_returns.is_empty()
    }

    /// Pending `break` sites without removing them
    #[must_use]
    pub fn pending_breaks(&self) -> &[StateId] {
        &self.pending_breaks
    }

    /// Pending `continue` sites without removing them
    #[must_use]
    pub fn pending_continues(&self) -> &[StateId] {
        &self.pending_continues
    }

    /// Pending returns without removing them
    #[must_use]
    pub fn pending_returns(&self) -> &[PendingReturn<V>] {
        &self.pending_returns
    }

    /// Take every pending `break`, leaving the queue empty
    pub fn drain_pending_breaks(&mut self) -> Vec<StateId> {
        std::mem::take(&mut self.pending_breaks)
    }

    /// Take every pending `continue`, leaving the queue empty
    pub fn drain_pending_continues(&mut self) -> Vec<StateId> {
        std::mem::take(&mut self.pending_continues)
    }

    /// Take every pending `return`, leaving the queue empty
    pub fn drain_pending_returns(&mut self) -> Vec<PendingReturn<V>> {
        std::mem::take(&mut self.pending_returns)
    }

    /// Drop every pending `break`
    pub fn clear_pending_breaks(&mut self) {
        self.pending_breaks.clear();
    }

    /// Drop every pending `continue`
    pub fn clear_pending_continues(&mut self) {
        self.pending_continues.clear();
    }

    /// Drop every pending `return`
    pub fn clear_pending_returns(&mut self) {
        self.pending_returns.clear();
    }

    // ---- return slot ----

    /// Designate the register holding this function's return value
    pub fn set_return_slot(&mut self, slot: impl Into<String>) {
        self.return_slot = Some(slot.into());
    }

    /// Register holding this function's return value
    #[must_use]
    pub fn return_slot(&self) -> Option<&str> {
        self.return_slot.as_deref()
    }

    /// Forget the return register
    pub fn clear_return_slot(&mut self) {
        self.return_slot = None;
    }
}
