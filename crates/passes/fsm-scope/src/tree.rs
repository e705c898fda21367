//! Scope tree and cursor driven by the lowering pass

use crate::binding::BindingTable;
use crate::config::ScopeConfig;
use crate::error::ScopeError;
use crate::frame::{FrameKind, FunctionDef, PendingReturn, ScopeFrame};
use crate::path::ScopePath;
use crate::state::StateId;
use fsm_intern::Interner;
use la_arena::{Arena, ArenaMap, Idx, RawIdx};
use rustc_hash::FxHashSet;
use std::fmt;
use tracing::{debug, trace};

/// Stable handle of a frame inside its [`ScopeTree`]
///
/// Equality is handle equality: two frames with the same path and kind are
/// still different frames.
#[derive(Copy, Clone, Debug, Hash, Eq, PartialEq, Ord, PartialOrd)]
pub struct FrameId(u32);

impl FrameId {
    fn from_idx<T>(idx: Idx<T>) -> Self {
        Self(u32::from(idx.into_raw()))
    }

    fn idx<T>(self) -> Idx<T> {
        Idx::from_raw(RawIdx::from(self.0))
    }
}

/// All frames of one control-thread program plus the cursor into them
///
/// Frames are only ever created under the cursor, so the tree mirrors the
/// static nesting of the traversal. Popping moves the cursor but keeps the
/// frame, since later jump collection walks whole subtrees.
pub struct ScopeTree<F, V> {
    config: ScopeConfig,
    interner: Interner,
    frames: Arena<ScopeFrame<F, V>>,
    parents: ArenaMap<Idx<ScopeFrame<F, V>>, FrameId>,
    children: ArenaMap<Idx<ScopeFrame<F, V>>, Vec<FrameId>>,
    root: FrameId,
    current: FrameId,
    label_count: u32,
    temp_count: u32,
    /// Every flat name handed out, across all frames
    declared: FxHashSet<String>,
    bindings: BindingTable<V>,
}

impl<F, V: fmt::Debug> fmt::Debug for ScopeTree<F, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let paths: Vec<&str> = self
            .frames
            .iter()
            .map(|(_, frame)| frame.path().flatten())
            .collect();
        f.debug_struct("ScopeTree")
            .field("config", &self.config)
            .field("frames", &paths)
            .field("root", &self.root)
            .field("current", &self.current)
            .field("label_count", &self.label_count)
            .field("temp_count", &self.temp_count)
            .field("bindings", &self.bindings)
            .finish_non_exhaustive()
    }
}

impl<F, V> Default for ScopeTree<F, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<F, V> ScopeTree<F, V> {
    /// Create a tree holding only the root frame, using default naming
    #[must_use]
    pub fn new() -> Self {
        Self::build(ScopeConfig::default())
    }

    /// Create a tree with custom naming
    ///
    /// # Errors
    ///
    /// Returns `ScopeError::InvalidConfig` if `config` fails validation.
    pub fn with_config(config: ScopeConfig) -> Result<Self, ScopeError> {
        config.validate()?;
        Ok(Self::build(config))
    }

    fn build(config: ScopeConfig) -> Self {
        let mut frames = Arena::new();
        let root_path = ScopePath::root(config.root_segment.clone(), config.separator);
        let root = FrameId::from_idx(frames.alloc(ScopeFrame::new(root_path, FrameKind::Block)));

        Self {
            config,
            interner: Interner::new(),
            frames,
            parents: ArenaMap::default(),
            children: ArenaMap::default(),
            root,
            current: root,
            label_count: 0,
            temp_count: 0,
            declared: FxHashSet::default(),
            bindings: BindingTable::new(),
        }
    }

    // ---- structure ----

    /// The implicit root frame
    #[must_use]
    pub fn root(&self) -> FrameId {
        self.root
    }

    /// Frame under the cursor
    #[must_use]
    pub fn current(&self) -> FrameId {
        self.current
    }

    /// Access a frame
    ///
    /// # Panics
    ///
    /// Panics if `id` was not handed out by this tree.
    #[must_use]
    pub fn frame(&self, id: FrameId) -> &ScopeFrame<F, V> {
        &self.frames[id.idx()]
    }

    /// Frame under the cursor
    #[must_use]
    pub fn current_frame(&self) -> &ScopeFrame<F, V> {
        self.frame(self.current)
    }

    /// Parent of `id`, `None` for the root
    #[must_use]
    pub fn parent_of(&self, id: FrameId) -> Option<FrameId> {
        self.parents.get(id.idx()).copied()
    }

    /// Children of `id` in creation order
    #[must_use]
    pub fn children_of(&self, id: FrameId) -> &[FrameId] {
        self.children.get(id.idx()).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Number of frames created so far, root included
    #[must_use]
    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    /// Open a new frame below the cursor and move the cursor into it
    ///
    /// Without a label the frame is named from the label prefix and a
    /// per-tree counter.
    ///
    /// # Errors
    ///
    /// Returns `ScopeError::InvalidSegment` if `label` contains the separator;
    /// the tree is left unchanged.
    pub fn push_frame(
        &mut self,
        label: Option<&str>,
        kind: FrameKind,
    ) -> Result<FrameId, ScopeError> {
        let label = match label {
            Some(label) => {
                if label.contains(self.config.separator) {
                    return Err(ScopeError::InvalidSegment {
                        segment: label.to_string(),
                        separator: self.config.separator,
                    });
                }
                label.to_string()
            }
            None => {
                let label = format!("{}{}", self.config.label_prefix, self.label_count);
                self.label_count += 1;
                label
            }
        };

        let parent = self.current;
        let path = self.frame(parent).path().child(label);
        trace!(path = %path, ?kind, "push scope frame");

        let id = FrameId::from_idx(self.frames.alloc(ScopeFrame::new(path, kind)));
        self.parents.insert(id.idx(), parent);
        match self.children.get_mut(parent.idx()) {
            Some(siblings) => siblings.push(id),
            None => {
                self.children.insert(parent.idx(), vec![id]);
            }
        }
        self.current = id;
        Ok(id)
    }

    /// Move the cursor back to the parent frame
    ///
    /// # Errors
    ///
    /// Returns `ScopeError::PopUnderflow` at the root; the cursor stays put.
    pub fn pop_frame(&mut self) -> Result<FrameId, ScopeError> {
        let parent = self.parent_of(self.current).ok_or(ScopeError::PopUnderflow)?;
        trace!(path = %self.current_frame().path(), "pop scope frame");
        self.current = parent;
        Ok(parent)
    }

    /// Ancestors of the cursor, starting with the cursor itself
    fn chain(&self) -> impl Iterator<Item = FrameId> + '_ {
        std::iter::successors(Some(self.current), |id| self.parent_of(*id))
    }

    fn nearest_call_frame(&self) -> Option<FrameId> {
        self.chain().find(|id| self.frame(*id).is_call())
    }

    /// Frame that receives capture/global directives
    fn directive_frame(&self) -> FrameId {
        self.nearest_call_frame().unwrap_or(self.current)
    }

    fn frame_mut(&mut self, id: FrameId) -> &mut ScopeFrame<F, V> {
        &mut self.frames[id.idx()]
    }

    /// `from` and every frame below it, parents before children and siblings
    /// in creation order
    fn subtree(&self, from: FrameId) -> Vec<FrameId> {
        let mut order = Vec::new();
        let mut work = vec![from];
        while let Some(id) = work.pop() {
            order.push(id);
            work.extend(self.children_of(id).iter().rev().copied());
        }
        order
    }

    // ---- declarations ----

    /// Declare a local in the current frame and return its flat name
    pub fn declare_variable(&mut self, name: &str) -> String {
        let sym = self.interner.intern(name);
        let current = self.current;
        let frame = self.frame_mut(current);
        frame.declare(sym);
        let flat = frame.path().qualify(name);
        trace!(variable = name, flat = %flat, "declare variable");
        self.declared.insert(flat.clone());
        flat
    }

    /// Let `name` resolve past the enclosing function boundary
    ///
    /// The directive is recorded on the nearest call frame, which is the only
    /// place resolution consults it.
    pub fn declare_capture(&mut self, name: &str) {
        let sym = self.interner.intern(name);
        let target = self.directive_frame();
        trace!(variable = name, path = %self.frame(target).path(), "declare capture");
        self.frame_mut(target).declare_captured(sym);
    }

    /// Let `name` resolve to the root frame
    ///
    /// Recorded on the nearest call frame, like [`ScopeTree::declare_capture`].
    pub fn declare_global(&mut self, name: &str) {
        let sym = self.interner.intern(name);
        let target = self.directive_frame();
        trace!(variable = name, path = %self.frame(target).path(), "declare global");
        self.frame_mut(target).declare_global(sym);
    }

    /// Pick a fresh temporary, declare it in the current frame and return its
    /// flat name
    ///
    /// Candidates already visible from the cursor are skipped, and so are
    /// candidates whose flat name some other declaration already produced.
    /// The counter only moves forward.
    pub fn allocate_temp_variable(&mut self) -> String {
        loop {
            let candidate = format!("{}{}", self.config.temp_prefix, self.temp_count);
            self.temp_count += 1;
            let flat = self.current_frame().path().qualify(&candidate);
            if self.resolve_variable(&candidate, false).is_none()
                && !self.declared.contains(&flat)
            {
                let declared = self.declare_variable(&candidate);
                debug!(flat = %declared, "allocate temporary");
                return declared;
            }
        }
    }

    // ---- resolution ----

    /// Flat name `name` refers to from the cursor
    ///
    /// Walks towards the root and stops at the first frame declaring `name`.
    /// A call frame ends the walk unless it captures `name`; a global
    /// directive there redirects the lookup to the root. When nothing local
    /// matched, reads fall back to the root frame. Stores fall back only
    /// under a global directive; otherwise they get `None` and the caller
    /// declares a fresh local.
    #[must_use]
    pub fn resolve_variable(&self, name: &str, for_store: bool) -> Option<String> {
        let sym = self.interner.get(name)?;
        let mut redirected = false;

        let mut cursor = Some(self.current);
        while let Some(id) = cursor {
            let frame = self.frame(id);
            if let Some(flat) = frame.lookup_local(sym, &self.interner) {
                return Some(flat);
            }
            if frame.is_call() {
                // Capture is checked before global.
                if frame.is_captured(sym) {
                    cursor = self.parent_of(id);
                    continue;
                }
                redirected = frame.is_global(sym);
                break;
            }
            cursor = self.parent_of(id);
        }

        if for_store && !redirected {
            return None;
        }
        self.frame(self.root).lookup_local(sym, &self.interner)
    }

    /// Like [`ScopeTree::resolve_variable`], reporting absence as an error
    ///
    /// # Errors
    ///
    /// Returns `ScopeError::UnknownVariable` with spelling suggestions.
    pub fn require_variable(&self, name: &str, for_store: bool) -> Result<String, ScopeError> {
        self.resolve_variable(name, for_store).ok_or_else(|| {
            let visible = self.names_in_scope();
            ScopeError::UnknownVariable {
                name: name.to_string(),
                suggestions: ScopeError::compute_suggestions(
                    name,
                    visible.iter().map(String::as_str),
                ),
            }
        })
    }

    /// Variable names declared in the cursor's frame, its ancestors and the
    /// root, nearest first
    #[must_use]
    pub fn names_in_scope(&self) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        for id in self.chain() {
            for sym in self.frame(id).variables() {
                let text = self.interner.resolve(sym);
                if !names.iter().any(|seen| seen == text) {
                    names.push(text.to_string());
                }
            }
        }
        names
    }

    /// Nearest function definition visible from the cursor
    ///
    /// Functions are visible through call frames without any directive.
    #[must_use]
    pub fn resolve_function(&self, name: &str) -> Option<&F> {
        let sym = self.interner.get(name)?;
        self.chain()
            .find_map(|id| self.frame(id).lookup_function(sym))
            .or_else(|| self.frame(self.root).lookup_function(sym))
    }

    /// Like [`ScopeTree::resolve_function`], reporting absence as an error
    ///
    /// # Errors
    ///
    /// Returns `ScopeError::UnknownFunction` with spelling suggestions.
    pub fn require_function(&self, name: &str) -> Result<&F, ScopeError> {
        self.resolve_function(name).ok_or_else(|| {
            let defined: Vec<&str> = self
                .chain()
                .flat_map(|id| self.frame(id).functions().map(|(sym, _)| sym))
                .map(|sym| self.interner.resolve(sym))
                .collect();
            ScopeError::UnknownFunction {
                name: name.to_string(),
                suggestions: ScopeError::compute_suggestions(name, defined),
            }
        })
    }

    // ---- jumps ----

    /// Record a `break` in the current frame
    pub fn record_break(&mut self, site: StateId) {
        trace!(%site, "record break");
        let current = self.current;
        self.frame_mut(current).record_break(site);
    }

    /// Record a `continue` in the current frame
    pub fn record_continue(&mut self, site: StateId) {
        trace!(%site, "record continue");
        let current = self.current;
        self.frame_mut(current).record_continue(site);
    }

    /// Record a `return` in the current frame
    pub fn record_return(&mut self, site: StateId, value: Option<V>) {
        trace!(%site, "record return");
        let current = self.current;
        self.frame_mut(current).record_return(site, value);
    }

    /// Whether the current frame itself holds a pending `break`
    #[must_use]
    pub fn has_pending_break(&self) -> bool {
        self.current_frame().has_pending_break()
    }

    /// Whether the current frame itself holds a pending `continue`
    #[must_use]
    pub fn has_pending_continue(&self) -> bool {
        self.current_frame().has_pending_continue()
    }

    /// Whether the current frame itself holds a pending `return`
    #[must_use]
    pub fn has_pending_return(&self) -> bool {
        self.current_frame().has_pending_return()
    }

    /// Every pending `break` in the cursor's subtree, pre-order
    #[must_use]
    pub fn collect_unresolved_break(&self) -> Vec<StateId> {
        self.collect_unresolved_break_from(self.current)
    }

    /// Every pending `break` in the subtree rooted at `from`, pre-order
    #[must_use]
    pub fn collect_unresolved_break_from(&self, from: FrameId) -> Vec<StateId> {
        let sites: Vec<StateId> = self
            .subtree(from)
            .into_iter()
            .flat_map(|id| self.frame(id).pending_breaks().iter().copied())
            .collect();
        debug!(count = sites.len(), "collect unresolved breaks");
        sites
    }

    /// Every pending `continue` in the cursor's subtree, pre-order
    #[must_use]
    pub fn collect_unresolved_continue(&self) -> Vec<StateId> {
        self.collect_unresolved_continue_from(self.current)
    }

    /// Every pending `continue` in the subtree rooted at `from`, pre-order
    #[must_use]
    pub fn collect_unresolved_continue_from(&self, from: FrameId) -> Vec<StateId> {
        let sites: Vec<StateId> = self
            .subtree(from)
            .into_iter()
            .flat_map(|id| self.frame(id).pending_continues().iter().copied())
            .collect();
        debug!(count = sites.len(), "collect unresolved continues");
        sites
    }

    /// Clear pending `break`s in the cursor's subtree
    pub fn clear_unresolved_break(&mut self) {
        self.clear_unresolved_break_from(self.current);
    }

    /// Clear pending `break`s in the subtree rooted at `from`
    pub fn clear_unresolved_break_from(&mut self, from: FrameId) {
        for id in self.subtree(from) {
            self.frame_mut(id).clear_pending_breaks();
        }
    }

    /// Clear pending `continue`s in the cursor's subtree
    pub fn clear_unresolved_continue(&mut self) {
        self.clear_unresolved_continue_from(self.current);
    }

    /// Clear pending `continue`s in the subtree rooted at `from`
    pub fn clear_unresolved_continue_from(&mut self, from: FrameId) {
        for id in self.subtree(from) {
            self.frame_mut(id).clear_pending_continues();
        }
    }

    /// Clear pending `return`s in the cursor's subtree
    pub fn clear_unresolved_return(&mut self) {
        self.clear_unresolved_return_from(self.current);
    }

    /// Clear pending `return`s in the subtree rooted at `from`
    pub fn clear_unresolved_return_from(&mut self, from: FrameId) {
        for id in self.subtree(from) {
            self.frame_mut(id).clear_pending_returns();
        }
    }

    // ---- return target ----

    /// Set the return register of the nearest enclosing function
    ///
    /// # Errors
    ///
    /// Returns `ScopeError::ReturnOutsideFunction` when no call frame encloses
    /// the cursor; nothing is changed.
    pub fn set_return_target(&mut self, slot: impl Into<String>) -> Result<(), ScopeError> {
        let target = self
            .nearest_call_frame()
            .ok_or(ScopeError::ReturnOutsideFunction)?;
        let slot = slot.into();
        trace!(slot = %slot, "set return target");
        self.frame_mut(target).set_return_slot(slot);
        Ok(())
    }

    /// Return register of the nearest enclosing function, if one was set
    ///
    /// # Errors
    ///
    /// Returns `ScopeError::ReturnOutsideFunction` when no call frame encloses
    /// the cursor.
    pub fn return_target(&self) -> Result<Option<&str>, ScopeError> {
        let target = self
            .nearest_call_frame()
            .ok_or(ScopeError::ReturnOutsideFunction)?;
        Ok(self.frame(target).return_slot())
    }

    /// Forget return registers in the cursor's subtree
    pub fn clear_return_target(&mut self) {
        self.clear_return_target_from(self.current);
    }

    /// Forget return registers in the subtree rooted at `from`
    pub fn clear_return_target_from(&mut self, from: FrameId) {
        for id in self.subtree(from) {
            self.frame_mut(id).clear_return_slot();
        }
    }

    // ---- bindings ----

    /// Record that `destination` takes `source` in `state`, optionally guarded
    pub fn record_binding(
        &mut self,
        state: StateId,
        destination: impl Into<String>,
        source: V,
        condition: Option<V>,
    ) {
        let destination = destination.into();
        debug!(%state, destination = %destination, guarded = condition.is_some(), "record binding");
        self.bindings.record(state, destination, source, condition);
    }

    /// All bindings recorded so far
    #[must_use]
    pub fn bindings(&self) -> &BindingTable<V> {
        &self.bindings
    }

    /// Hand the binding table to code generation
    #[must_use]
    pub fn into_bindings(self) -> BindingTable<V> {
        self.bindings
    }
}

impl<F: FunctionDef, V> ScopeTree<F, V> {
    /// Define a function in the current frame
    pub fn declare_function(&mut self, def: F) {
        let sym = self.interner.intern(def.name());
        trace!(function = def.name(), "declare function");
        let current = self.current;
        self.frame_mut(current).declare_function(sym, def);
    }
}

impl<F, V: Clone> ScopeTree<F, V> {
    /// Every pending `return` in the cursor's subtree, pre-order
    #[must_use]
    pub fn collect_unresolved_return(&self) -> Vec<PendingReturn<V>> {
        self.collect_unresolved_return_from(self.current)
    }

    /// Every pending `return` in the subtree rooted at `from`, pre-order
    #[must_use]
    pub fn collect_unresolved_return_from(&self, from: FrameId) -> Vec<PendingReturn<V>> {
        let returns: Vec<PendingReturn<V>> = self
            .subtree(from)
            .into_iter()
            .flat_map(|id| self.frame(id).pending_returns().iter().cloned())
            .collect();
        debug!(count = returns.len(), "collect unresolved returns");
        returns
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use expect_test::expect;

    #[derive(Debug, Clone, PartialEq, Eq)]
    struct Func {
        name: String,
        entry: u32,
    }

    impl Func {
        fn new(name: &str, entry: u32) -> Self {
            Self {
                name: name.to_string(),
                entry,
            }
        }
    }

    impl FunctionDef for Func {
        fn name(&self) -> &str {
            &self.name
        }
    }

    type Tree = ScopeTree<Func, &'static str>;

    fn push_block(tree: &mut Tree, label: &str) -> FrameId {
        tree.push_frame(Some(label), FrameKind::Block).unwrap()
    }

    fn push_call(tree: &mut Tree, label: &str) -> FrameId {
        tree.push_frame(Some(label), FrameKind::Call).unwrap()
    }

    #[test]
    fn test_push_pop_restores_cursor() {
        let mut tree = Tree::new();
        let outer = push_block(&mut tree, "outer");

        for _ in 0..3 {
            tree.push_frame(None, FrameKind::Block).unwrap();
        }
        push_call(&mut tree, "f");
        for _ in 0..4 {
            tree.pop_frame().unwrap();
        }
        assert_eq!(tree.current(), outer);

        tree.pop_frame().unwrap();
        assert_eq!(tree.current(), tree.root());
        assert_eq!(tree.pop_frame(), Err(ScopeError::PopUnderflow));
        assert_eq!(tree.current(), tree.root());
    }

    #[test]
    fn test_generated_labels_are_sequential() {
        let mut tree = Tree::new();
        let first = tree.push_frame(None, FrameKind::Block).unwrap();
        tree.pop_frame().unwrap();
        let second = tree.push_frame(None, FrameKind::Block).unwrap();

        assert_ne!(first, second);
        expect!["__s0"].assert_eq(tree.frame(first).path().flatten());
        expect!["__s1"].assert_eq(tree.frame(second).path().flatten());
        assert_eq!(tree.children_of(tree.root()), &[first, second]);
        assert_eq!(tree.parent_of(second), Some(tree.root()));
    }

    #[test]
    fn test_label_with_separator_rejected() {
        let mut tree = Tree::new();
        let result = tree.push_frame(Some("loop_body"), FrameKind::Block);
        assert!(matches!(result, Err(ScopeError::InvalidSegment { separator: '_', .. })));
        assert_eq!(tree.frame_count(), 1);
    }

    #[test]
    fn test_sibling_frames_are_distinct() {
        let mut tree = Tree::new();
        let a = push_block(&mut tree, "arm");
        tree.pop_frame().unwrap();
        let b = push_block(&mut tree, "arm");
        assert_ne!(a, b);
        assert_eq!(tree.frame(a).path(), tree.frame(b).path());
    }

    #[test]
    fn test_block_local_visibility() {
        let mut tree = Tree::new();
        push_block(&mut tree, "a");
        let flat = tree.declare_variable("v");
        push_block(&mut tree, "inner");
        assert_eq!(tree.resolve_variable("v", false), Some(flat.clone()));
        assert_eq!(tree.resolve_variable("v", true), Some(flat));

        tree.pop_frame().unwrap();
        tree.pop_frame().unwrap();
        push_block(&mut tree, "b");
        assert_eq!(tree.resolve_variable("v", false), None);
        tree.pop_frame().unwrap();
        assert_eq!(tree.resolve_variable("v", false), None);
    }

    #[test]
    fn test_read_falls_back_to_root() {
        let mut tree = Tree::new();
        tree.declare_variable("clk_count");
        push_call(&mut tree, "f");
        push_block(&mut tree, "body");

        expect!["__clk_count"].assert_eq(&tree.resolve_variable("clk_count", false).unwrap());
    }

    #[test]
    fn test_store_does_not_alias_root() {
        let mut tree = Tree::new();
        let root_x = tree.declare_variable("x");
        push_call(&mut tree, "f");
        push_block(&mut tree, "body");

        assert_eq!(tree.resolve_variable("x", true), None);
        let local = tree.declare_variable("x");
        assert_ne!(local, root_x);
        assert_eq!(local, "__f_body_x");
        assert_eq!(tree.resolve_variable("x", false), Some(local));
    }

    #[test]
    fn test_call_boundary_hides_enclosing_locals() {
        let mut tree = Tree::new();
        push_block(&mut tree, "outer");
        tree.declare_variable("x");
        push_call(&mut tree, "f");

        assert_eq!(tree.resolve_variable("x", false), None);
    }

    #[test]
    fn test_capture_resolves_to_enclosing_frame() {
        let mut tree = Tree::new();
        push_block(&mut tree, "outer");
        let outer_x = tree.declare_variable("x");
        push_call(&mut tree, "f");
        push_block(&mut tree, "body");
        tree.declare_capture("x");

        assert_eq!(tree.resolve_variable("x", true), Some(outer_x.clone()));
        assert_eq!(tree.resolve_variable("x", false), Some(outer_x));
        assert!(tree.frame(tree.current()).captures().next().is_none());
    }

    #[test]
    fn test_global_skips_intermediate_frames() {
        let mut tree = Tree::new();
        let root_x = tree.declare_variable("x");
        push_block(&mut tree, "outer");
        tree.declare_variable("x");
        push_call(&mut tree, "f");
        tree.declare_variable("y");
        push_call(&mut tree, "g");
        push_block(&mut tree, "deep");
        tree.declare_global("x");

        assert_eq!(tree.resolve_variable("x", true), Some(root_x.clone()));
        assert_eq!(tree.resolve_variable("x", false), Some(root_x));
    }

    #[test]
    fn test_global_without_root_declaration() {
        let mut tree = Tree::new();
        push_call(&mut tree, "f");
        tree.declare_global("x");
        assert_eq!(tree.resolve_variable("x", true), None);
    }

    #[test]
    fn test_capture_takes_precedence_over_global() {
        let mut tree = Tree::new();
        tree.declare_variable("x");
        push_block(&mut tree, "outer");
        let outer_x = tree.declare_variable("x");
        push_call(&mut tree, "f");
        tree.declare_global("x");
        tree.declare_capture("x");

        assert_eq!(tree.resolve_variable("x", true), Some(outer_x));
    }

    #[test]
    fn test_unknown_variable_suggests() {
        let mut tree = Tree::new();
        tree.declare_variable("counter");
        push_block(&mut tree, "b");
        tree.declare_variable("count");

        let err = tree.require_variable("coun", false).unwrap_err();
        assert_eq!(
            err,
            ScopeError::UnknownVariable {
                name: "coun".to_string(),
                suggestions: vec!["count".to_string(), "counter".to_string()],
            }
        );
    }

    #[test]
    fn test_temp_allocation_sequence() {
        let mut tree = Tree::new();
        let temps: Vec<String> = (0..4).map(|_| tree.allocate_temp_variable()).collect();
        assert_eq!(temps, vec!["__tmp0", "__tmp1", "__tmp2", "__tmp3"]);
    }

    #[test]
    fn test_temp_allocation_skips_visible_names() {
        let mut tree = Tree::new();
        tree.declare_variable("tmp7");
        let temps: Vec<String> = (0..8).map(|_| tree.allocate_temp_variable()).collect();

        assert_eq!(temps[6], "__tmp6");
        assert_eq!(temps[7], "__tmp8");
        let mut unique = temps.clone();
        unique.sort();
        unique.dedup();
        assert_eq!(unique.len(), temps.len());
    }

    #[test]
    fn test_temp_avoids_flat_name_of_separator_bearing_variable() {
        let mut tree = Tree::new();
        let root_var = tree.declare_variable("s0_tmp0");
        tree.push_frame(None, FrameKind::Block).unwrap();
        let temp = tree.allocate_temp_variable();

        assert_eq!(root_var, "__s0_tmp0");
        assert_eq!(temp, "__s0_tmp1");
    }

    #[test]
    fn test_tree_debug_lists_frame_paths() {
        let mut tree = Tree::new();
        push_block(&mut tree, "body");
        let rendered = format!("{tree:?}");
        assert!(rendered.contains("\"__body\""));
        assert!(rendered.starts_with("ScopeTree {"));
    }

    #[test]
    fn test_temp_counter_is_per_tree() {
        let mut first = Tree::new();
        let mut second = Tree::new();
        assert_eq!(first.allocate_temp_variable(), "__tmp0");
        assert_eq!(first.allocate_temp_variable(), "__tmp1");
        assert_eq!(second.allocate_temp_variable(), "__tmp0");
    }

    #[test]
    fn test_function_visible_through_calls() {
        let mut tree = Tree::new();
        tree.declare_function(Func::new("step", 1));
        push_call(&mut tree, "f");
        tree.declare_function(Func::new("inner", 2));
        push_call(&mut tree, "g");

        assert_eq!(tree.resolve_function("step").map(|f| f.entry), Some(1));
        assert_eq!(tree.resolve_function("inner").map(|f| f.entry), Some(2));

        tree.pop_frame().unwrap();
        tree.pop_frame().unwrap();
        assert!(tree.resolve_function("inner").is_none());
        assert!(matches!(
            tree.require_function("stp"),
            Err(ScopeError::UnknownFunction { ref suggestions, .. }) if suggestions == &["step"]
        ));
    }

    #[test]
    fn test_function_suggestions_skip_shadowed_repeats() {
        let mut tree = Tree::new();
        tree.declare_function(Func::new("step", 1));
        push_block(&mut tree, "outer");
        tree.declare_function(Func::new("stop", 2));
        push_block(&mut tree, "inner");
        tree.declare_function(Func::new("step", 3));

        assert!(matches!(
            tree.require_function("stp"),
            Err(ScopeError::UnknownFunction { ref suggestions, .. })
                if suggestions == &["step", "stop"]
        ));
    }

    #[test]
    fn test_nearest_function_shadows() {
        let mut tree = Tree::new();
        tree.declare_function(Func::new("step", 1));
        push_block(&mut tree, "b");
        tree.declare_function(Func::new("step", 5));
        assert_eq!(tree.resolve_function("step").map(|f| f.entry), Some(5));
    }

    #[test]
    fn test_collect_breaks_pre_order() {
        let mut tree = Tree::new();
        let body = push_block(&mut tree, "body");
        tree.record_break(StateId(1));
        push_block(&mut tree, "then");
        tree.record_break(StateId(2));
        push_block(&mut tree, "nested");
        tree.record_break(StateId(3));
        tree.pop_frame().unwrap();
        tree.pop_frame().unwrap();
        push_block(&mut tree, "else");
        tree.record_break(StateId(4));
        tree.pop_frame().unwrap();
        tree.record_break(StateId(5));

        assert_eq!(
            tree.collect_unresolved_break_from(body),
            vec![StateId(1), StateId(5), StateId(2), StateId(3), StateId(4)]
        );
    }

    #[test]
    fn test_clear_breaks_leaves_siblings() {
        let mut tree = Tree::new();
        let first = push_block(&mut tree, "first");
        tree.record_break(StateId(1));
        push_block(&mut tree, "inner");
        tree.record_break(StateId(2));
        tree.pop_frame().unwrap();
        tree.pop_frame().unwrap();
        let second = push_block(&mut tree, "second");
        tree.record_break(StateId(3));
        tree.pop_frame().unwrap();

        tree.clear_unresolved_break_from(first);
        assert!(tree.collect_unresolved_break_from(first).is_empty());
        assert_eq!(tree.collect_unresolved_break_from(second), vec![StateId(3)]);
        assert_eq!(tree.collect_unresolved_break(), vec![StateId(3)]);
    }

    #[test]
    fn test_continue_and_return_queues() {
        let mut tree = Tree::new();
        push_call(&mut tree, "f");
        push_block(&mut tree, "loop");
        tree.record_continue(StateId(8));
        tree.record_return(StateId(9), Some("acc"));
        assert!(tree.has_pending_continue());
        assert!(tree.has_pending_return());
        assert!(!tree.has_pending_break());
        tree.pop_frame().unwrap();

        assert_eq!(tree.collect_unresolved_continue(), vec![StateId(8)]);
        assert_eq!(
            tree.collect_unresolved_return(),
            vec![PendingReturn {
                site: StateId(9),
                value: Some("acc"),
            }]
        );

        tree.clear_unresolved_continue();
        tree.clear_unresolved_return();
        assert!(tree.collect_unresolved_continue().is_empty());
        assert!(tree.collect_unresolved_return().is_empty());
    }

    #[test]
    fn test_return_target_nearest_call() {
        let mut tree = Tree::new();
        assert_eq!(tree.set_return_target("r"), Err(ScopeError::ReturnOutsideFunction));
        assert_eq!(tree.return_target(), Err(ScopeError::ReturnOutsideFunction));

        let f = push_call(&mut tree, "f");
        push_block(&mut tree, "body");
        let slot = tree.allocate_temp_variable();
        tree.set_return_target(slot.clone()).unwrap();
        assert_eq!(tree.return_target(), Ok(Some(slot.as_str())));
        assert_eq!(tree.frame(f).return_slot(), Some(slot.as_str()));

        tree.pop_frame().unwrap();
        tree.pop_frame().unwrap();
        tree.clear_return_target_from(f);
        assert_eq!(tree.frame(f).return_slot(), None);
    }

    #[test]
    fn test_bindings_accumulate() {
        let mut tree = Tree::new();
        let dst = tree.declare_variable("acc");
        tree.record_binding(StateId(1), dst.clone(), "0", None);
        tree.record_binding(StateId(2), dst.clone(), "acc + 1", Some("en"));
        tree.record_binding(StateId(3), dst.clone(), "acc", None);

        let writes = tree.bindings().get(&dst).unwrap();
        assert_eq!(writes.len(), 3);
        assert_eq!(writes[1].state, StateId(2));
        assert_eq!(writes[1].condition, Some("en"));
        assert_eq!(tree.into_bindings().len(), 1);
    }

    #[test]
    fn test_custom_config_naming() {
        let config = ScopeConfig {
            separator: '$',
            root_segment: "top".to_string(),
            label_prefix: "blk".to_string(),
            temp_prefix: "t".to_string(),
        };
        let mut tree = Tree::with_config(config).unwrap();
        tree.push_frame(None, FrameKind::Block).unwrap();
        assert_eq!(tree.allocate_temp_variable(), "top$blk0$t0");
        assert_eq!(tree.declare_variable("loop_i"), "top$blk0$loop_i");
    }
}
