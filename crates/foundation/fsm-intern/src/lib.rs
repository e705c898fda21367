//! String interning for scope names
//!
//! Each compilation owns its own interner, so there is no locking and no
//! state shared between programs compiled side by side.

pub use lasso::Spur as Symbol;
use lasso::Rodeo;
use std::fmt;

/// Single-owner string interner
pub struct Interner {
    inner: Rodeo,
}

impl Default for Interner {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Interner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Interner").field("len", &self.len()).finish()
    }
}

impl Interner {
    /// Create an empty interner
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Rodeo::new(),
        }
    }

    /// Intern `text`, returning the existing symbol if it was seen before
    pub fn intern(&mut self, text: &str) -> Symbol {
        self.inner.get_or_intern(text)
    }

    /// Look up `text` without interning it
    #[must_use]
    pub fn get(&self, text: &str) -> Option<Symbol> {
        self.inner.get(text)
    }

    /// Resolve a symbol back to its text
    #[must_use]
    pub fn resolve(&self, sym: Symbol) -> &str {
        self.inner.resolve(&sym)
    }

    /// Number of distinct strings interned so far
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Whether nothing has been interned yet
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}
