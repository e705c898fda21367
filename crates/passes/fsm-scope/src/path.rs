//! Flat names for nested scopes

use std::fmt;

/// Nesting path from the root frame down to one frame
///
/// The path renders to a single identifier by joining its segments with the
/// separator. That flat form is the hardware-visible prefix for everything
/// declared in the frame.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ScopePath {
    segments: Vec<String>,
    separator: char,
    flat: String,
}

impl ScopePath {
    /// Path consisting of the root segment only
    #[must_use]
    pub fn root(segment: impl Into<String>, separator: char) -> Self {
        let segment = segment.into();
        Self {
            flat: segment.clone(),
            segments: vec![segment],
            separator,
        }
    }

    /// Build a path from explicit segments
    ///
    /// Returns `None` for an empty segment list, since every path starts at
    /// the root.
    #[must_use]
    pub fn from_segments<I, S>(segments: I, separator: char) -> Option<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut iter = segments.into_iter();
        let mut path = Self::root(iter.next()?, separator);
        for segment in iter {
            path = path.child(segment);
        }
        Some(path)
    }

    /// Path of a frame nested directly below this one
    #[must_use]
    pub fn child(&self, label: impl Into<String>) -> Self {
        let label = label.into();
        let mut flat = String::with_capacity(self.flat.len() + 1 + label.len());
        flat.push_str(&self.flat);
        flat.push(self.separator);
        flat.push_str(&label);

        let mut segments = self.segments.clone();
        segments.push(label);
        Self {
            segments,
            separator: self.separator,
            flat,
        }
    }

    /// Last segment (the frame's own label)
    #[must_use]
    pub fn label(&self) -> &str {
        self.segments.last().map_or("", String::as_str)
    }

    /// Nesting depth, where the root path has depth 1
    #[must_use]
    pub fn depth(&self) -> usize {
        self.segments.len()
    }

    /// Joined form of the path
    #[must_use]
    pub fn flatten(&self) -> &str {
        &self.flat
    }

    /// Flat register name for `name` declared in this scope
    #[must_use]
    pub fn qualify(&self, name: &str) -> String {
        let mut out = String::with_capacity(self.flat.len() + 1 + name.len());
        out.push_str(&self.flat);
        out.push(self.separator);
        out.push_str(name);
        out
    }
}

impl fmt::Display for ScopePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.flat)
    }
}
