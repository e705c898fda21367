//! Error types for scope bookkeeping

use indexmap::IndexSet;
use rustc_hash::FxBuildHasher;

/// Errors surfaced by the scope tree
///
/// Lookups themselves only report absence; these are built by the `require_*`
/// helpers and by operations whose preconditions the driver violated.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScopeError {
    /// A read names a variable that is not visible from the current frame
    #[error("unknown variable `{name}`")]
    UnknownVariable {
        /// The name that was not found
        name: String,
        /// Visible names close to the requested one
        suggestions: Vec<String>,
    },

    /// A call names a function that no enclosing frame defines
    #[error("unknown function `{name}`")]
    UnknownFunction {
        /// The name that was not found
        name: String,
        /// Defined functions close to the requested one
        suggestions: Vec<String>,
    },

    /// `return` used with no enclosing call frame
    #[error("return outside of a function")]
    ReturnOutsideFunction,

    /// More frames were popped than pushed
    #[error("cannot pop the root scope frame")]
    PopUnderflow,

    /// A frame label contains the path separator
    #[error("scope label `{segment}` contains the separator `{separator}`")]
    InvalidSegment {
        /// The rejected label
        segment: String,
        /// Separator it collides with
        separator: char,
    },

    /// Configuration could not be parsed or is inconsistent
    #[error("invalid scope configuration: {0}")]
    InvalidConfig(String),
}

impl ScopeError {
    /// Pick up to three candidates within a small edit distance of `name`
    ///
    /// Closest candidates come first; ties keep the order in which they were
    /// supplied.
    #[must_use]
    pub fn compute_suggestions<'a, I>(name: &str, available_names: I) -> Vec<String>
    where
        I: IntoIterator<Item = &'a str>,
    {
        // Shadowed names show up once per frame; keep the first.
        let candidates: IndexSet<&str, FxBuildHasher> = available_names
            .into_iter()
            .filter(|candidate| *candidate != name)
            .collect();

        let mut suggestions: Vec<(&str, usize)> = candidates
            .into_iter()
            .map(|candidate| (candidate, levenshtein_distance(name, candidate)))
            .filter(|(_, distance)| *distance <= 3)
            .collect();

        suggestions.sort_by_key(|(_, distance)| *distance);
        suggestions
            .into_iter()
            .take(3)
            .map(|(candidate, _)| candidate.to_string())
            .collect()
    }
}

/// Compute Levenshtein distance between two strings
fn levenshtein_distance(source: &str, target: &str) -> usize {
    let source: Vec<char> = source.chars().collect();
    let target: Vec<char> = target.chars().collect();

    if source.is_empty() {
        return target.len();
    }
    if target.is_empty() {
        return source.len();
    }

    let mut previous: Vec<usize> = (0..=target.len()).collect();
    let mut current = vec![0; target.len() + 1];

    for (idx, source_char) in source.iter().enumerate() {
        current[0] = idx + 1;
        for (jdx, target_char) in target.iter().enumerate() {
            let cost = usize::from(source_char != target_char);
            current[jdx + 1] = (previous[jdx + 1] + 1)
                .min(current[jdx] + 1)
                .min(previous[jdx] + cost);
        }
        std::mem::swap(&mut previous, &mut current);
    }

    previous[target.len()]
}
