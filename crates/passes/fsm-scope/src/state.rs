//! Clock state identifiers

use std::fmt;

/// Opaque identifier of one FSM state
///
/// The scheduler hands these out; this crate only stores and returns them.
/// A break, continue or return records the state whose next-state field is
/// still a placeholder, so the same type doubles as the patch site.
#[derive(Copy, Clone, Debug, Hash, Eq, PartialEq, Ord, PartialOrd)]
pub struct StateId(pub u32);

impl fmt::Display for StateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "S{}", self.0)
    }
}
