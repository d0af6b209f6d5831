//! Opt-in whole-mesh consistency checks.
//!
//! The checks walk every live slot, so they are meant for debug builds, tests
//! and the end of a pass. [`debug_invariants!`](crate::debug_invariants) compiles
//! to nothing in release builds unless `strict-invariants` or `check-invariants`
//! is enabled.

use crate::mesh_error::MeshOpsError;

/// Trait for validating data structure invariants.
pub trait DebugInvariants {
    /// Validate invariants and return the first error encountered.
    fn validate_invariants(&self) -> Result<(), MeshOpsError>;

    /// Assert invariants in debug builds or when invariant checking is enabled.
    fn debug_assert_invariants(&self) {
        crate::debug_invariants!(self.validate_invariants(), "consistency check");
    }
}

/// Run a fallible check and panic on error when invariant checking is enabled.
#[macro_export]
macro_rules! debug_invariants {
    ($expr:expr, $($ctx:tt)*) => {
        #[cfg(any(debug_assertions, feature = "strict-invariants", feature = "check-invariants"))]
        if let Err(e) = $expr {
            log::error!(concat!("[invariants] ", $($ctx)*, ": {}"), e);
            panic!(concat!("[invariants] ", $($ctx)*, ": {}"), e);
        }
    };
}
