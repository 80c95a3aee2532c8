//! Pure data types for sandgate: validation issues and verdicts.
//!
//! This crate is a leaf dependency with no parser and no I/O, so services that
//! only forward verdicts can depend on it without pulling in the front end.

pub mod issue;
pub mod result;

// Flat re-exports for convenience
pub use issue::*;
pub use result::*;
