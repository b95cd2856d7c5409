//! pharmakon-common — shared error taxonomy.
//!
//! Fatal errors abort a run with a message naming the missing resource or
//! violated precondition; malformed corpus records are not errors at all —
//! extraction skips and counts them.

pub mod error;

pub use error::{PharmakonError, Result};
