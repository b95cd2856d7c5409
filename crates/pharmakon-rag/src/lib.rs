//! pharmakon-rag — query-time components.
//!
//! - Drug vocabulary index (synonym -> canonical resolution)
//! - Intent safety filter (dosage/diagnosis refusal)

pub mod intent;
pub mod vocab;
