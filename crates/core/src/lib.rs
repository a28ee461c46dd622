//! Domain types and pure logic for retinal-scan analysis.
//!
//! Nothing in this crate performs I/O: it holds the shared error type,
//! upload and patient validation, the prediction payload shapes and the
//! severity mapping applied to model output.

pub mod analysis;
pub mod error;
pub mod prediction;
pub mod severity;
pub mod types;
