//! Core domain model types for sessionflow.
//!
//! - Stage results and the write-once run ledger

mod result;

pub use result::{RunResults, StageResult};
