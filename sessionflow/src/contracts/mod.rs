//! Output contracts between stages.
//!
//! Every stage promises JSON. A [`ResponsePolicy`] decides whether that
//! promise is enforced, repaired, or ignored.

mod policy;

pub use policy::{repair_json, ContractOutcome, ResponsePolicy, ResponseShape};
