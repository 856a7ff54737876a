//! Staging and branch policies applied before any git side effect.

pub mod branch;
pub mod staging;

pub use branch::{decide, unique_branch_name, BranchDecision};
pub use staging::{classify, ExclusionSet};
