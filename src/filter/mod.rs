//! Revision selection
//!
//! [`range`] decides which revision pointers are mined at all; [`commit`]
//! decides, after materialization, which commits reach the visitors.

/// Predicates over materialized commits
pub mod commit;
/// Range selection strategies
pub mod range;

pub use commit::{
    CommitFilter, FilterChain, OnlyInBranches, OnlyInMainBranch, OnlyModificationsWithFileTypes,
    OnlyNoMerge,
};
pub use range::{CommitRange, Commits};
