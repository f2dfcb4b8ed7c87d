//! Filtering and deterministic ranking of releases.

mod filter;
mod policy;
mod quality;
mod selector;

pub use filter::{accepts, filter_releases};
pub use policy::{default_tie_break, SelectionPolicy, TieBreak};
pub use quality::{QualityProfile, UnknownProfile};
pub use selector::{compare, evaluate, rank, select, select_best, Ranked, SelectError, Selection};
