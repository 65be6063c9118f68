//! Dedup pipeline and scheduler for the Newswire collector
//!
//! This crate wires the candidate filter, the dedup engine and the bounded
//! store into a polling scheduler that runs one ingestion cycle per tick.

pub mod dedup;
pub mod filter;
pub mod scheduler;
pub mod store;

pub use dedup::{Admission, ComparisonWindow, DedupEngine, WindowPolicy};
pub use filter::{CandidateFilter, FilterVerdict};
pub use scheduler::{CycleError, CycleReport, Scheduler};
pub use store::{BoundedStore, ChannelMeta, StoreError};
