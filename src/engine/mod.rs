//! Terminal side of planning and applying
//!
//! The declarative crate does the work: diffing current against desired
//! state and executing stages. This module shows diffs, asks for
//! confirmation and reports progress and outcomes.

pub mod differ;
pub mod executor;

pub use differ::{display_content_diff, display_diff};
pub use executor::{ApplyOptions, run};
