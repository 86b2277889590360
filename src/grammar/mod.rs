//! Decoders for the three response grammars.
//!
//! A model answer is a block of labeled single-line fields:
//!
//! ```text
//! Observation: <what is on screen>
//! Thought: <reasoning>
//! Action: tap(7)
//! Summary: <running summary>
//! ```
//!
//! Labels are found independently (first line-start match wins). Missing
//! mandatory labels, unknown actions and malformed operands all yield
//! [`ParseFailure`]; there is no partial result.

pub mod explore;
pub mod fields;
pub mod grid;
pub mod reflect;

use serde::Serialize;

pub use crate::errors::ParseFailure;
pub use explore::{parse_explore, ExploreAction, ExploreCommand};
pub use fields::{DOCUMENTATION_PLACEHOLDER, SUMMARY_PLACEHOLDER};
pub use grid::{parse_grid, GridAction, GridCell, GridCommand};
pub use reflect::{parse_reflect, ReflectCommand, ReflectDecision, MIN_REFLECT_LEN};

/// Free-text fields kept with every action for audit logs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Narrative {
    pub observation: String,
    pub thought: String,
    /// The raw `Action:` value.
    pub action: String,
    pub summary: String,
}
