//! Presentation of assistant turns.
//!
//! - [`markdown`]: assistant markup to HTML blocks plus citations.
//! - [`thinking`]: collapsed disclosure of a turn's thinking steps.

pub mod markdown;
pub mod thinking;
