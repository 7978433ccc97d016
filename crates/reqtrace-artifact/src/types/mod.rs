//! Concrete artifact types
//!
//! Field names follow the inbound JSON produced by the upstream generators.
//! Every field is defaulted on deserialization so partially populated
//! artifacts still load; quality gaps are the evaluator's concern, not a
//! parse failure.

pub mod epic;
pub mod requirement;
pub mod test_case;
pub mod user_story;

pub use epic::Epic;
pub use requirement::Requirement;
pub use test_case::{TestCase, TestStep};
pub use user_story::{StoryCriterion, UserStory};
