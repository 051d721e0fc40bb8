//! lineup-core — The fixed contract between the test driver and an
//! identification engine under test.
//!
//! The driver never looks inside a template; it moves opaque bytes
//! between the engine and the enrolled-template store and records the
//! status codes the engine reports.

pub mod engine;
pub mod types;

pub use engine::{IdentEngine, Identification, TemplateOutput};
pub use types::{Candidate, EyePair, Image, ReturnCode, ReturnStatus, TemplateRole};
