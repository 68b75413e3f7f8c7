//! Character generation pipeline.
//!
//! [`Generator`] drives one character through the status state machine:
//! analyse the photo, generate the figurine, store renditions, and retry
//! failed attempts with class-dependent backoff and escalating prompts.
//! [`sweeper`] terminates generations abandoned by a crashed or restarted
//! process.
//!
//! Persistence goes through [`GenerationStore`] so the runner can be tested
//! against in-memory fakes.

pub mod config;
pub mod error;
pub mod og;
pub mod runner;
pub mod store;
pub mod sweeper;

pub use config::GenerationConfig;
pub use error::PipelineError;
pub use runner::Generator;
pub use store::{GenerationJob, GenerationStore, PgGenerationStore, SourceImage};
