//! Domain logic for Roast Me Characters.
//!
//! This crate has no internal dependencies and performs no I/O: it holds the
//! generation state machine, retry policy, prompt construction, credit
//! packages, image processing and the small validation helpers shared by the
//! database, pipeline and API crates.

pub mod credits;
pub mod error;
pub mod features;
pub mod generation;
pub mod hashing;
pub mod imaging;
pub mod naming;
pub mod pagination;
pub mod prompt;
pub mod retry;
pub mod types;
pub mod user_errors;
pub mod waitlist;
