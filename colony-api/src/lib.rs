//! # Colony API
//!
//! The vocabulary shared by every colony pool flavour. Nothing in this crate
//! spawns tasks or owns workers; it only describes what travels between a
//! submitting caller, the worker executing a job and the observer consuming
//! its result.
//!
//! ## Core Components
//!
//! - **Envelopes**: [`Job`] wraps an input with a unique id and a sequence
//!   number, [`JobOutput`] carries the same correlation data back together
//!   with the outcome and the [`WorkerId`] that produced it
//! - **Duplex channels**: [`Duplex`] hands out read-only and write-only views
//!   of a single channel
//! - **Cancellation**: [`CancelWorkSignal`] is the zero-sized token a pool
//!   emits when its output can no longer be delivered
//! - **Errors**: [`PoolError`] is the complete error taxonomy of the engine
//! - **Identity**: [`IdGenerator`] and its default [`Sequential`] strategy
//!
//! ## Module Organization
//!
//! - [`envelope`]: job and output envelopes
//! - [`duplex`]: multi-view channels and the cancel signal
//! - [`error`]: error taxonomy
//! - [`generator`]: unique id generation

pub mod duplex;
pub mod envelope;
pub mod error;
pub mod generator;

pub use duplex::{CancelWorkSignal, Duplex};
pub use envelope::{Job, JobOutput, WorkerId};
pub use error::PoolError;
pub use generator::{IdGenerator, Sequential};
