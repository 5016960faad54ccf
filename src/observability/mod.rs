//! Observability subsystem.
//!
//! Structured JSON logging with typed events. Observability is read-only:
//! no side effects on execution, no async or background threads, and output
//! is deterministic so that identical merge runs log identical streams.
//!
//! ```ignore
//! use varigraph::observability::{Event, Logger};
//!
//! Logger::info(Event::MumApplied.as_str(), &[("len", "42"), ("version", "2")]);
//! ```

mod events;
mod logger;

pub use events::Event;
pub use logger::{Logger, Severity};
