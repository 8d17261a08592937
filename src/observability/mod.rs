//! Observability module providing structured logging.
//!
//! Log output goes to stderr so command results on stdout stay machine-readable.

mod tracing_init;

pub use tracing_init::*;
