//! State shared across threads
//!
//! The streaming loop itself is single-threaded; the only things other threads
//! touch are the stop signal (set from the Ctrl+C handler) and the runtime
//! counters the loop publishes after every frame.

pub mod state;

pub use state::{RuntimeState, SharedRuntime, StopSignal};
