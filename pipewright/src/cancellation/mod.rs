//! Cooperative cancellation.
//!
//! The scheduler holds a [`CancellationToken`] shared with the run context;
//! cancelling it interrupts the current job wait, which stops the backend job
//! before the pipeline transitions to `Failed`.

mod token;

pub use token::{CancelCallback, CancellationToken};
