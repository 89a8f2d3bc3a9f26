//! State module for tracking crawl progress
//!
//! Every target the scheduler dispatches walks the `TargetState` machine:
//! `Queued -> Dispatched -> {Succeeded, Retrying, Failed}`, with `Retrying`
//! returning to `Dispatched` until the retry budget is spent.

mod target_state;

pub use target_state::TargetState;
