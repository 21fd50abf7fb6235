//! EventBus - broadcast-based delivery of `ChangeEvent`s emitted by the
//! Talk store.
//!
//! Publishes a `ChangeEvent` on every Talk mutation so HTTP long-poll
//! callers, internal reconcilers, and background jobs can react without
//! re-reading the store on a timer.

/// Core event bus implementation (broadcast channel).
pub mod bus;

pub use bus::EventBus;

#[cfg(test)]
mod tests;
