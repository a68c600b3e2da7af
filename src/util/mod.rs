//! Utility modules: cancellation and timeouts.

pub mod cancel;
pub mod timeout;
