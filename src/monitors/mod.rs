//! Pure monitoring logic
//!
//! Everything in this module is side-effect free: fingerprinting normalizes
//! and hashes response bodies, the status module turns probe outcomes into
//! state transitions and alerts. Network I/O lives in [`crate::probe`],
//! persistence in [`crate::storage`].

pub mod fingerprint;
pub mod status;
