//! Shared plumbing for outbound provider calls.

pub mod client;
