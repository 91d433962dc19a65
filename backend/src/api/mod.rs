//! Shared HTTP plumbing for the API surface.

pub mod common;
