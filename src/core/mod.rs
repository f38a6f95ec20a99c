//! Core types shared across the crate.
//!
//! The error system ([`MdflowError`], the [`ErrorContext`] display
//! wrapper, and the [`user_friendly_error`] classifier used once at the
//! top of `main`) plus the cooperative cancellation primitive shared by
//! the resolver and the driver spawn.

pub mod cancel;
pub mod error;

pub use cancel::{CancelHandle, CancelToken};
pub use error::{user_friendly_error, ErrorContext, MdflowError};
