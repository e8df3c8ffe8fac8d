//! HTTP handlers, one submodule per resource.
//!
//! Handlers stay thin: extract, apply the method-stage policy from [`crate::policy`],
//! call the repository, shape the response. Failures travel as [`crate::error::ApiError`].

pub mod posts;
pub mod users;
