//! Remote fetcher for the spreadsheet-backed competition endpoints.
//!
//! This module provides the `ApiClient` for retrieving competition
//! catalogues and result sheets. Each category is served by its own
//! endpoint; endpoints answer by invoking a named callback rather than with
//! a plain JSON body, so every call registers a single-use callback token
//! and waits for it under a deadline.
//!
//! A static JSON mirror can stand in for the live endpoints; mirror
//! requests are plain GETs retried with linear backoff.

pub mod callback;
pub mod client;
pub mod error;
pub mod source;

pub use callback::{CallbackPayload, CallbackRegistry};
pub use client::{ApiClient, CategoryFetch};
pub use error::ApiError;
pub use source::CompetitionSource;
