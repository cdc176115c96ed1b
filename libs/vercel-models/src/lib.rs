//! Vercel API wire models
//!
//! Request and response bodies for the subset of the Vercel REST API used by
//! the docsite engine.

pub mod models;

pub use models::*;
