//! Docsite Engine Library
//!
//! Build/deploy orchestration for documentation sites: generated files are
//! committed to a hosted repository and deployed to Vercel, with progress
//! persisted on the site record and broadcast to live observers.

pub mod app;
pub mod deploy;
pub mod errors;
pub mod filesys;
pub mod http;
pub mod logs;
pub mod models;
pub mod pipeline;
pub mod services;
pub mod storage;
pub mod utils;
