//! Deployment tracking and workspaces

pub mod tracker;
pub mod workspace;
