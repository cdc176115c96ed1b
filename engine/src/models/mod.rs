//! Engine models

pub mod content;
pub mod deployment;
pub mod event;
pub mod site;
