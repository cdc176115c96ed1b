//! Engine configuration and assembly

pub mod options;
pub mod state;
