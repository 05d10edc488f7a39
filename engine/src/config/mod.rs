//! Engine configuration

pub mod options;
pub mod settings;
