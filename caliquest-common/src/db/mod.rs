//! Database models and queries

pub mod completions;
pub mod init;
pub mod migrations;
pub mod models;
pub mod profiles;
pub mod settings;
pub mod units;

pub use init::*;
pub use migrations::*;
pub use models::*;
