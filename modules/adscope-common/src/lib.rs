pub mod config;
pub mod identity;
pub mod types;
pub mod urls;

pub use config::Config;
pub use types::*;
