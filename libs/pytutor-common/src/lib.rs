pub mod config;
pub mod curriculum;
pub mod types;
