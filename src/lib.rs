pub mod config;
pub mod errors;
pub mod index;
pub mod linker;
pub mod messages;
pub mod resolution;
pub mod session;
pub mod store;
pub mod types;
