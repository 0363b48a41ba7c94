pub mod config;
pub mod shared;
pub mod tickets;
pub mod workflow;
