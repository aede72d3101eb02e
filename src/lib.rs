pub mod config;
pub mod error;
pub mod node;
pub mod orchestrator;
pub mod scheduler;
pub mod shutdown;
pub mod store;
pub mod tracker;
pub mod worker;
