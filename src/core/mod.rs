pub mod config;
pub mod driver;
pub mod markers;
pub mod message;
pub mod orchestrator;
pub mod segments;
pub mod session;
pub mod transcript;
pub mod typewriter;
