// Repository and Orchestrator Port Traits (Interfaces)
// Define what the domain needs from infrastructure

pub mod orchestrator;
pub mod repositories;

pub use orchestrator::*;
pub use repositories::*;
