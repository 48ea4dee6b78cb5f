pub mod orchestrator_http;
pub mod sync_scheduler;

pub use orchestrator_http::*;
pub use sync_scheduler::*;
