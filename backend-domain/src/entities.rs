// Domain entities

pub mod config;
pub mod progress;
pub mod scan;

pub use config::*;
pub use progress::*;
pub use scan::*;
