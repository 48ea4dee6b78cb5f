pub mod sqlite_scans;

pub use sqlite_scans::*;
