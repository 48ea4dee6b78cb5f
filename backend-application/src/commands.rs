pub mod scan_commands;
pub mod sync_commands;
