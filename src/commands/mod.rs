pub mod check;
pub mod checksum;
pub mod generate;

// Re-export all command functions
pub use check::cmd_check;
pub use checksum::cmd_checksum;
pub use generate::cmd_generate;
