// Integration tests for grainsql

pub mod cli;
pub mod dialects;
pub mod helpers;
pub mod unit;
