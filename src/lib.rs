//! Multi-dialect DDL and trigger generator for grain-based schemas.
//!
//! A [`model::Score`] of grains is validated and type checked once, then a
//! [`ddl::DdlGenerator`] turns its elements into dialect-native statements
//! that a [`migrate::Migrator`] feeds to a statement sink.

pub mod catalog;
pub mod checksum;
pub mod column;
pub mod commands;
pub mod config;
pub mod constants;
pub mod ddl;
pub mod dialect;
pub mod error;
pub mod expr;
pub mod migrate;
pub mod model;
pub mod registry;
pub mod render;
