//! Column type mapping: one definer per (dialect, column variant).
//!
//! A definer produces the native type, the column definition without its
//! default, the default clause alone, and the full definition used by
//! CREATE TABLE / ADD COLUMN. The [`ColumnTypeMapper`] is built once per
//! session and never changes afterwards.

mod firebird;
mod h2;
mod mssql;
mod oracle;
mod postgres;

pub use mssql::default_constraint_name;
pub use oracle::boolean_check_name;

use crate::dialect::Dialect;
use crate::error::GenerationError;
use crate::model::{Column, ColumnVariant};
use std::collections::HashMap;

pub const DEFAULT: &str = "default ";

/// A column together with the names of its owning grain and table.
#[derive(Debug, Clone, Copy)]
pub struct ColumnContext<'a> {
    pub grain: &'a str,
    pub table: &'a str,
    pub column: &'a Column,
}

impl<'a> ColumnContext<'a> {
    pub fn new(grain: &'a str, table: &'a str, column: &'a Column) -> Self {
        Self {
            grain,
            table,
            column,
        }
    }
}

pub trait ColumnDefiner: Send + Sync {
    /// Bare native type keyword.
    fn db_field_type(&self) -> &'static str;

    /// Native type with length, precision and scale filled in.
    fn column_type(&self, column: &Column) -> String {
        let _ = column;
        self.db_field_type().to_string()
    }

    /// `default ...` clause, empty when the column has no default.
    fn default_definition(&self, ctx: &ColumnContext) -> String;

    fn nullable(&self, ctx: &ColumnContext) -> &'static str {
        if ctx.column.nullable { "null" } else { "not null" }
    }

    /// Name, type and nullability without the default.
    fn main_definition(&self, ctx: &ColumnContext) -> String {
        join(&[
            &ctx.column.quoted_name(),
            &self.column_type(ctx.column),
            self.nullable(ctx),
        ])
    }

    fn full_definition(&self, ctx: &ColumnContext) -> String {
        join(&[&self.main_definition(ctx), &self.default_definition(ctx)])
    }

    /// Default clause without constraint naming; differs only where the
    /// dialect names its default constraints.
    fn light_default_definition(&self, ctx: &ColumnContext) -> String {
        self.default_definition(ctx)
    }
}

/// Joins the non-empty parts with single spaces.
pub fn join(parts: &[&str]) -> String {
    parts
        .iter()
        .filter(|p| !p.is_empty())
        .copied()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Immutable (variant -> definer) table for one dialect.
pub struct ColumnTypeMapper {
    dialect: Dialect,
    definers: HashMap<ColumnVariant, Box<dyn ColumnDefiner>>,
}

impl ColumnTypeMapper {
    pub fn new(dialect: Dialect) -> Self {
        let definers = ColumnVariant::ALL
            .iter()
            .map(|&variant| {
                let definer: Box<dyn ColumnDefiner> = match dialect {
                    Dialect::H2 => Box::new(h2::H2Definer(variant)),
                    Dialect::Postgres => Box::new(postgres::PostgresDefiner(variant)),
                    Dialect::MsSql => Box::new(mssql::MsSqlDefiner(variant)),
                    Dialect::Oracle => Box::new(oracle::OracleDefiner(variant)),
                    Dialect::Firebird => Box::new(firebird::FirebirdDefiner(variant)),
                };
                (variant, definer)
            })
            .collect();
        Self { dialect, definers }
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    pub fn definer(&self, variant: ColumnVariant) -> Result<&dyn ColumnDefiner, GenerationError> {
        self.definers
            .get(&variant)
            .map(|d| d.as_ref())
            .ok_or_else(|| GenerationError::Unsupported {
                dialect: self.dialect,
                construct: format!("column type {}", variant),
                element: String::new(),
            })
    }

    pub fn definer_for(&self, column: &Column) -> Result<&dyn ColumnDefiner, GenerationError> {
        self.definer(column.variant())
    }

    pub fn full_definition(&self, ctx: &ColumnContext) -> Result<String, GenerationError> {
        Ok(self.definer_for(ctx.column)?.full_definition(ctx))
    }

    pub fn main_definition(&self, ctx: &ColumnContext) -> Result<String, GenerationError> {
        Ok(self.definer_for(ctx.column)?.main_definition(ctx))
    }

    pub fn default_definition(&self, ctx: &ColumnContext) -> Result<String, GenerationError> {
        Ok(self.definer_for(ctx.column)?.default_definition(ctx))
    }

    pub fn db_field_type(&self, variant: ColumnVariant) -> Result<&'static str, GenerationError> {
        Ok(self.definer(variant)?.db_field_type())
    }

    pub fn column_type(&self, column: &Column) -> Result<String, GenerationError> {
        Ok(self.definer_for(column)?.column_type(column))
    }
}
