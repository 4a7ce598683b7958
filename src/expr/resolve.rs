use super::{Expr, ExprKind, ExprType, FieldBinding};
use crate::error::ModelError;
use crate::model::Table;
use std::collections::BTreeSet;

/// A table visible to a view segment under an alias.
#[derive(Debug, Clone, Copy)]
pub struct SourceTable<'a> {
    pub alias: &'a str,
    pub grain: &'a str,
    pub table: &'a Table,
}

/// Binds field references to exactly one visible column.
pub struct FieldResolver<'a> {
    sources: Vec<SourceTable<'a>>,
}

impl<'a> FieldResolver<'a> {
    pub fn new(sources: Vec<SourceTable<'a>>) -> Self {
        Self { sources }
    }

    pub fn resolve(&self, expr: &Expr) -> Result<(), ModelError> {
        expr.walk(&mut |node| {
            if let ExprKind::Field(field) = &node.kind {
                if field.binding().is_some() {
                    return Ok(());
                }
                let candidates: Vec<&SourceTable<'a>> = self
                    .sources
                    .iter()
                    .filter(|s| field.table.as_deref().is_none_or(|alias| alias == s.alias))
                    .filter(|s| s.table.column(&field.column).is_some())
                    .collect();
                match candidates.as_slice() {
                    [] => return Err(ModelError::UnresolvedField(field.display_name())),
                    [source] => {
                        if let Some(column) = source.table.column(&field.column) {
                            field.bind(FieldBinding {
                                alias: source.alias.to_string(),
                                grain: source.grain.to_string(),
                                table: source.table.name.clone(),
                                column: column.clone(),
                            });
                        }
                    }
                    _ => return Err(ModelError::AmbiguousField(field.display_name())),
                }
            }
            Ok(())
        })
    }
}

/// Declared parameter of a parameterized view.
#[derive(Debug, Clone, Copy)]
pub struct DeclaredParam<'a> {
    pub name: &'a str,
    pub ty: ExprType,
}

/// Binds parameter references and records which declared parameters are
/// used, in order of first use.
pub struct ParameterResolver<'a> {
    declared: Vec<DeclaredParam<'a>>,
    used: BTreeSet<String>,
    usage_order: Vec<String>,
}

impl<'a> ParameterResolver<'a> {
    pub fn new(declared: Vec<DeclaredParam<'a>>) -> Self {
        Self {
            declared,
            used: BTreeSet::new(),
            usage_order: Vec::new(),
        }
    }

    pub fn resolve(&mut self, expr: &Expr) -> Result<(), ModelError> {
        expr.walk(&mut |node| {
            if let ExprKind::Param(param) = &node.kind {
                let declared = self
                    .declared
                    .iter()
                    .find(|p| p.name == param.name)
                    .ok_or_else(|| ModelError::UnresolvedParameter(param.name.clone()))?;
                param.bind(declared.ty);
                self.usage_order.push(param.name.clone());
                self.used.insert(param.name.clone());
            }
            Ok(())
        })
    }

    /// Declared parameters never referenced, in declaration order.
    pub fn unused(&self) -> Vec<&str> {
        self.declared
            .iter()
            .map(|p| p.name)
            .filter(|name| !self.used.contains(*name))
            .collect()
    }

    /// Every parameter occurrence in rendering order; positional
    /// placeholders are bound in this order.
    pub fn usage_order(&self) -> &[String] {
        &self.usage_order
    }
}
