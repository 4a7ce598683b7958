//! Shape of a materialized view as the trigger generators see it: the
//! aggregate table, its group and aggregate columns, and the SQL fragments
//! every dialect assembles its maintenance triggers from.

use super::DdlStrategy;
use crate::constants::SURROGATE_COUNT;
use crate::error::ModelError;
use crate::expr::ExprKind;
use crate::model::naming::limit_name;
use crate::model::{Column, ColumnKind, ColumnVariant, Grain, MaterializedView, Table, TableKind};
use crate::registry::{TriggerKind, TriggerQuery};
use crate::render::quote_ident;
use itertools::Itertools;

#[derive(Debug, Clone, Copy)]
pub enum MvColumnKind<'a> {
    /// Group key projecting the source column
    Group(&'a Column),
    Count,
    Sum(&'a Column),
}

#[derive(Debug, Clone, Copy)]
pub struct MvColumn<'a> {
    pub alias: &'a str,
    pub kind: MvColumnKind<'a>,
}

impl MvColumn<'_> {
    pub fn quoted(&self) -> String {
        quote_ident(self.alias)
    }
}

#[derive(Debug, Clone)]
pub struct MvShape<'a> {
    pub grain: &'a str,
    pub view: &'a MaterializedView,
    /// Source table the view aggregates
    pub table: &'a Table,
    pub columns: Vec<MvColumn<'a>>,
}

impl<'a> MvShape<'a> {
    pub fn new(grain: &'a Grain, view: &'a MaterializedView) -> Result<Self, ModelError> {
        let fail = |reason: String| ModelError::MaterializedView {
            view: view.name.clone(),
            reason,
        };
        let segment = view
            .segment()
            .ok_or_else(|| fail("no select segment".to_string()))?;
        let source = view
            .source()
            .ok_or_else(|| fail("no source table".to_string()))?;
        let table = grain
            .table(&source.table.table)
            .ok_or_else(|| fail(format!("unknown source table '{}'", source.table.table)))?;
        let source_column = |name: &str| {
            table
                .column(name)
                .ok_or_else(|| fail(format!("unknown column '{}'", name)))
        };

        let mut columns = Vec::new();
        for column in &segment.columns {
            let kind = match &column.expr.kind {
                ExprKind::Count => MvColumnKind::Count,
                ExprKind::Sum(inner) => match &inner.kind {
                    ExprKind::Field(field) => MvColumnKind::Sum(source_column(&field.column)?),
                    _ => return Err(fail("SUM must aggregate a plain column".to_string())),
                },
                ExprKind::Field(field) => MvColumnKind::Group(source_column(&field.column)?),
                _ => {
                    return Err(fail(format!(
                        "unsupported expression in column '{}'",
                        column.alias
                    )));
                }
            };
            columns.push(MvColumn {
                alias: &column.alias,
                kind,
            });
        }
        Ok(Self {
            grain: &grain.name,
            view,
            table,
            columns,
        })
    }

    /// Group key columns with their source columns.
    pub fn groups(&self) -> impl Iterator<Item = (&'a str, &'a Column)> + '_ {
        self.columns.iter().filter_map(|c| match c.kind {
            MvColumnKind::Group(column) => Some((c.alias, column)),
            _ => None,
        })
    }

    pub fn aggregates(&self) -> impl Iterator<Item = &MvColumn<'a>> + '_ {
        self.columns
            .iter()
            .filter(|c| !matches!(c.kind, MvColumnKind::Group(_)))
    }

    pub fn trigger_name(&self, kind: TriggerKind) -> String {
        let action = match kind {
            TriggerKind::PreInsert | TriggerKind::PostInsert => "Insert",
            TriggerKind::PreUpdate | TriggerKind::PostUpdate => "Update",
            TriggerKind::PreDelete | TriggerKind::PostDelete => "Delete",
        };
        limit_name(&format!(
            "mv{}From{}_{}To{}_{}",
            action, self.grain, self.table.name, self.grain, self.view.name
        ))
    }

    pub fn trigger_query(&self, kind: TriggerKind) -> TriggerQuery {
        TriggerQuery::new(self.grain, &self.table.name, self.trigger_name(kind)).with_kind(kind)
    }

    /// The aggregate table: group keys form the primary key, COUNT and SUM
    /// columns follow, then the surrogate row counter.
    pub fn table_definition(&self) -> Table {
        let mut columns: Vec<Column> = self
            .columns
            .iter()
            .map(|c| match c.kind {
                MvColumnKind::Group(source) => {
                    let mut column = source.clone();
                    column.name = c.alias.to_string();
                    column.nullable = false;
                    if let ColumnKind::Integer { sequence, .. } = &mut column.kind {
                        *sequence = None;
                    }
                    column
                }
                MvColumnKind::Count => Column::integer(c.alias).not_null(),
                MvColumnKind::Sum(source) => Column::new(c.alias, sum_kind(source)),
            })
            .collect();
        columns.push(
            Column::new(
                SURROGATE_COUNT,
                ColumnKind::Integer {
                    default: Some(0),
                    sequence: None,
                },
            )
            .not_null(),
        );
        Table {
            name: self.view.name.clone(),
            kind: TableKind::ReadWrite { versioned: false },
            columns,
            primary_key: self.groups().map(|(alias, _)| alias.to_string()).collect(),
            pk_name: None,
            indices: vec![],
            foreign_keys: vec![],
        }
    }

    /// Quoted column list of the aggregate table, surrogate count last.
    pub fn insert_columns(&self) -> String {
        self.columns
            .iter()
            .map(MvColumn::quoted)
            .chain(std::iter::once(quote_ident(SURROGATE_COUNT)))
            .join(", ")
    }

    /// `<target>"key" = <value>` for every group key, joined with AND.
    pub fn row_condition(&self, target: &str, value: impl Fn(&str, &Column) -> String) -> String {
        self.groups()
            .map(|(alias, column)| format!("{}{} = {}", target, quote_ident(alias), value(alias, column)))
            .join(" AND ")
    }

    /// `"agg" = <current>"agg" <op> <delta>` for every aggregate and the
    /// surrogate count.
    pub fn set_clause(
        &self,
        current: &str,
        op: &str,
        delta: impl Fn(&MvColumn) -> String,
        surrogate: &str,
    ) -> String {
        let surrogate_count = quote_ident(SURROGATE_COUNT);
        self.aggregates()
            .map(|c| {
                let name = c.quoted();
                format!("{} = {}{} {} {}", name, current, name, op, delta(c))
            })
            .chain(std::iter::once(format!(
                "{} = {}{} {} {}",
                surrogate_count, current, surrogate_count, op, surrogate
            )))
            .join(", ")
    }

    /// Values matching [`MvShape::insert_columns`].
    pub fn insert_values(
        &self,
        group: impl Fn(&str, &Column) -> String,
        delta: impl Fn(&MvColumn) -> String,
        surrogate: &str,
    ) -> String {
        self.columns
            .iter()
            .map(|c| match c.kind {
                MvColumnKind::Group(column) => group(c.alias, column),
                _ => delta(c),
            })
            .chain(std::iter::once(surrogate.to_string()))
            .join(", ")
    }
}

fn sum_kind(source: &Column) -> ColumnKind {
    match &source.kind {
        ColumnKind::Decimal {
            precision, scale, ..
        } => ColumnKind::Decimal {
            precision: *precision,
            scale: *scale,
            default: None,
        },
        _ if source.variant() == ColumnVariant::Floating => ColumnKind::Floating { default: None },
        _ => ColumnKind::Integer {
            default: None,
            sequence: None,
        },
    }
}

/// Values of one changed row, as seen from a trigger body.
pub struct RowValues<'s> {
    /// Row reference such as `NEW`, `:old` or `inserted`
    pub row: &'s str,
    pub strategy: &'s dyn DdlStrategy,
}

impl<'s> RowValues<'s> {
    pub fn new(row: &'s str, strategy: &'s dyn DdlStrategy) -> Self {
        Self { row, strategy }
    }

    pub fn field(&self, column: &Column) -> String {
        format!("{}.{}", self.row, column.quoted_name())
    }

    /// Group key value; dates group by day.
    pub fn group(&self, column: &Column) -> String {
        let field = self.field(column);
        if column.variant() == ColumnVariant::DateTime {
            self.strategy.trunc_date(&field)
        } else {
            field
        }
    }

    /// Contribution of the row to an aggregate column.
    pub fn delta(&self, column: &MvColumn) -> String {
        match column.kind {
            MvColumnKind::Sum(source) => self.field(source),
            _ => "1".to_string(),
        }
    }
}
