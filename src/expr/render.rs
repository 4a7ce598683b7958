//! Stack-based SQL rendering.
//!
//! Nodes are visited in post-order: each node pops the text of its children
//! and pushes its own. Dialects only differ through [`RenderHooks`].

use super::{ArithOp, Expr, ExprKind, Literal};
use crate::model::{FromItem, Segment};
use crate::render::{escape_string, quote_ident, quote_qualified};
use chrono::NaiveDate;

pub trait RenderHooks {
    fn quote_names(&self) -> bool {
        true
    }

    fn bool_literal(&self, value: bool) -> String {
        if value { "true" } else { "false" }.to_string()
    }

    fn param_placeholder(&self, name: &str) -> String {
        format!("${}", name)
    }

    fn current_timestamp(&self) -> String {
        "GETDATE()".to_string()
    }

    fn date_literal(&self, date: NaiveDate) -> String {
        format!("'{}'", date.format("%Y%m%d"))
    }

    fn concat(&self, operands: &[String]) -> String {
        operands.join(" || ")
    }

    fn substring(&self, operand: &str, start: &str, length: &str) -> String {
        format!("SUBSTRING({} FROM {} FOR {})", operand, start, length)
    }

    fn view_name(&self, grain: &str, name: &str) -> String {
        quote_qualified(grain, name)
    }

    fn preamble(&self, grain: &str, name: &str) -> String {
        format!("create or replace view {} as", self.view_name(grain, name))
    }

    fn table_ref(&self, grain: &str, table: &str, alias: &str) -> String {
        format!("{} as {}", quote_qualified(grain, table), quote_ident(alias))
    }
}

/// Hooks with every default in place.
pub struct AnsiHooks;

impl RenderHooks for AnsiHooks {}

pub fn render(expr: &Expr, hooks: &dyn RenderHooks) -> String {
    let mut stack: Vec<String> = Vec::new();
    visit(expr, hooks, &mut stack);
    stack.pop().unwrap_or_default()
}

fn pop(stack: &mut Vec<String>, n: usize) -> Vec<String> {
    let at = stack.len().saturating_sub(n);
    stack.split_off(at)
}

fn visit(expr: &Expr, hooks: &dyn RenderHooks, stack: &mut Vec<String>) {
    let children = expr.children();
    for child in &children {
        visit(child, hooks, stack);
    }
    let mut parts = pop(stack, children.len()).into_iter();
    let mut next = || parts.next().unwrap_or_default();

    let text = match &expr.kind {
        ExprKind::Literal(Literal::Number(lexeme)) => lexeme.clone(),
        ExprKind::Literal(Literal::Text(text)) => escape_string(text),
        ExprKind::Literal(Literal::Bool(value)) => hooks.bool_literal(*value),
        ExprKind::Field(field) => {
            let alias = field
                .binding()
                .map(|b| b.alias.clone())
                .or_else(|| field.table.clone());
            let column = quote_if(hooks, &field.column);
            match alias {
                Some(alias) => format!("{}.{}", quote_if(hooks, &alias), column),
                None => column,
            }
        }
        ExprKind::Param(param) => hooks.param_placeholder(&param.name),
        ExprKind::GetDate => hooks.current_timestamp(),
        ExprKind::Date(date) => hooks.date_literal(*date),
        ExprKind::Neg(_) => format!("-{}", next()),
        ExprKind::Not(_) => format!("NOT {}", next()),
        ExprKind::Paren(_) => format!("({})", next()),
        ExprKind::IsNull(_) => format!("{} IS NULL", next()),
        ExprKind::Arith { op, operands } => {
            let rendered: Vec<String> = (0..operands.len()).map(|_| next()).collect();
            match op {
                ArithOp::Concat => hooks.concat(&rendered),
                _ => rendered.join(op.symbol()),
            }
        }
        ExprKind::Compare { op, .. } => {
            let left = next();
            format!("{}{}{}", left, op.symbol(), next())
        }
        ExprKind::Between { .. } => {
            let (operand, low) = (next(), next());
            format!("{} BETWEEN {} AND {}", operand, low, next())
        }
        ExprKind::In { items, .. } => {
            let operand = next();
            let rendered: Vec<String> = (0..items.len()).map(|_| next()).collect();
            format!("{} IN ({})", operand, rendered.join(", "))
        }
        ExprKind::Logic { op, operands } => {
            let rendered: Vec<String> = (0..operands.len()).map(|_| next()).collect();
            rendered.join(op.symbol())
        }
        ExprKind::Count => "COUNT(*)".to_string(),
        ExprKind::Sum(_) => format!("SUM({})", next()),
        ExprKind::Max(_) => format!("MAX({})", next()),
        ExprKind::Min(_) => format!("MIN({})", next()),
        ExprKind::Upper(_) => format!("UPPER({})", next()),
        ExprKind::Lower(_) => format!("LOWER({})", next()),
        ExprKind::Substring { .. } => {
            let (operand, start) = (next(), next());
            hooks.substring(&operand, &start, &next())
        }
    };
    stack.push(text);
}

fn quote_if(hooks: &dyn RenderHooks, name: &str) -> String {
    if hooks.quote_names() {
        quote_ident(name)
    } else {
        name.to_string()
    }
}

fn render_from(item: &FromItem, own_grain: &str, hooks: &dyn RenderHooks) -> String {
    hooks.table_ref(item.table.grain_or(own_grain), &item.table.table, &item.alias)
}

/// SELECT ... FROM ... [WHERE ...] [GROUP BY ...] of one segment.
pub fn render_segment(segment: &Segment, grain: &str, hooks: &dyn RenderHooks) -> String {
    let columns = segment
        .columns
        .iter()
        .map(|c| format!("{} as {}", render(&c.expr, hooks), quote_if(hooks, &c.alias)))
        .collect::<Vec<_>>()
        .join(", ");
    let distinct = if segment.distinct { "distinct " } else { "" };
    let mut sql = format!("  select {}{}\n  from ", distinct, columns);

    for (i, item) in segment.from.iter().enumerate() {
        if i > 0 {
            let kind = item.join.as_ref().map_or("INNER", |j| j.kind.keyword());
            sql.push_str(&format!("\n    {} join ", kind));
        }
        sql.push_str(&render_from(item, grain, hooks));
        if let (true, Some(join)) = (i > 0, &item.join) {
            sql.push_str(&format!(" on {}", render(&join.on, hooks)));
        }
    }

    if let Some(filter) = &segment.filter {
        sql.push_str(&format!("\n  where {}", render(filter, hooks)));
    }

    if !segment.group_by.is_empty() {
        let groups = segment
            .group_by
            .iter()
            .filter_map(|alias| segment.column(alias))
            .map(|c| render(&c.expr, hooks))
            .collect::<Vec<_>>()
            .join(", ");
        sql.push_str(&format!("\n  group by {}", groups));
    }
    sql
}

/// All segments joined with UNION ALL.
pub fn render_select(segments: &[Segment], grain: &str, hooks: &dyn RenderHooks) -> String {
    segments
        .iter()
        .map(|s| render_segment(s, grain, hooks))
        .collect::<Vec<_>>()
        .join("\nUNION ALL\n")
}

/// `create or replace view ... as` followed by the select.
pub fn render_view(grain: &str, name: &str, segments: &[Segment], hooks: &dyn RenderHooks) -> String {
    format!(
        "{}\n{}",
        hooks.preamble(grain, name),
        render_select(segments, grain, hooks)
    )
}
