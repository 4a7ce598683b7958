use super::table::TableRef;
use crate::checksum::calculate_checksum;
use crate::expr::{Expr, ExprType};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JoinKind {
    Inner,
    Left,
    Right,
}

impl JoinKind {
    pub fn keyword(self) -> &'static str {
        match self {
            JoinKind::Inner => "INNER",
            JoinKind::Left => "LEFT",
            JoinKind::Right => "RIGHT",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Join {
    pub kind: JoinKind,
    pub on: Expr,
}

/// A table in a segment's FROM list; every table after the first is joined.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FromItem {
    pub alias: String,
    #[serde(flatten)]
    pub table: TableRef,
    #[serde(default)]
    pub join: Option<Join>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewColumn {
    pub alias: String,
    pub expr: Expr,
}

/// One SELECT of a view; segments are combined with UNION ALL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    #[serde(default)]
    pub distinct: bool,
    pub columns: Vec<ViewColumn>,
    pub from: Vec<FromItem>,
    #[serde(default)]
    pub filter: Option<Expr>,
    /// Aliases of projected columns to group by
    #[serde(default)]
    pub group_by: Vec<String>,
}

impl Segment {
    pub fn column(&self, alias: &str) -> Option<&ViewColumn> {
        self.columns.iter().find(|c| c.alias == alias)
    }

    pub fn is_group_by(&self, alias: &str) -> bool {
        self.group_by.iter().any(|g| g == alias)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct View {
    pub name: String,
    pub segments: Vec<Segment>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewParam {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: ExprType,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterizedView {
    pub name: String,
    pub parameters: Vec<ViewParam>,
    pub segments: Vec<Segment>,
}

/// Aggregate table kept up to date by triggers on its source table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaterializedView {
    pub name: String,
    pub segments: Vec<Segment>,
}

impl MaterializedView {
    /// The single segment a materialized view is made of.
    pub fn segment(&self) -> Option<&Segment> {
        self.segments.first()
    }

    /// The aggregated base table.
    pub fn source(&self) -> Option<&FromItem> {
        self.segment().and_then(|s| s.from.first())
    }

    /// MD5 of the serialized definition; trigger bodies embed it so a
    /// changed view can be detected without parsing the trigger.
    pub fn checksum(&self) -> String {
        let serialized = serde_json::to_string(self).unwrap_or_else(|_| format!("{:?}", self));
        calculate_checksum(&serialized)
    }
}

/// Column name and type of a view's result set, from the first segment.
pub fn result_columns(segments: &[Segment]) -> Vec<(&str, &Expr)> {
    segments
        .first()
        .map(|s| s.columns.iter().map(|c| (c.alias.as_str(), &c.expr)).collect())
        .unwrap_or_default()
}
