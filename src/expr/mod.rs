//! Scalar expressions embedded in views.
//!
//! An [`Expr`] is built once, bound by the resolvers in [`resolve`], type
//! checked by [`typecheck`] and then only read: any dialect can render it
//! through [`render::render`] without touching the tree.

pub mod render;
pub mod resolve;
pub mod typecheck;
mod types;

pub use types::{ExprMeta, ExprType, TypeFamily};

use crate::model::Column;
use chrono::NaiveDate;
use once_cell::sync::OnceCell;
use serde::{Deserialize, Deserializer, Serialize};

#[derive(Debug, Clone, Serialize)]
#[serde(into = "ExprKind")]
pub struct Expr {
    pub kind: ExprKind,
    meta: OnceCell<ExprMeta>,
}

impl PartialEq for Expr {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind
    }
}

impl From<ExprKind> for Expr {
    fn from(kind: ExprKind) -> Self {
        Expr {
            kind,
            meta: OnceCell::new(),
        }
    }
}

/// Accepts the `{ variant: payload }` map form at every nesting level, which
/// YAML would otherwise only take as `!variant` tags.
impl<'de> Deserialize<'de> for Expr {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        serde_yaml::with::singleton_map_recursive::deserialize::<ExprKind, D>(deserializer)
            .map(Expr::from)
    }
}

impl From<Expr> for ExprKind {
    fn from(expr: Expr) -> Self {
        expr.kind
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExprKind {
    Literal(Literal),
    Field(FieldRef),
    Param(ParamRef),
    /// Current timestamp
    GetDate,
    Date(NaiveDate),
    Neg(Box<Expr>),
    Not(Box<Expr>),
    Paren(Box<Expr>),
    IsNull(Box<Expr>),
    Arith {
        op: ArithOp,
        operands: Vec<Expr>,
    },
    Compare {
        op: CompareOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Between {
        operand: Box<Expr>,
        low: Box<Expr>,
        high: Box<Expr>,
    },
    In {
        operand: Box<Expr>,
        items: Vec<Expr>,
    },
    Logic {
        op: LogicOp,
        operands: Vec<Expr>,
    },
    Count,
    Sum(Box<Expr>),
    Max(Box<Expr>),
    Min(Box<Expr>),
    Upper(Box<Expr>),
    Lower(Box<Expr>),
    Substring {
        operand: Box<Expr>,
        start: Box<Expr>,
        length: Box<Expr>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Literal {
    /// Numeric lexeme as written; integral unless it has a fraction or exponent
    Number(String),
    Text(String),
    Bool(bool),
}

impl Literal {
    pub fn is_integral(lexeme: &str) -> bool {
        !lexeme.contains(['.', 'e', 'E'])
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArithOp {
    Plus,
    Minus,
    Times,
    Over,
    Concat,
}

impl ArithOp {
    pub fn symbol(self) -> &'static str {
        match self {
            ArithOp::Plus => " + ",
            ArithOp::Minus => " - ",
            ArithOp::Times => " * ",
            ArithOp::Over => " / ",
            ArithOp::Concat => " || ",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompareOp {
    Gt,
    Lt,
    Ge,
    Le,
    Ne,
    Eq,
    Like,
}

impl CompareOp {
    pub fn symbol(self) -> &'static str {
        match self {
            CompareOp::Gt => " > ",
            CompareOp::Lt => " < ",
            CompareOp::Ge => " >= ",
            CompareOp::Le => " <= ",
            CompareOp::Ne => " <> ",
            CompareOp::Eq => " = ",
            CompareOp::Like => " LIKE ",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogicOp {
    And,
    Or,
}

impl LogicOp {
    pub fn symbol(self) -> &'static str {
        match self {
            LogicOp::And => " AND ",
            LogicOp::Or => " OR ",
        }
    }
}

/// Column reference, optionally qualified by a table alias.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldRef {
    #[serde(default)]
    pub table: Option<String>,
    pub column: String,
    #[serde(skip)]
    binding: OnceCell<FieldBinding>,
}

impl PartialEq for FieldRef {
    fn eq(&self, other: &Self) -> bool {
        self.table == other.table && self.column == other.column
    }
}

/// The concrete column a field reference resolved to.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldBinding {
    pub alias: String,
    pub grain: String,
    pub table: String,
    pub column: Column,
}

impl FieldRef {
    pub fn new(table: Option<&str>, column: &str) -> Self {
        Self {
            table: table.map(str::to_string),
            column: column.to_string(),
            binding: OnceCell::new(),
        }
    }

    pub fn binding(&self) -> Option<&FieldBinding> {
        self.binding.get()
    }

    /// Name as written in the view, used in messages.
    pub fn display_name(&self) -> String {
        match &self.table {
            Some(t) => format!("{}.{}", t, self.column),
            None => self.column.clone(),
        }
    }

    pub(crate) fn bind(&self, binding: FieldBinding) {
        // first binding wins; re-resolution of a shared view is a no-op
        let _ = self.binding.set(binding);
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParamRef {
    pub name: String,
    #[serde(skip)]
    binding: OnceCell<ExprType>,
}

impl PartialEq for ParamRef {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl ParamRef {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            binding: OnceCell::new(),
        }
    }

    pub fn binding(&self) -> Option<ExprType> {
        self.binding.get().copied()
    }

    pub(crate) fn bind(&self, ty: ExprType) {
        let _ = self.binding.set(ty);
    }
}

impl Expr {
    pub fn new(kind: ExprKind) -> Self {
        kind.into()
    }

    pub fn int(value: i64) -> Self {
        ExprKind::Literal(Literal::Number(value.to_string())).into()
    }

    pub fn number(lexeme: &str) -> Self {
        ExprKind::Literal(Literal::Number(lexeme.to_string())).into()
    }

    pub fn text(value: &str) -> Self {
        ExprKind::Literal(Literal::Text(value.to_string())).into()
    }

    pub fn bool(value: bool) -> Self {
        ExprKind::Literal(Literal::Bool(value)).into()
    }

    pub fn field(table: &str, column: &str) -> Self {
        ExprKind::Field(FieldRef::new(Some(table), column)).into()
    }

    pub fn column(column: &str) -> Self {
        ExprKind::Field(FieldRef::new(None, column)).into()
    }

    pub fn param(name: &str) -> Self {
        ExprKind::Param(ParamRef::new(name)).into()
    }

    pub fn compare(op: CompareOp, left: Expr, right: Expr) -> Self {
        ExprKind::Compare {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
        .into()
    }

    pub fn arith(op: ArithOp, operands: Vec<Expr>) -> Self {
        ExprKind::Arith { op, operands }.into()
    }

    pub fn logic(op: LogicOp, operands: Vec<Expr>) -> Self {
        ExprKind::Logic { op, operands }.into()
    }

    pub fn count() -> Self {
        ExprKind::Count.into()
    }

    pub fn sum(operand: Expr) -> Self {
        ExprKind::Sum(Box::new(operand)).into()
    }

    pub fn is_aggregate(&self) -> bool {
        matches!(
            self.kind,
            ExprKind::Count | ExprKind::Sum(_) | ExprKind::Max(_) | ExprKind::Min(_)
        )
    }

    /// The bound column when this expression is a plain field reference.
    pub fn field_binding(&self) -> Option<&FieldBinding> {
        match &self.kind {
            ExprKind::Field(f) => f.binding(),
            _ => None,
        }
    }

    /// Direct children in evaluation order.
    pub fn children(&self) -> Vec<&Expr> {
        match &self.kind {
            ExprKind::Literal(_)
            | ExprKind::Field(_)
            | ExprKind::Param(_)
            | ExprKind::GetDate
            | ExprKind::Date(_)
            | ExprKind::Count => vec![],
            ExprKind::Neg(e)
            | ExprKind::Not(e)
            | ExprKind::Paren(e)
            | ExprKind::IsNull(e)
            | ExprKind::Sum(e)
            | ExprKind::Max(e)
            | ExprKind::Min(e)
            | ExprKind::Upper(e)
            | ExprKind::Lower(e) => vec![e.as_ref()],
            ExprKind::Arith { operands, .. } | ExprKind::Logic { operands, .. } => {
                operands.iter().collect()
            }
            ExprKind::Compare { left, right, .. } => vec![left.as_ref(), right.as_ref()],
            ExprKind::Between { operand, low, high } => {
                vec![operand.as_ref(), low.as_ref(), high.as_ref()]
            }
            ExprKind::In { operand, items } => {
                std::iter::once(operand.as_ref()).chain(items.iter()).collect()
            }
            ExprKind::Substring {
                operand,
                start,
                length,
            } => vec![operand.as_ref(), start.as_ref(), length.as_ref()],
        }
    }

    /// Post-order traversal: every child is visited before its parent.
    pub fn walk<E>(&self, f: &mut impl FnMut(&Expr) -> Result<(), E>) -> Result<(), E> {
        for child in self.children() {
            child.walk(f)?;
        }
        f(self)
    }
}
