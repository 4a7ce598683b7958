use super::{ArithOp, CompareOp, Expr, ExprKind, ExprMeta, ExprType, Literal, TypeFamily};
use crate::error::ModelError;

impl Expr {
    /// Type and nullability, computed bottom-up on first call and memoized.
    pub fn meta(&self) -> Result<&ExprMeta, ModelError> {
        self.meta.get_or_try_init(|| infer(self))
    }

    pub fn expr_type(&self) -> Result<ExprType, ModelError> {
        Ok(self.meta()?.ty)
    }

    /// Checks the whole tree; the first offending node is reported.
    pub fn check(&self) -> Result<ExprMeta, ModelError> {
        self.meta().copied()
    }

    /// Checks the expression is usable as a WHERE / ON condition.
    pub fn check_condition(&self, context: &str) -> Result<(), ModelError> {
        expect_type(self, ExprType::Logic, context)
    }
}

fn expect_type(expr: &Expr, ty: ExprType, context: &str) -> Result<(), ModelError> {
    let found = expr.expr_type()?;
    if found == ty {
        Ok(())
    } else {
        Err(ModelError::type_mismatch(context, ty.to_string(), found))
    }
}

fn expect_numeric(expr: &Expr, context: &str) -> Result<ExprMeta, ModelError> {
    let meta = *expr.meta()?;
    if meta.ty.is_numeric() {
        Ok(meta)
    } else {
        Err(ModelError::type_mismatch(context, "numeric", meta.ty))
    }
}

/// `operand` must belong to one of the ordered families, and `others` to
/// that same family.
fn expect_same_family(operand: &Expr, others: &[&Expr], context: &str) -> Result<bool, ModelError> {
    let lead = *operand.meta()?;
    let family = lead.ty.family();
    if family == TypeFamily::Other {
        return Err(ModelError::type_mismatch(
            context,
            "DATE, numeric or TEXT",
            lead.ty,
        ));
    }
    let mut nullable = lead.nullable;
    for other in others {
        let meta = other.meta()?;
        if meta.ty.family() != family {
            return Err(ModelError::type_mismatch(context, lead.ty.to_string(), meta.ty));
        }
        nullable |= meta.nullable;
    }
    Ok(nullable)
}

fn any_nullable(operands: &[&Expr]) -> Result<bool, ModelError> {
    let mut nullable = false;
    for operand in operands {
        nullable |= operand.meta()?.nullable;
    }
    Ok(nullable)
}

fn infer(expr: &Expr) -> Result<ExprMeta, ModelError> {
    match &expr.kind {
        ExprKind::Literal(Literal::Number(lexeme)) => {
            if lexeme.parse::<f64>().is_err() {
                return Err(ModelError::type_mismatch("numeric literal", "number", lexeme));
            }
            let ty = if Literal::is_integral(lexeme) {
                ExprType::Int
            } else {
                ExprType::Real
            };
            Ok(ExprMeta::not_null(ty))
        }
        ExprKind::Literal(Literal::Text(_)) => Ok(ExprMeta::not_null(ExprType::Text)),
        ExprKind::Literal(Literal::Bool(_)) => Ok(ExprMeta::not_null(ExprType::Bit)),
        ExprKind::Field(field) => field
            .binding()
            .map(|b| ExprMeta::new(b.column.expr_type(), b.column.nullable))
            .ok_or_else(|| ModelError::UnresolvedField(field.display_name())),
        ExprKind::Param(param) => param
            .binding()
            .map(|ty| ExprMeta::new(ty, true))
            .ok_or_else(|| ModelError::UnresolvedParameter(param.name.clone())),
        ExprKind::GetDate | ExprKind::Date(_) => Ok(ExprMeta::not_null(ExprType::Date)),
        ExprKind::Neg(e) => expect_numeric(e, "unary minus"),
        ExprKind::Paren(e) => e.check(),
        ExprKind::Not(e) => {
            expect_type(e, ExprType::Logic, "NOT")?;
            Ok(*e.meta()?)
        }
        ExprKind::IsNull(e) => {
            let meta = e.meta()?;
            if meta.ty == ExprType::Logic {
                return Err(ModelError::type_mismatch("IS NULL", "a value", meta.ty));
            }
            Ok(ExprMeta::not_null(ExprType::Logic))
        }
        ExprKind::Arith { op, operands } => infer_arith(*op, operands),
        ExprKind::Compare { op, left, right } => infer_compare(*op, left, right),
        ExprKind::Between { operand, low, high } => {
            let nullable = expect_same_family(operand, &[low.as_ref(), high.as_ref()], "BETWEEN")?;
            Ok(ExprMeta::new(ExprType::Logic, nullable))
        }
        ExprKind::In { operand, items } => {
            let others: Vec<&Expr> = items.iter().collect();
            let nullable = expect_same_family(operand, &others, "IN")?;
            Ok(ExprMeta::new(ExprType::Logic, nullable))
        }
        ExprKind::Logic { op, operands } => {
            let context = op.symbol().trim();
            for operand in operands {
                expect_type(operand, ExprType::Logic, context)?;
            }
            let refs: Vec<&Expr> = operands.iter().collect();
            Ok(ExprMeta::new(ExprType::Logic, any_nullable(&refs)?))
        }
        ExprKind::Count => Ok(ExprMeta::not_null(ExprType::Int)),
        ExprKind::Sum(e) => {
            let meta = expect_numeric(e, "SUM")?;
            Ok(ExprMeta::new(meta.ty, true))
        }
        ExprKind::Max(e) | ExprKind::Min(e) => {
            let meta = e.meta()?;
            if meta.ty == ExprType::Logic {
                return Err(ModelError::type_mismatch("MAX/MIN", "a value", meta.ty));
            }
            Ok(ExprMeta::new(meta.ty, true))
        }
        ExprKind::Upper(e) | ExprKind::Lower(e) => {
            expect_type(e, ExprType::Text, "UPPER/LOWER")?;
            Ok(*e.meta()?)
        }
        ExprKind::Substring {
            operand,
            start,
            length,
        } => {
            expect_type(operand, ExprType::Text, "SUBSTRING")?;
            expect_type(start, ExprType::Int, "SUBSTRING start")?;
            expect_type(length, ExprType::Int, "SUBSTRING length")?;
            let nullable = any_nullable(&[operand.as_ref(), start.as_ref(), length.as_ref()])?;
            Ok(ExprMeta::new(ExprType::Text, nullable))
        }
    }
}

fn infer_arith(op: ArithOp, operands: &[Expr]) -> Result<ExprMeta, ModelError> {
    let context = op.symbol().trim();
    let mut result: Option<ExprType> = None;
    let mut nullable = false;
    for operand in operands {
        let meta = *operand.meta()?;
        nullable |= meta.nullable;
        let ty = match op {
            ArithOp::Concat => {
                if meta.ty != ExprType::Text {
                    return Err(ModelError::type_mismatch(context, "TEXT", meta.ty));
                }
                ExprType::Text
            }
            _ => {
                if !meta.ty.is_numeric() {
                    return Err(ModelError::type_mismatch(context, "numeric", meta.ty));
                }
                meta.ty
            }
        };
        result = Some(result.map_or(ty, |acc| acc.promote_or_keep(ty)));
    }
    let ty = result.ok_or_else(|| ModelError::type_mismatch(context, "operands", "none"))?;
    // quotients are always REAL, whatever the operand types
    let ty = if op == ArithOp::Over { ExprType::Real } else { ty };
    Ok(ExprMeta::new(ty, nullable))
}

impl ExprType {
    fn promote_or_keep(self, other: ExprType) -> ExprType {
        if self == ExprType::Text {
            ExprType::Text
        } else {
            self.promote(other)
        }
    }
}

fn infer_compare(op: CompareOp, left: &Expr, right: &Expr) -> Result<ExprMeta, ModelError> {
    let context = op.symbol().trim();
    let l = *left.meta()?;
    let r = *right.meta()?;
    let nullable = l.nullable || r.nullable;

    if l.ty == ExprType::Bit || r.ty == ExprType::Bit {
        if !matches!(op, CompareOp::Eq | CompareOp::Ne) {
            return Err(ModelError::type_mismatch(context, "a non-BIT operand", ExprType::Bit));
        }
        if l.ty != r.ty {
            let other = if l.ty == ExprType::Bit { r.ty } else { l.ty };
            return Err(ModelError::type_mismatch(context, "BIT on both sides", other));
        }
        return Ok(ExprMeta::new(ExprType::Logic, nullable));
    }

    if op == CompareOp::Like {
        if l.ty != ExprType::Text {
            return Err(ModelError::type_mismatch(context, "TEXT", l.ty));
        }
        if r.ty != ExprType::Text {
            return Err(ModelError::type_mismatch(context, "TEXT", r.ty));
        }
        return Ok(ExprMeta::new(ExprType::Logic, nullable));
    }

    expect_same_family(left, &[right], context)?;
    Ok(ExprMeta::new(ExprType::Logic, nullable))
}
