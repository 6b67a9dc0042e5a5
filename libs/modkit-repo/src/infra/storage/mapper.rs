//! Conversions between the storage-agnostic query model and SeaORM

use crate::contract::{FieldValue, StorageError};
use crate::domain::filter::{Clause, Operator, Predicate};
use crate::domain::pagination::SortDirection;
use anyhow::anyhow;
use sea_orm::sea_query::{Order, SimpleExpr};
use sea_orm::{ColumnTrait, Condition, DbErr, EntityTrait, SqlErr, Value};
use std::str::FromStr;

impl From<&FieldValue> for Value {
    fn from(value: &FieldValue) -> Self {
        match value {
            FieldValue::Null => Value::from(None::<String>),
            FieldValue::Bool(v) => Value::from(*v),
            FieldValue::Int(v) => Value::from(*v),
            FieldValue::Float(v) => Value::from(*v),
            FieldValue::Uuid(v) => Value::from(*v),
            FieldValue::Timestamp(v) => Value::from(*v),
            FieldValue::Text(v) => Value::from(v.clone()),
        }
    }
}

impl From<SortDirection> for Order {
    fn from(direction: SortDirection) -> Self {
        match direction {
            SortDirection::Asc => Order::Asc,
            SortDirection::Desc => Order::Desc,
        }
    }
}

/// Unique violations become `Conflict`, a missed update becomes `NotFound`
/// for `id`; everything else is a backend failure.
pub fn storage_error(err: DbErr, id: Option<uuid::Uuid>) -> StorageError {
    if let Some(SqlErr::UniqueConstraintViolation(detail)) = err.sql_err() {
        return StorageError::Conflict(detail);
    }
    match (err, id) {
        (DbErr::RecordNotUpdated | DbErr::RecordNotFound(_), Some(id)) => StorageError::NotFound { id },
        (err, _) => StorageError::Backend(err.into()),
    }
}

/// Column of `T` named like the declared field
pub fn column<T>(name: &str) -> Result<T::Column, StorageError>
where
    T: EntityTrait,
    T::Column: FromStr,
{
    T::Column::from_str(name)
        .map_err(|_| StorageError::Backend(anyhow!("table {} has no column {name}", T::default().table_name())))
}

pub fn condition<T>(predicate: &Predicate) -> Result<Condition, StorageError>
where
    T: EntityTrait,
    T::Column: FromStr,
{
    predicate
        .clauses()
        .iter()
        .try_fold(Condition::all(), |cond, clause| {
            Ok(cond.add(clause_expr::<T>(clause)?))
        })
}

fn clause_expr<T>(clause: &Clause) -> Result<SimpleExpr, StorageError>
where
    T: EntityTrait,
    T::Column: FromStr,
{
    let col = column::<T>(clause.field())?;
    let expr = match clause {
        Clause::IsNull { .. } => col.is_null(),
        Clause::IsNotNull { .. } => col.is_not_null(),
        Clause::In { values, .. } => col.is_in(values.iter().map(Value::from)),
        Clause::Compare { op, value, .. } => {
            let value = Value::from(value);
            match op {
                Operator::Eq => col.eq(value),
                Operator::Ne => col.ne(value),
                Operator::Lt => col.lt(value),
                Operator::Le => col.lte(value),
                Operator::Gt => col.gt(value),
                Operator::Ge => col.gte(value),
                Operator::In | Operator::IsNull | Operator::IsNotNull => {
                    return Err(StorageError::Backend(anyhow!(
                        "'{op}' is not a comparison on {}",
                        clause.field()
                    )))
                }
            }
        }
    };
    Ok(expr)
}
