//! Filter model - declarative field predicates validated against an entity
//!
//! A [`FilterSpec`] is what callers send: an ordered list of
//! `(field, operator, value)` conditions combined with AND. [`build_predicate`]
//! checks it against the entity's declared fields and produces a
//! [`Predicate`] storage engines can evaluate or translate.

use crate::contract::{FieldKind, FieldValue, Record, RepoError, Visibility, DELETED_AT_FIELD};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operator {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    In,
    IsNull,
    IsNotNull,
}

impl Operator {
    fn is_ordering(self) -> bool {
        matches!(self, Self::Lt | Self::Le | Self::Gt | Self::Ge)
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let symbol = match self {
            Self::Eq => "==",
            Self::Ne => "!=",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
            Self::In => "in",
            Self::IsNull => "is null",
            Self::IsNotNull => "is not null",
        };
        f.write_str(symbol)
    }
}

/// Right-hand side of a condition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Operand {
    Many(Vec<FieldValue>),
    One(FieldValue),
}

impl Default for Operand {
    fn default() -> Self {
        Self::One(FieldValue::Null)
    }
}

/// One caller-supplied condition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterCondition {
    pub field: String,
    pub op: Operator,
    #[serde(default)]
    pub value: Operand,
}

/// Conjunction of conditions, in caller order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FilterSpec {
    conditions: Vec<FilterCondition>,
}

impl FilterSpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn conditions(&self) -> &[FilterCondition] {
        &self.conditions
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    pub fn push(mut self, field: impl Into<String>, op: Operator, value: Operand) -> Self {
        self.conditions.push(FilterCondition {
            field: field.into(),
            op,
            value,
        });
        self
    }

    fn scalar(self, field: impl Into<String>, op: Operator, value: impl Into<FieldValue>) -> Self {
        self.push(field, op, Operand::One(value.into()))
    }

    pub fn eq(self, field: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.scalar(field, Operator::Eq, value)
    }

    pub fn ne(self, field: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.scalar(field, Operator::Ne, value)
    }

    pub fn lt(self, field: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.scalar(field, Operator::Lt, value)
    }

    pub fn le(self, field: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.scalar(field, Operator::Le, value)
    }

    pub fn gt(self, field: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.scalar(field, Operator::Gt, value)
    }

    pub fn ge(self, field: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.scalar(field, Operator::Ge, value)
    }

    pub fn is_in<V, I>(self, field: impl Into<String>, values: I) -> Self
    where
        V: Into<FieldValue>,
        I: IntoIterator<Item = V>,
    {
        let values = values.into_iter().map(Into::into).collect();
        self.push(field, Operator::In, Operand::Many(values))
    }

    pub fn is_null(self, field: impl Into<String>) -> Self {
        self.push(field, Operator::IsNull, Operand::default())
    }

    pub fn is_not_null(self, field: impl Into<String>) -> Self {
        self.push(field, Operator::IsNotNull, Operand::default())
    }
}

/// A validated condition bound to a declared field
#[derive(Debug, Clone, PartialEq)]
pub enum Clause {
    Compare {
        field: &'static str,
        op: Operator,
        value: FieldValue,
    },
    In {
        field: &'static str,
        values: Vec<FieldValue>,
    },
    IsNull {
        field: &'static str,
    },
    IsNotNull {
        field: &'static str,
    },
}

impl Clause {
    pub fn field(&self) -> &'static str {
        match self {
            Self::Compare { field, .. }
            | Self::In { field, .. }
            | Self::IsNull { field }
            | Self::IsNotNull { field } => field,
        }
    }

    /// SQL semantics: comparisons against NULL never match
    pub fn matches(&self, actual: &FieldValue) -> bool {
        match self {
            Self::IsNull { .. } => actual.is_null(),
            Self::IsNotNull { .. } => !actual.is_null(),
            Self::In { values, .. } => values
                .iter()
                .any(|v| actual.compare(v) == Some(Ordering::Equal)),
            Self::Compare { op, value, .. } => match (op, actual.compare(value)) {
                (_, None) => false,
                (Operator::Eq, Some(ord)) => ord == Ordering::Equal,
                (Operator::Ne, Some(ord)) => ord != Ordering::Equal,
                (Operator::Lt, Some(ord)) => ord == Ordering::Less,
                (Operator::Le, Some(ord)) => ord != Ordering::Greater,
                (Operator::Gt, Some(ord)) => ord == Ordering::Greater,
                (Operator::Ge, Some(ord)) => ord != Ordering::Less,
                (Operator::In | Operator::IsNull | Operator::IsNotNull, Some(_)) => false,
            },
        }
    }
}

/// Conjunction of validated clauses; empty matches everything
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Predicate {
    clauses: Vec<Clause>,
}

impl Predicate {
    /// Matches every row
    pub fn all() -> Self {
        Self::default()
    }

    pub fn clauses(&self) -> &[Clause] {
        &self.clauses
    }

    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    pub fn matches<E: Record>(&self, entity: &E) -> bool {
        self.clauses.iter().all(|clause| {
            let actual = entity.value(clause.field()).unwrap_or(FieldValue::Null);
            clause.matches(&actual)
        })
    }

    fn push(&mut self, clause: Clause) {
        self.clauses.push(clause);
    }
}

/// Validate `filter` against `E`'s declared fields
///
/// Unknown fields, operand/operator mismatches and values of the wrong kind
/// are rejected with [`RepoError::InvalidFilter`] naming the field. With
/// [`Visibility::Active`] soft-deleted rows are excluded.
pub fn build_predicate<E: Record>(
    filter: &FilterSpec,
    visibility: Visibility,
) -> Result<Predicate, RepoError> {
    let mut predicate = Predicate::all();

    for condition in filter.conditions() {
        let def = E::field(&condition.field).ok_or_else(|| {
            RepoError::invalid_filter(&condition.field, format!("unknown field on {}", E::NAME))
        })?;
        let invalid = |reason: String| RepoError::invalid_filter(def.name, reason);

        let clause = match (condition.op, &condition.value) {
            (Operator::IsNull, _) => Clause::IsNull { field: def.name },
            (Operator::IsNotNull, _) => Clause::IsNotNull { field: def.name },
            (Operator::In, Operand::Many(values)) => {
                let values = values
                    .iter()
                    .map(|v| coerce(v, def.kind).ok_or_else(|| invalid(mismatch(v, def.kind))))
                    .collect::<Result<Vec<_>, _>>()?;
                Clause::In {
                    field: def.name,
                    values,
                }
            }
            (Operator::In, Operand::One(_)) => {
                return Err(invalid("'in' expects a list of values".to_string()))
            }
            (op, Operand::Many(_)) => {
                return Err(invalid(format!("'{op}' expects a single value")))
            }
            (op, Operand::One(FieldValue::Null)) => {
                if op.is_ordering() {
                    return Err(invalid(format!("'{op}' cannot compare with null")));
                }
                if !def.nullable {
                    return Err(invalid("field is not nullable".to_string()));
                }
                if op == Operator::Eq {
                    Clause::IsNull { field: def.name }
                } else {
                    Clause::IsNotNull { field: def.name }
                }
            }
            (op, Operand::One(value)) => Clause::Compare {
                field: def.name,
                op,
                value: coerce(value, def.kind).ok_or_else(|| invalid(mismatch(value, def.kind)))?,
            },
        };
        predicate.push(clause);
    }

    if visibility == Visibility::Active && E::is_soft_deletable() {
        predicate.push(Clause::IsNull {
            field: DELETED_AT_FIELD,
        });
    }

    Ok(predicate)
}

fn coerce(value: &FieldValue, kind: FieldKind) -> Option<FieldValue> {
    if value.is_null() || !value.fits(kind) {
        return None;
    }
    Some(value.coerce(kind))
}

fn mismatch(value: &FieldValue, kind: FieldKind) -> String {
    match value.kind() {
        Some(actual) => format!("expected {kind} value, got {actual}"),
        None => format!("expected {kind} value, got null"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract::{FieldDef, Identity, ID_FIELD};
    use serde_json::json;
    use uuid::Uuid;

    #[derive(Clone)]
    struct Book {
        id: Uuid,
        title: String,
        pages: i64,
        rating: Option<f64>,
    }

    crate::impl_identity!(Book);

    impl Record for Book {
        const NAME: &'static str = "book";

        fn fields() -> &'static [FieldDef] {
            const FIELDS: &[FieldDef] = &[
                FieldDef::id(),
                FieldDef::new("title", FieldKind::Text),
                FieldDef::new("pages", FieldKind::Int),
                FieldDef::new("rating", FieldKind::Float).nullable(),
            ];
            FIELDS
        }

        fn value(&self, field: &str) -> Option<FieldValue> {
            match field {
                ID_FIELD => Some(self.id().into()),
                "title" => Some(self.title.as_str().into()),
                "pages" => Some(self.pages.into()),
                "rating" => Some(self.rating.into()),
                _ => None,
            }
        }
    }

    fn book(title: &str, pages: i64, rating: Option<f64>) -> Book {
        Book {
            id: Uuid::now_v7(),
            title: title.to_string(),
            pages,
            rating,
        }
    }

    #[test]
    fn empty_filter_matches_everything() {
        let predicate = build_predicate::<Book>(&FilterSpec::new(), Visibility::Active).unwrap();
        assert!(predicate.is_empty());
        assert!(predicate.matches(&book("a", 1, None)));
    }

    #[test]
    fn unknown_field_is_named() {
        let err = build_predicate::<Book>(&FilterSpec::new().eq("author", "x"), Visibility::Active)
            .unwrap_err();
        match err {
            RepoError::InvalidFilter { field, .. } => assert_eq!(field, "author"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn mistyped_value_is_rejected() {
        let err = build_predicate::<Book>(&FilterSpec::new().gt("pages", "many"), Visibility::Active)
            .unwrap_err();
        assert!(matches!(err, RepoError::InvalidFilter { field, .. } if field == "pages"));
    }

    #[test]
    fn null_needs_a_nullable_field() {
        let filter = FilterSpec::new().eq("title", FieldValue::Null);
        assert!(build_predicate::<Book>(&filter, Visibility::Active).is_err());

        let filter = FilterSpec::new().eq("rating", FieldValue::Null);
        let predicate = build_predicate::<Book>(&filter, Visibility::Active).unwrap();
        assert_eq!(predicate.clauses(), &[Clause::IsNull { field: "rating" }]);
    }

    #[test]
    fn ordering_against_null_is_rejected() {
        let filter = FilterSpec::new().lt("rating", FieldValue::Null);
        assert!(build_predicate::<Book>(&filter, Visibility::Active).is_err());
    }

    #[test]
    fn conjunction_of_range_and_equality() {
        let filter = FilterSpec::new()
            .ge("pages", 100)
            .lt("pages", 300)
            .ne("title", "skip");
        let predicate = build_predicate::<Book>(&filter, Visibility::Active).unwrap();

        assert!(predicate.matches(&book("keep", 100, None)));
        assert!(!predicate.matches(&book("keep", 300, None)));
        assert!(!predicate.matches(&book("skip", 150, None)));
    }

    #[test]
    fn int_literal_against_float_field() {
        let filter = FilterSpec::new().ge("rating", 4);
        let predicate = build_predicate::<Book>(&filter, Visibility::Active).unwrap();
        assert!(predicate.matches(&book("a", 1, Some(4.5))));
        assert!(!predicate.matches(&book("a", 1, Some(3.9))));
        // null never satisfies a comparison
        assert!(!predicate.matches(&book("a", 1, None)));
    }

    #[test]
    fn membership() {
        let filter = FilterSpec::new().is_in("title", ["a", "c"]);
        let predicate = build_predicate::<Book>(&filter, Visibility::Active).unwrap();
        assert!(predicate.matches(&book("a", 1, None)));
        assert!(!predicate.matches(&book("b", 1, None)));

        let empty = FilterSpec::new().is_in("title", Vec::<String>::new());
        let predicate = build_predicate::<Book>(&empty, Visibility::Active).unwrap();
        assert!(!predicate.matches(&book("a", 1, None)));
    }

    #[test]
    fn in_requires_a_list() {
        let filter = FilterSpec::new().push("title", Operator::In, Operand::One("a".into()));
        assert!(build_predicate::<Book>(&filter, Visibility::Active).is_err());
    }

    #[test]
    fn filter_spec_from_json() {
        let filter: FilterSpec = serde_json::from_value(json!([
            { "field": "title", "op": "eq", "value": "a" },
            { "field": "pages", "op": "in", "value": [1, 2] },
            { "field": "rating", "op": "is_null" }
        ]))
        .unwrap();
        let predicate = build_predicate::<Book>(&filter, Visibility::Active).unwrap();
        assert_eq!(predicate.clauses().len(), 3);
        assert!(predicate.matches(&book("a", 2, None)));
    }

    #[test]
    fn uuid_text_is_coerced() {
        let target = book("a", 1, None);
        let filter = FilterSpec::new().eq(ID_FIELD, target.id.to_string());
        let predicate = build_predicate::<Book>(&filter, Visibility::Active).unwrap();
        assert!(predicate.matches(&target));
    }
}
