//! Declarative request validation.
//!
//! A [`Schema`] is an ordered list of named [`Field`]s. Validating an input
//! object walks the fields in declaration order, runs each field's
//! required/nullable/type checks, and stops at the first failure. Keys the
//! schema does not declare are ignored.

mod fields;

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde_json::{Map, Value};

pub use fields::{Gender, Phone, DATE_FORMAT, MAX_AGE_YEARS};

/// Type-specific rule applied once a value is known to be present and non-empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Char,
    Arguments,
    Email,
    Phone,
    Date,
    BirthDay,
    Gender,
    ClientIds,
}

/// A reusable validation unit: a type rule plus required/nullable flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Field {
    kind: FieldKind,
    required: bool,
    nullable: bool,
}

impl Field {
    pub const fn new(kind: FieldKind, required: bool, nullable: bool) -> Self {
        Self {
            kind,
            required,
            nullable,
        }
    }

    pub const fn char(required: bool, nullable: bool) -> Self {
        Self::new(FieldKind::Char, required, nullable)
    }

    pub const fn arguments(required: bool, nullable: bool) -> Self {
        Self::new(FieldKind::Arguments, required, nullable)
    }

    pub const fn email(required: bool, nullable: bool) -> Self {
        Self::new(FieldKind::Email, required, nullable)
    }

    pub const fn phone(required: bool, nullable: bool) -> Self {
        Self::new(FieldKind::Phone, required, nullable)
    }

    pub const fn date(required: bool, nullable: bool) -> Self {
        Self::new(FieldKind::Date, required, nullable)
    }

    pub const fn birthday(required: bool, nullable: bool) -> Self {
        Self::new(FieldKind::BirthDay, required, nullable)
    }

    pub const fn gender(required: bool, nullable: bool) -> Self {
        Self::new(FieldKind::Gender, required, nullable)
    }

    pub const fn client_ids(required: bool, nullable: bool) -> Self {
        Self::new(FieldKind::ClientIds, required, nullable)
    }

    pub fn kind(&self) -> FieldKind {
        self.kind
    }

    pub fn is_required(&self) -> bool {
        self.required
    }

    pub fn is_nullable(&self) -> bool {
        self.nullable
    }

    /// Validates a raw value looked up from the input object.
    ///
    /// `None` means the key was absent. `Ok(None)` means the field is unset:
    /// either absent and optional, or empty and nullable.
    pub fn validate(&self, raw: Option<&Value>) -> Result<Option<FieldValue>, FieldError> {
        let value = match raw {
            None if self.required => return Err(FieldError::Required),
            None => return Ok(None),
            Some(value) => value,
        };

        if fields::is_empty(self.kind, value) {
            return if self.nullable {
                Ok(None)
            } else {
                Err(FieldError::Empty)
            };
        }

        fields::check(self.kind, value).map(Some)
    }
}

/// Typed result of a successful field validation.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Text(String),
    Object(Map<String, Value>),
    Phone(Phone),
    Date(NaiveDate),
    Gender(Gender),
    ClientIds(Vec<i64>),
}

impl FieldValue {
    pub fn into_text(self) -> Option<String> {
        match self {
            FieldValue::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn into_object(self) -> Option<Map<String, Value>> {
        match self {
            FieldValue::Object(object) => Some(object),
            _ => None,
        }
    }

    pub fn into_phone(self) -> Option<Phone> {
        match self {
            FieldValue::Phone(phone) => Some(phone),
            _ => None,
        }
    }

    pub fn into_date(self) -> Option<NaiveDate> {
        match self {
            FieldValue::Date(date) => Some(date),
            _ => None,
        }
    }

    pub fn into_gender(self) -> Option<Gender> {
        match self {
            FieldValue::Gender(gender) => Some(gender),
            _ => None,
        }
    }

    pub fn into_client_ids(self) -> Option<Vec<i64>> {
        match self {
            FieldValue::ClientIds(ids) => Some(ids),
            _ => None,
        }
    }
}

/// Failure of a single field, before the schema attaches the field name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FieldError {
    #[error("field is required")]
    Required,
    #[error("field cannot be empty")]
    Empty,
    #[error("{0}")]
    Invalid(String),
}

/// Request-level validation failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("{field}: {source}")]
    Field {
        field: &'static str,
        source: FieldError,
    },
    #[error("{0}")]
    Schema(String),
}

impl ValidationError {
    pub fn field(&self) -> Option<&'static str> {
        match self {
            ValidationError::Field { field, .. } => Some(*field),
            ValidationError::Schema(_) => None,
        }
    }

    /// True when `name` was required but absent from the input.
    pub fn is_missing(&self, name: &str) -> bool {
        matches!(
            self,
            ValidationError::Field { field, source: FieldError::Required } if *field == name
        )
    }
}

/// Ordered, uniquely-named field bindings describing one request shape.
#[derive(Debug, Clone, Copy)]
pub struct Schema {
    name: &'static str,
    fields: &'static [(&'static str, Field)],
}

impl Schema {
    pub const fn new(name: &'static str, fields: &'static [(&'static str, Field)]) -> Self {
        Self { name, fields }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn fields(&self) -> &'static [(&'static str, Field)] {
        self.fields
    }

    pub fn validate(&self, input: &Map<String, Value>) -> Result<ValidatedFields, ValidationError> {
        let mut values = BTreeMap::new();
        for (name, field) in self.fields {
            let value = field
                .validate(input.get(*name))
                .map_err(|source| ValidationError::Field {
                    field: *name,
                    source,
                })?;
            if let Some(value) = value {
                values.insert(*name, value);
            }
        }
        Ok(ValidatedFields { values })
    }

    /// Validates any JSON value; `null` is treated as an empty object.
    pub fn validate_value(&self, input: &Value) -> Result<ValidatedFields, ValidationError> {
        match input {
            Value::Object(object) => self.validate(object),
            Value::Null => self.validate(&Map::new()),
            _ => Err(ValidationError::Schema(format!(
                "{} expects a JSON object",
                self.name
            ))),
        }
    }
}

/// Field values that passed validation; unset fields are simply missing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidatedFields {
    values: BTreeMap<&'static str, FieldValue>,
}

impl ValidatedFields {
    pub fn take(&mut self, name: &str) -> Option<FieldValue> {
        self.values.remove(name)
    }

    pub fn is_set(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn object(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(object) => object,
            other => panic!("expected object, got {other}"),
        }
    }

    const SAMPLE: Schema = Schema::new(
        "sample",
        &[
            ("login", Field::char(true, false)),
            ("email", Field::email(false, true)),
            ("gender", Field::gender(false, true)),
        ],
    );

    #[test]
    fn required_field_missing_fails() {
        let field = Field::char(true, true);
        assert_eq!(field.validate(None), Err(FieldError::Required));
    }

    #[test]
    fn optional_field_missing_is_unset() {
        let field = Field::char(false, false);
        assert_eq!(field.validate(None), Ok(None));
    }

    #[test]
    fn empty_values_respect_nullable_flag() {
        for (field, empty) in [
            (Field::char(true, true), json!("")),
            (Field::char(true, true), Value::Null),
            (Field::arguments(true, true), json!({})),
            (Field::client_ids(true, true), json!([])),
            (Field::gender(true, true), Value::Null),
        ] {
            assert_eq!(field.validate(Some(&empty)), Ok(None), "{empty}");
            let strict = Field::new(field.kind(), true, false);
            assert_eq!(
                strict.validate(Some(&empty)),
                Err(FieldError::Empty),
                "{empty} must be rejected when not nullable"
            );
        }
    }

    #[test]
    fn emptiness_of_another_kind_is_a_type_error() {
        for (field, value) in [
            (Field::gender(false, true), json!([])),
            (Field::char(false, true), json!({})),
            (Field::arguments(true, true), json!([])),
            (Field::client_ids(true, true), json!({})),
            (Field::email(false, true), json!([])),
        ] {
            assert!(
                matches!(field.validate(Some(&value)), Err(FieldError::Invalid(_))),
                "{value} must fail the type check"
            );
        }
    }

    #[test]
    fn zero_is_not_empty() {
        let field = Field::gender(true, false);
        assert_eq!(
            field.validate(Some(&json!(0))),
            Ok(Some(FieldValue::Gender(Gender::Unknown)))
        );
    }

    #[test]
    fn schema_ignores_unknown_keys_and_skips_unset_fields() {
        let input = object(json!({"login": "h&f", "extra": [1, 2, 3]}));
        let mut fields = SAMPLE.validate(&input).expect("schema validates");
        assert_eq!(fields.len(), 1);
        assert!(!fields.is_set("email"));
        assert_eq!(
            fields.take("login").and_then(FieldValue::into_text),
            Some("h&f".to_string())
        );
    }

    #[test]
    fn schema_reports_first_failing_field_in_declaration_order() {
        let input = object(json!({"gender": 5, "email": "nope"}));
        let err = SAMPLE.validate(&input).expect_err("login is missing");
        assert_eq!(err.field(), Some("login"));
        assert!(err.is_missing("login"));

        let input = object(json!({"login": "x", "gender": 5, "email": "nope"}));
        let err = SAMPLE.validate(&input).expect_err("email is invalid");
        assert_eq!(err.field(), Some("email"));
    }

    #[test]
    fn schema_rejects_non_object_input() {
        let err = SAMPLE
            .validate_value(&json!([1, 2]))
            .expect_err("arrays are not objects");
        assert!(matches!(err, ValidationError::Schema(_)));
    }

    #[test]
    fn error_messages_name_the_field() {
        let err = SAMPLE
            .validate(&object(json!({"login": ""})))
            .expect_err("login cannot be empty");
        assert_eq!(err.to_string(), "login: field cannot be empty");
    }
}
