use std::fmt;
use std::sync::OnceLock;

use chrono::{Local, NaiveDate};
use regex::Regex;
use serde::Serialize;
use serde_json::Value;

use super::{FieldError, FieldKind, FieldValue};

/// Wire format for every date field (`dd.mm.yyyy`).
pub const DATE_FORMAT: &str = "%d.%m.%Y";

/// Oldest accepted age for a birthday, in whole years.
pub const MAX_AGE_YEARS: u32 = 70;

/// Phone number normalized to its 11-digit string form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Phone(String);

impl Phone {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Phone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Gender {
    Unknown,
    Male,
    Female,
}

impl Gender {
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(Self::Unknown),
            1 => Some(Self::Male),
            2 => Some(Self::Female),
            _ => None,
        }
    }

    pub fn code(self) -> u8 {
        match self {
            Self::Unknown => 0,
            Self::Male => 1,
            Self::Female => 2,
        }
    }
}

fn phone_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^7[0-9]{10}$").expect("phone pattern compiles"))
}

/// Emptiness for the value's own kind: `""` for text, `{}` for arguments,
/// `[]` for client ids. `null` is empty everywhere and `0` never is.
pub(super) fn is_empty(kind: FieldKind, value: &Value) -> bool {
    match (kind, value) {
        (_, Value::Null) => true,
        (FieldKind::Arguments, Value::Object(entries)) => entries.is_empty(),
        (FieldKind::ClientIds, Value::Array(items)) => items.is_empty(),
        (
            FieldKind::Char
            | FieldKind::Email
            | FieldKind::Phone
            | FieldKind::Date
            | FieldKind::BirthDay,
            Value::String(text),
        ) => text.is_empty(),
        _ => false,
    }
}

pub(super) fn check(kind: FieldKind, value: &Value) -> Result<FieldValue, FieldError> {
    match kind {
        FieldKind::Char => text(value).map(|text| FieldValue::Text(text.to_string())),
        FieldKind::Arguments => match value {
            Value::Object(object) => Ok(FieldValue::Object(object.clone())),
            _ => Err(invalid("must be a JSON object")),
        },
        FieldKind::Email => {
            let email = text(value)?;
            if email.contains('@') {
                Ok(FieldValue::Text(email.to_string()))
            } else {
                Err(invalid("must contain '@'"))
            }
        }
        FieldKind::Phone => phone(value).map(FieldValue::Phone),
        FieldKind::Date => date(value).map(FieldValue::Date),
        FieldKind::BirthDay => {
            let birthday = date(value)?;
            check_age(birthday, Local::now().date_naive())?;
            Ok(FieldValue::Date(birthday))
        }
        FieldKind::Gender => value
            .as_i64()
            .and_then(Gender::from_code)
            .map(FieldValue::Gender)
            .ok_or_else(|| invalid("must be one of 0, 1, 2")),
        FieldKind::ClientIds => client_ids(value).map(FieldValue::ClientIds),
    }
}

fn invalid(reason: &str) -> FieldError {
    FieldError::Invalid(reason.to_string())
}

fn text(value: &Value) -> Result<&str, FieldError> {
    value.as_str().ok_or_else(|| invalid("must be a string"))
}

fn phone(value: &Value) -> Result<Phone, FieldError> {
    let digits = match value {
        Value::String(text) => text.clone(),
        Value::Number(number) if number.is_i64() || number.is_u64() => number.to_string(),
        _ => return Err(invalid("must be a string or an integer")),
    };

    if phone_pattern().is_match(&digits) {
        Ok(Phone(digits))
    } else {
        Err(invalid("must be 11 digits starting with 7"))
    }
}

fn date(value: &Value) -> Result<NaiveDate, FieldError> {
    let raw = text(value)?;
    NaiveDate::parse_from_str(raw, DATE_FORMAT)
        .map_err(|_| FieldError::Invalid(format!("'{raw}' is not a DD.MM.YYYY date")))
}

fn check_age(birthday: NaiveDate, today: NaiveDate) -> Result<(), FieldError> {
    match today.years_since(birthday) {
        None => Err(invalid("cannot be in the future")),
        Some(age) if age > MAX_AGE_YEARS => Err(FieldError::Invalid(format!(
            "age must not exceed {MAX_AGE_YEARS} years"
        ))),
        Some(_) => Ok(()),
    }
}

fn client_ids(value: &Value) -> Result<Vec<i64>, FieldError> {
    let items = value
        .as_array()
        .ok_or_else(|| invalid("must be a list of integers"))?;
    items
        .iter()
        .map(|item| {
            item.as_i64()
                .ok_or_else(|| invalid("must contain only integers"))
        })
        .collect()
}
