//! Request shapes accepted by the method endpoint, declared as field schemas.

use chrono::NaiveDate;
use serde_json::{Map, Value};

use crate::validation::{Field, FieldValue, Gender, Phone, Schema, ValidatedFields, ValidationError};

/// A request type backed by a declarative [`Schema`].
pub trait RequestSchema: Sized {
    const SCHEMA: Schema;

    fn from_fields(fields: ValidatedFields) -> Self;

    /// Cross-field rules checked after every field passed.
    fn check(&self) -> Result<(), ValidationError> {
        Ok(())
    }

    fn validate(input: &Map<String, Value>) -> Result<Self, ValidationError> {
        let request = Self::from_fields(Self::SCHEMA.validate(input)?);
        request.check()?;
        Ok(request)
    }

    fn from_value(input: &Value) -> Result<Self, ValidationError> {
        let request = Self::from_fields(Self::SCHEMA.validate_value(input)?);
        request.check()?;
        Ok(request)
    }
}

/// Outer envelope of every method call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MethodRequest {
    pub account: Option<String>,
    pub login: Option<String>,
    pub token: Option<String>,
    pub arguments: Option<Map<String, Value>>,
    pub method: Option<String>,
}

impl MethodRequest {
    pub const ADMIN_LOGIN: &'static str = "admin";

    pub fn is_admin(&self) -> bool {
        self.login.as_deref() == Some(Self::ADMIN_LOGIN)
    }

    /// Method arguments, with an unset value read as an empty object.
    pub fn arguments(&self) -> Value {
        self.arguments
            .clone()
            .map(Value::Object)
            .unwrap_or_else(|| Value::Object(Map::new()))
    }
}

impl RequestSchema for MethodRequest {
    const SCHEMA: Schema = Schema::new(
        "method",
        &[
            ("account", Field::char(false, true)),
            ("login", Field::char(true, true)),
            ("token", Field::char(true, true)),
            ("arguments", Field::arguments(true, true)),
            ("method", Field::char(true, true)),
        ],
    );

    fn from_fields(mut fields: ValidatedFields) -> Self {
        Self {
            account: fields.take("account").and_then(FieldValue::into_text),
            login: fields.take("login").and_then(FieldValue::into_text),
            token: fields.take("token").and_then(FieldValue::into_text),
            arguments: fields.take("arguments").and_then(FieldValue::into_object),
            method: fields.take("method").and_then(FieldValue::into_text),
        }
    }
}

/// Arguments of the `online_score` method.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OnlineScoreRequest {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<Phone>,
    pub birthday: Option<NaiveDate>,
    pub gender: Option<Gender>,
}

impl OnlineScoreRequest {
    pub fn has_contact_pair(&self) -> bool {
        self.phone.is_some() && self.email.is_some()
    }

    pub fn has_name_pair(&self) -> bool {
        self.first_name.is_some() && self.last_name.is_some()
    }

    pub fn has_demographic_pair(&self) -> bool {
        self.gender.is_some() && self.birthday.is_some()
    }
}

impl RequestSchema for OnlineScoreRequest {
    const SCHEMA: Schema = Schema::new(
        "online_score",
        &[
            ("first_name", Field::char(false, true)),
            ("last_name", Field::char(false, true)),
            ("email", Field::email(false, true)),
            ("phone", Field::phone(false, true)),
            ("birthday", Field::birthday(false, true)),
            ("gender", Field::gender(false, true)),
        ],
    );

    fn from_fields(mut fields: ValidatedFields) -> Self {
        Self {
            first_name: fields.take("first_name").and_then(FieldValue::into_text),
            last_name: fields.take("last_name").and_then(FieldValue::into_text),
            email: fields.take("email").and_then(FieldValue::into_text),
            phone: fields.take("phone").and_then(FieldValue::into_phone),
            birthday: fields.take("birthday").and_then(FieldValue::into_date),
            gender: fields.take("gender").and_then(FieldValue::into_gender),
        }
    }

    fn check(&self) -> Result<(), ValidationError> {
        if self.has_contact_pair() || self.has_name_pair() || self.has_demographic_pair() {
            Ok(())
        } else {
            Err(ValidationError::Schema(
                "at least one pair is required: phone & email, first_name & last_name, \
                 or gender & birthday"
                    .to_string(),
            ))
        }
    }
}

/// Arguments of the `clients_interests` method.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClientsInterestsRequest {
    pub client_ids: Vec<i64>,
    pub date: Option<NaiveDate>,
}

impl RequestSchema for ClientsInterestsRequest {
    const SCHEMA: Schema = Schema::new(
        "clients_interests",
        &[
            ("client_ids", Field::client_ids(true, false)),
            ("date", Field::date(false, true)),
        ],
    );

    fn from_fields(mut fields: ValidatedFields) -> Self {
        Self {
            client_ids: fields
                .take("client_ids")
                .and_then(FieldValue::into_client_ids)
                .unwrap_or_default(),
            date: fields.take("date").and_then(FieldValue::into_date),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashSet;

    fn assert_unique_names(schema: Schema) {
        let names: HashSet<_> = schema.fields().iter().map(|(name, _)| *name).collect();
        assert_eq!(names.len(), schema.fields().len(), "{}", schema.name());
    }

    #[test]
    fn schemas_declare_unique_field_names() {
        assert_unique_names(MethodRequest::SCHEMA);
        assert_unique_names(OnlineScoreRequest::SCHEMA);
        assert_unique_names(ClientsInterestsRequest::SCHEMA);
    }

    #[test]
    fn method_request_requires_envelope_keys() {
        for missing in ["login", "token", "arguments", "method"] {
            let mut body = json!({
                "account": "horns&hoofs",
                "login": "h&f",
                "token": "t",
                "arguments": {},
                "method": "online_score",
            });
            body.as_object_mut().expect("object").remove(missing);
            let err = MethodRequest::from_value(&body).expect_err("missing key fails");
            assert!(err.is_missing(missing), "{missing}: {err}");
        }
    }

    #[test]
    fn method_request_accepts_empty_nullable_values() {
        let body = json!({"login": "", "token": "", "arguments": {}, "method": ""});
        let request = MethodRequest::from_value(&body).expect("nullable fields accept empties");
        assert_eq!(request, MethodRequest::default());
        assert_eq!(request.arguments(), json!({}));
    }

    #[test]
    fn empty_containers_of_the_wrong_type_are_rejected() {
        for args in [
            json!({"phone": "79175002040", "email": "a@b", "gender": []}),
            json!({"phone": "79175002040", "email": "a@b", "first_name": {}}),
        ] {
            let err = OnlineScoreRequest::from_value(&args).expect_err("wrong shape");
            assert!(err.field().is_some(), "{args}: {err}");
        }

        let body = json!({"login": "h&f", "token": "t", "arguments": [], "method": "online_score"});
        let err = MethodRequest::from_value(&body).expect_err("arguments must be an object");
        assert_eq!(err.field(), Some("arguments"));
    }

    #[test]
    fn admin_is_derived_from_login() {
        let admin = MethodRequest {
            login: Some("admin".to_string()),
            ..MethodRequest::default()
        };
        assert!(admin.is_admin());
        assert!(!MethodRequest::default().is_admin());
    }

    #[test]
    fn online_score_requires_a_complete_pair() {
        for args in [
            json!({}),
            json!({"phone": "79175002040"}),
            json!({"phone": "79175002040", "birthday": "01.01.2000", "first_name": "s"}),
            json!({"email": "a@b", "gender": 1}),
            json!({"phone": "79175002040", "email": ""}),
        ] {
            assert!(
                OnlineScoreRequest::from_value(&args).is_err(),
                "{args} should fail"
            );
        }
    }

    #[test]
    fn online_score_accepts_any_single_pair() {
        let contact = OnlineScoreRequest::from_value(&json!({"phone": "79175002040", "email": "x@y"}))
            .expect("contact pair");
        assert!(contact.has_contact_pair());
        assert!(contact.first_name.is_none());

        let names = OnlineScoreRequest::from_value(&json!({"first_name": "a", "last_name": "b"}))
            .expect("name pair");
        assert!(names.has_name_pair());

        let demographic =
            OnlineScoreRequest::from_value(&json!({"gender": 0, "birthday": "01.01.2000"}))
                .expect("gender 0 with birthday");
        assert_eq!(demographic.gender, Some(Gender::Unknown));
        assert!(demographic.has_demographic_pair());
    }

    #[test]
    fn online_score_field_errors_win_over_pair_rule() {
        let err = OnlineScoreRequest::from_value(&json!({
            "phone": "79175002040",
            "email": "stupnikov@otus.ru",
            "gender": 1,
            "birthday": "01.01.2000",
            "first_name": "s",
            "last_name": 2,
        }))
        .expect_err("last_name must be a string");
        assert_eq!(err.field(), Some("last_name"));
    }

    #[test]
    fn clients_interests_rules() {
        let ok = ClientsInterestsRequest::from_value(&json!({"client_ids": [1, 2], "date": "19.07.2017"}))
            .expect("valid request");
        assert_eq!(ok.client_ids, vec![1, 2]);
        assert_eq!(ok.date, NaiveDate::from_ymd_opt(2017, 7, 19));

        let no_date = ClientsInterestsRequest::from_value(&json!({"client_ids": [0]}))
            .expect("date is optional");
        assert!(no_date.date.is_none());

        for args in [
            json!({}),
            json!({"date": "20.07.2017"}),
            json!({"client_ids": [], "date": "20.07.2017"}),
            json!({"client_ids": {"1": 2}, "date": "20.07.2017"}),
            json!({"client_ids": ["1", "2"], "date": "20.07.2017"}),
            json!({"client_ids": [1, 2], "date": "XXX"}),
        ] {
            assert!(
                ClientsInterestsRequest::from_value(&args).is_err(),
                "{args} should fail"
            );
        }
    }
}
