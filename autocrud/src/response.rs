use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use serde_json::{Map, Value};

use crate::association::FieldValue;
use crate::errors::CrudError;
use crate::model::Model;

/// What a successful response carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape<'a> {
    Single(&'a str),
    Collection(&'a str),
    Other,
}

/// Key of the payload in a success body: `Todo`, `Todos` or `data`.
#[must_use]
pub fn response_key(shape: Shape<'_>) -> String {
    match shape {
        Shape::Single(name) => name.to_string(),
        Shape::Collection(name) => format!("{name}s"),
        Shape::Other => "data".to_string(),
    }
}

/// A 200 body: the payload under its shaped key plus extra fields such as
/// `total`.
///
/// ```json
/// {"Todos": [...], "total": 5}
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Envelope {
    body: Map<String, Value>,
}

impl Envelope {
    /// # Errors
    ///
    /// Fails if `model` does not serialize.
    pub fn model<M: Model>(model: &M) -> Result<Self, CrudError> {
        Self::default().payload(Shape::Single(M::TYPE_NAME), model)
    }

    /// # Errors
    ///
    /// Fails if a model does not serialize.
    pub fn models<M: Model>(models: &[M]) -> Result<Self, CrudError> {
        Self::default().payload(Shape::Collection(M::TYPE_NAME), models)
    }

    #[must_use]
    pub fn field(value: FieldValue) -> Self {
        let shape = match &value {
            FieldValue::Scalar(_) => Shape::Other,
            FieldValue::One { type_name, .. } => Shape::Single(type_name),
            FieldValue::Many { type_name, .. } => Shape::Collection(type_name),
        };
        let key = response_key(shape);
        Self::default().with(key, value.into_value())
    }

    fn payload<T: Serialize + ?Sized>(self, shape: Shape<'_>, payload: &T) -> Result<Self, CrudError> {
        let value = serde_json::to_value(payload)
            .map_err(|e| CrudError::process_failed(sea_orm::DbErr::Json(e.to_string())))?;
        Ok(self.with(response_key(shape), value))
    }

    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.body.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.body.get(key)
    }

    #[must_use]
    pub fn into_value(self) -> Value {
        Value::Object(self.body)
    }
}

impl IntoResponse for Envelope {
    fn into_response(self) -> Response {
        (StatusCode::OK, Json(self.into_value())).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::tests::Tag;
    use serde_json::json;

    #[test]
    fn test_response_keys() {
        assert_eq!(response_key(Shape::Single("Todo")), "Todo");
        assert_eq!(response_key(Shape::Collection("Todo")), "Todos");
        assert_eq!(response_key(Shape::Other), "data");
    }

    #[test]
    fn test_models_envelope_with_total() {
        let envelope = Envelope::models(&[Tag::default(), Tag::default()])
            .unwrap()
            .with("total", 2);
        assert_eq!(envelope.get("Tags").and_then(Value::as_array).map(Vec::len), Some(2));
        assert_eq!(envelope.get("total"), Some(&json!(2)));
    }

    #[test]
    fn test_field_envelope_keys() {
        let scalar = Envelope::field(FieldValue::Scalar(json!("hello")));
        assert_eq!(scalar.into_value(), json!({"data": "hello"}));

        let many = Envelope::field(FieldValue::Many {
            type_name: "Todo",
            values: vec![json!({"ID": 1})],
        });
        assert_eq!(many.into_value(), json!({"Todos": [{"ID": 1}]}));

        let one = Envelope::field(FieldValue::One {
            type_name: "Owner",
            value: Value::Null,
        });
        assert_eq!(one.into_value(), json!({"Owner": null}));
    }
}
