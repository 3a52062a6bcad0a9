//! Encode/decode boundary between recovery props and their stored form

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::data::RecoveryProps;

#[derive(Error, Debug)]
pub enum CodecError {
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Recovery props must be a JSON object, got {0}")]
    NotAnObject(&'static str),
}

/// Converts recovery props to and from the string that gets stored
pub trait PropsCodec: Send + Sync {
    fn encode(&self, props: &RecoveryProps) -> Result<String, CodecError>;

    fn decode(&self, encoded: &str) -> Result<RecoveryProps, CodecError>;
}

/// Plain JSON via `serde_json`
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl PropsCodec for JsonCodec {
    fn encode(&self, props: &RecoveryProps) -> Result<String, CodecError> {
        Ok(serde_json::to_string(props)?)
    }

    fn decode(&self, encoded: &str) -> Result<RecoveryProps, CodecError> {
        into_props(serde_json::from_str(encoded)?)
    }
}

/// Serialize any value into recovery props; it must serialize to a JSON object
pub fn to_props<T: Serialize + ?Sized>(value: &T) -> Result<RecoveryProps, CodecError> {
    into_props(serde_json::to_value(value)?)
}

/// Deserialize recovery props into a typed value
pub fn from_props<T: DeserializeOwned>(props: &RecoveryProps) -> Result<T, CodecError> {
    Ok(serde_json::from_value(Value::Object(props.clone()))?)
}

fn into_props(value: Value) -> Result<RecoveryProps, CodecError> {
    match value {
        Value::Object(map) => Ok(map),
        other => Err(CodecError::NotAnObject(kind_of(&other))),
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
