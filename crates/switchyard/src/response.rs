//! The two-variant result of a dispatch.
//!
//! A [`Response`] is an expected business outcome. Faults are carried by the
//! `Err` side of [`MessageBus::dispatch`](crate::MessageBus::dispatch) and
//! never appear here.

use crate::policy::PolicyDenied;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Outcome of handling one message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Response {
    Success(SuccessResponse),
    Error(ErrorResponse),
}

impl Response {
    pub fn success(result: impl Into<Value>) -> Self {
        Self::Success(SuccessResponse::new(result))
    }

    /// A success carrying no result.
    pub fn empty() -> Self {
        Self::success(Value::Null)
    }

    pub fn error(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self::Error(ErrorResponse::new(kind, message))
    }

    /// Serialize a typed result into a success.
    pub fn json<T: Serialize + ?Sized>(result: &T) -> Result<Self, serde_json::Error> {
        Ok(Self::success(serde_json::to_value(result)?))
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error(_))
    }

    pub fn as_success(&self) -> Option<&SuccessResponse> {
        match self {
            Self::Success(success) => Some(success),
            Self::Error(_) => None,
        }
    }

    pub fn as_error(&self) -> Option<&ErrorResponse> {
        match self {
            Self::Success(_) => None,
            Self::Error(error) => Some(error),
        }
    }

    pub fn into_result(self) -> Result<Value, ErrorResponse> {
        match self {
            Self::Success(success) => Ok(success.result),
            Self::Error(error) => Err(error),
        }
    }
}

impl From<SuccessResponse> for Response {
    fn from(success: SuccessResponse) -> Self {
        Self::Success(success)
    }
}

impl From<ErrorResponse> for Response {
    fn from(error: ErrorResponse) -> Self {
        Self::Error(error)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuccessResponse {
    result: Value,
}

impl SuccessResponse {
    pub fn new(result: impl Into<Value>) -> Self {
        Self {
            result: result.into(),
        }
    }

    pub fn result(&self) -> &Value {
        &self.result
    }

    /// Deserialize the result into `T`.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        T::deserialize(&self.result)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    kind: ErrorKind,
    message: String,
}

impl ErrorResponse {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn kind(&self) -> &ErrorKind {
        &self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for ErrorResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl From<PolicyDenied> for ErrorResponse {
    fn from(denied: PolicyDenied) -> Self {
        Self::new(ErrorKind::PolicyDenied, denied.reason())
    }
}

/// Expected failure categories a handler can report.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    NotFound,
    Validation,
    PolicyDenied,
    Conflict,
    Cancelled,
    /// Application-specific category.
    Other(String),
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => f.write_str("NotFound"),
            Self::Validation => f.write_str("Validation"),
            Self::PolicyDenied => f.write_str("PolicyDenied"),
            Self::Conflict => f.write_str("Conflict"),
            Self::Cancelled => f.write_str("Cancelled"),
            Self::Other(kind) => f.write_str(kind),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Greeting {
        text: String,
    }

    #[test]
    fn json_success_decodes_back() {
        let response = Response::json(&Greeting {
            text: "hi".into(),
        })
        .unwrap();

        let greeting: Greeting = response.as_success().unwrap().decode().unwrap();
        assert_eq!(greeting.text, "hi");
    }

    #[test]
    fn into_result_splits_variants() {
        assert_eq!(Response::success("hi").into_result(), Ok(json!("hi")));

        let err = Response::error(ErrorKind::NotFound, "no such user")
            .into_result()
            .unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::NotFound);
        assert_eq!(err.to_string(), "NotFound: no such user");
    }

    #[test]
    fn policy_denial_becomes_policy_denied_error() {
        let error: ErrorResponse = PolicyDenied::new("caller missing").into();
        assert_eq!(error.kind(), &ErrorKind::PolicyDenied);
        assert_eq!(error.message(), "caller missing");
    }

    #[test]
    fn serializes_with_status_tag() {
        let value = serde_json::to_value(Response::error(ErrorKind::Conflict, "taken")).unwrap();
        assert_eq!(
            value,
            json!({ "status": "error", "kind": "conflict", "message": "taken" })
        );
    }
}
