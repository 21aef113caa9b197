//! Classification of decoded Zoho response bodies
//!
//! Zoho reports most failures inside a 200 response, either as a bare error
//! object or as a one-element `data` list:
//!
//! ```text
//! {"data":[{"code":"INVALID_DATA","details":{},"message":"the id given...","status":"error"}]}
//! {"code":"INVALID_TOKEN","details":{},"message":"invalid oauth token","status":"error"}
//! ```
//!
//! Zoho Invoice nests the payload under the module name instead of `data`:
//!
//! ```text
//! {"module_name":"Invoices","invoices":[...]}
//! ```

use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

/// Error codes this client knows how to recognise
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    InvalidData,
    InvalidToken,
    InternalError,
    AuthenticationFailure,
    InvalidModule,
    NoPermission,
    MandatoryNotFound,
    RecordInBlueprint,
}

impl ErrorCode {
    pub const ALL: [ErrorCode; 8] = [
        ErrorCode::InvalidData,
        ErrorCode::InvalidToken,
        ErrorCode::InternalError,
        ErrorCode::AuthenticationFailure,
        ErrorCode::InvalidModule,
        ErrorCode::NoPermission,
        ErrorCode::MandatoryNotFound,
        ErrorCode::RecordInBlueprint,
    ];

    /// Wire name used in the `code` field
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::InvalidData => "INVALID_DATA",
            ErrorCode::InvalidToken => "INVALID_TOKEN",
            ErrorCode::InternalError => "INTERNAL_ERROR",
            ErrorCode::AuthenticationFailure => "AUTHENTICATION_FAILURE",
            ErrorCode::InvalidModule => "INVALID_MODULE",
            ErrorCode::NoPermission => "NO_PERMISSION",
            ErrorCode::MandatoryNotFound => "MANDATORY_NOT_FOUND",
            ErrorCode::RecordInBlueprint => "RECORD_IN_BLUEPRINT",
        }
    }

    /// Returns true for codes the connection recovers from by refreshing
    pub fn is_auth_related(self) -> bool {
        matches!(self, ErrorCode::InvalidToken | ErrorCode::AuthenticationFailure)
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown error code: {0}")]
pub struct UnknownErrorCode(pub String);

impl FromStr for ErrorCode {
    type Err = UnknownErrorCode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ErrorCode::ALL
            .into_iter()
            .find(|code| code.as_str() == s)
            .ok_or_else(|| UnknownErrorCode(s.to_string()))
    }
}

/// Shape of the located payload
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Payload<'a> {
    /// Exactly one object, either bare or as a one-element list
    Single(&'a Map<String, Value>),
    /// A list of several entries; no single error can be identified
    Ambiguous(&'a [Value]),
    /// Nothing to classify: null, empty, scalar, or an empty list
    Absent,
}

/// A decoded response body
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    body: Value,
}

impl ApiResponse {
    pub fn new(body: Value) -> Self {
        Self { body }
    }

    pub fn body(&self) -> &Value {
        &self.body
    }

    pub fn into_body(self) -> Value {
        self.body
    }

    /// Returns true if the body carries nothing
    pub fn is_empty(&self) -> bool {
        match &self.body {
            Value::Null => true,
            Value::Object(map) => map.is_empty(),
            Value::Array(items) => items.is_empty(),
            Value::String(s) => s.is_empty(),
            _ => false,
        }
    }

    /// Locates the data portion of the body
    ///
    /// CRM responses use `data`; Invoice responses use a key named after
    /// `module_name`. Falls back to the whole body.
    pub fn data(&self) -> &Value {
        let Value::Object(map) = &self.body else {
            return &self.body;
        };

        if let Some(data) = map.get("data").filter(|v| !v.is_null()) {
            return data;
        }

        if let Some(module) = map
            .get("module_name")
            .and_then(Value::as_str)
            .filter(|m| !m.is_empty())
        {
            if let Some(nested) = find_module_entry(map, module) {
                return nested;
            }
        }

        &self.body
    }

    /// Tagged view of [`data`](Self::data) used for classification
    pub fn payload(&self) -> Payload<'_> {
        if self.is_empty() {
            return Payload::Absent;
        }

        match self.data() {
            Value::Array(items) if items.len() > 1 => Payload::Ambiguous(items),
            Value::Array(items) => match items.first() {
                Some(Value::Object(map)) => Payload::Single(map),
                _ => Payload::Absent,
            },
            Value::Object(map) if !map.is_empty() => Payload::Single(map),
            _ => Payload::Absent,
        }
    }

    /// Returns true if the body carries exactly one error object with `code`
    pub fn has_error(&self, code: ErrorCode) -> bool {
        self.error_code() == Some(code)
    }

    /// The code of the single error object, if it is a known one
    pub fn error_code(&self) -> Option<ErrorCode> {
        match self.payload() {
            Payload::Single(map) => map.get("code")?.as_str()?.parse().ok(),
            Payload::Ambiguous(_) | Payload::Absent => None,
        }
    }

    pub fn is_invalid_data(&self) -> bool {
        self.has_error(ErrorCode::InvalidData)
    }

    pub fn is_invalid_token(&self) -> bool {
        self.has_error(ErrorCode::InvalidToken)
    }

    pub fn is_internal_error(&self) -> bool {
        self.has_error(ErrorCode::InternalError)
    }

    pub fn is_authentication_failure(&self) -> bool {
        self.has_error(ErrorCode::AuthenticationFailure)
    }

    pub fn is_invalid_module(&self) -> bool {
        self.has_error(ErrorCode::InvalidModule)
    }

    pub fn is_no_permission(&self) -> bool {
        self.has_error(ErrorCode::NoPermission)
    }

    pub fn is_mandatory_not_found(&self) -> bool {
        self.has_error(ErrorCode::MandatoryNotFound)
    }

    pub fn is_record_in_blueprint(&self) -> bool {
        self.has_error(ErrorCode::RecordInBlueprint)
    }

    /// Human-readable message of the (first) error object
    ///
    /// Field type mismatches are spelled out, e.g.
    /// `bad id, expected integer for 'id' in Contact`.
    pub fn msg(&self) -> Option<String> {
        let first = match self.data() {
            Value::Array(items) => items.first()?,
            other => other,
        };

        let mut msg = first.get("message")?.as_str()?.to_string();

        let details = first.get("details");
        if let Some(expected) = details.and_then(|d| d.get("expected_data_type")) {
            let field = details
                .and_then(|d| d.get("api_name"))
                .map(display_value)
                .unwrap_or_default();
            msg.push_str(&format!(
                ", expected {} for '{}'",
                display_value(expected),
                field
            ));

            if let Some(parent) = details.and_then(|d| d.get("parent_api_name")) {
                msg.push_str(&format!(" in {}", display_value(parent)));
            }
        }

        Some(msg)
    }
}

impl From<Value> for ApiResponse {
    fn from(body: Value) -> Self {
        Self::new(body)
    }
}

fn find_module_entry<'a>(map: &'a Map<String, Value>, module: &str) -> Option<&'a Value> {
    let module = module.to_ascii_lowercase();
    let candidates = || map.iter().filter(|(key, _)| key.as_str() != "module_name");

    candidates()
        .find(|(key, _)| key.to_ascii_lowercase() == module)
        .or_else(|| candidates().find(|(key, _)| key.to_ascii_lowercase().contains(&module)))
        .map(|(_, value)| value)
}

fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
