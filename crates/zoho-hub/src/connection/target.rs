use reqwest::Method;
use serde_json::{Map, Value};
use std::fmt;
use url::Url;

use super::http::RequestBody;

/// Form field Zoho Invoice expects the record in
const JSON_STRING_FIELD: &str = "JSONString";

/// Which Zoho API surface a request is aimed at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Target {
    /// Zoho CRM, under the data centre's API domain
    #[default]
    Crm,
    /// Zoho Invoice, under its own fixed domain
    Invoice,
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::Crm => f.write_str("crm"),
            Target::Invoice => f.write_str("invoice"),
        }
    }
}

impl Target {
    /// Encodes `params` onto the request for this surface
    ///
    /// GET and DELETE carry params in the query string. Everything else sends
    /// a JSON body, except Invoice updates, which send a single form field.
    pub(crate) fn encode(self, method: &Method, url: &mut Url, params: &Value) -> RequestBody {
        if *method == Method::GET || *method == Method::DELETE {
            append_query(url, params);
            return RequestBody::Empty;
        }

        if params.is_null() {
            return RequestBody::Empty;
        }

        if self == Target::Invoice && *method == Method::PUT {
            return RequestBody::Form(vec![(
                JSON_STRING_FIELD.to_string(),
                invoice_json_string(params),
            )]);
        }

        RequestBody::Json(params.clone())
    }
}

fn append_query(url: &mut Url, params: &Value) {
    let Value::Object(map) = params else {
        return;
    };
    if map.values().all(Value::is_null) {
        return;
    }

    let mut pairs = url.query_pairs_mut();
    for (key, value) in map {
        match value {
            Value::Null => {}
            Value::String(s) => {
                pairs.append_pair(key, s);
            }
            other => {
                pairs.append_pair(key, &other.to_string());
            }
        }
    }
}

/// The record an Invoice update carries, keys lower-cased, as JSON text
///
/// Takes the first entry of `data` when present, else `params` itself.
fn invoice_json_string(params: &Value) -> String {
    let record = match params.get("data") {
        Some(Value::Array(items)) => items.first().unwrap_or(&Value::Null),
        _ => params,
    };

    let lowered = match record {
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(key, value)| (key.to_lowercase(), value.clone()))
                .collect::<Map<_, _>>(),
        ),
        Value::Null => Value::Object(Map::new()),
        other => other.clone(),
    };

    lowered.to_string()
}
