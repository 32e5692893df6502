//! Rendering of configured call templates into concrete requests.

use reqwest::Method;
use serde_json::Value;
use url::form_urlencoded;

use crate::config::CallTemplate;

const INPUT_PLACEHOLDER: &str = "{input}";

/// Optional query and JSON body of an outbound call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CallParams {
    pub query: Vec<(String, String)>,
    pub body: Option<serde_json::Value>,
}

/// Fully rendered request for one call of one inbound request.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedCall {
    pub method: Method,
    pub path: String,
    pub params: CallParams,
}

/// Whether `input` would become a `.` or `..` path segment once substituted.
///
/// URL parsers resolve these (and their `%2e` spellings) against the
/// template path, so such inputs must be rejected before rendering.
pub fn is_dot_segment(input: &str) -> bool {
    matches!(input, "." | "..")
}

/// Substitute `{input}` into the template. Path substitutions are encoded as a
/// single path segment; query values are encoded later by the HTTP client;
/// string leaves of the JSON body are substituted verbatim.
pub fn render(template: &CallTemplate, input: &str) -> RenderedCall {
    let method = Method::from_bytes(template.method.as_bytes()).unwrap_or(Method::GET);
    let path = template.path.replace(INPUT_PLACEHOLDER, &encode_path_segment(input));
    let query = template
        .query
        .iter()
        .map(|(k, v)| (k.clone(), v.replace(INPUT_PLACEHOLDER, input)))
        .collect();
    let body = template.body.as_ref().map(|body| substitute(body, input));

    RenderedCall {
        method,
        path,
        params: CallParams { query, body },
    }
}

fn substitute(value: &Value, input: &str) -> Value {
    match value {
        Value::String(s) => Value::String(s.replace(INPUT_PLACEHOLDER, input)),
        Value::Array(items) => Value::Array(items.iter().map(|v| substitute(v, input)).collect()),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), substitute(v, input)))
                .collect(),
        ),
        other => other.clone(),
    }
}

/// Percent-encode everything except ASCII alphanumerics and `-._*`.
pub fn encode_path_segment(raw: &str) -> String {
    // form encoding turns ' ' into '+' and escapes a literal '+', so the swap is lossless
    form_urlencoded::byte_serialize(raw.as_bytes())
        .collect::<String>()
        .replace('+', "%20")
}
