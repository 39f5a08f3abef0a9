//! JSON response encoding and strict request decoding.
//!
//! Every response body is an [`Envelope`]. Request bodies are decoded with
//! [`decode_json`], which rejects empty bodies, trailing values and (for
//! targets declared `#[serde(deny_unknown_fields)]`) unknown keys, and turns
//! serde failures into messages that are safe to show to the client.

use axum::{
    body::{Body, Bytes},
    extract::{FromRequest, Request},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::Response,
};
use http_body_util::LengthLimitError;
use serde::{
    de::{DeserializeOwned, IgnoredAny},
    Deserialize, Serialize,
};
use serde_json::{ser::PrettyFormatter, Map, Value};
use serde_path_to_error::Segment;
use thiserror::Error;

use crate::http::response::ApiError;

/// Maximum accepted request body size (1 MiB).
pub const MAX_BODY_BYTES: usize = 1_048_576;

/// Top-level JSON object wrapping every response, e.g. `{"movie": {...}}`.
///
/// Keys keep insertion order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Envelope(Map<String, Value>);

impl Envelope {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    /// Insert any serializable value under `key`.
    pub fn with_serialized<T: Serialize + ?Sized>(
        self,
        key: impl Into<String>,
        value: &T,
    ) -> Result<Self, EncodeError> {
        let value = serde_json::to_value(value)?;
        Ok(self.with(key, value))
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[derive(Debug, Error)]
#[error("failed to encode response: {0}")]
pub struct EncodeError(#[from] serde_json::Error);

/// Pretty-print `data` with tab indentation and a trailing newline.
pub fn encode_envelope(data: &Envelope) -> Result<Vec<u8>, EncodeError> {
    let mut buf = Vec::with_capacity(256);
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, PrettyFormatter::with_indent(b"\t"));
    data.serialize(&mut ser)?;
    buf.push(b'\n');
    Ok(buf)
}

/// Build a JSON response. `Content-Type` is set first so `headers` may
/// override it.
pub fn write_json(
    status: StatusCode,
    data: &Envelope,
    headers: HeaderMap,
) -> Result<Response, EncodeError> {
    let body = encode_envelope(data)?;

    let mut response = Response::new(Body::from(body));
    *response.status_mut() = status;
    let response_headers = response.headers_mut();
    response_headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
    response_headers.extend(headers);
    Ok(response)
}

/// Why a request body could not be decoded.
///
/// Every variant except [`DecodeError::Internal`] is a client error whose
/// message can be returned verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("body contains badly-formed JSON (at character {offset})")]
    Syntax { offset: usize },

    #[error("body contains incorrect JSON type for field {field:?}")]
    IncorrectFieldType { field: String },

    #[error("body contains incorrect JSON type (at character {offset})")]
    IncorrectType { offset: usize },

    #[error("body contains badly-formed JSON")]
    Truncated,

    #[error("body must not be empty")]
    Empty,

    #[error("body contains unknown key {field:?}")]
    UnknownField { field: String },

    #[error("body must only contain a single JSON value")]
    TrailingData,

    #[error("body must not be larger than {limit} bytes")]
    TooLarge { limit: usize },

    #[error("{0}")]
    Other(String),

    /// The decoder was driven in a way no client input can cause.
    #[error("json decoder misuse: {0}")]
    Internal(String),
}

impl DecodeError {
    pub fn is_client_error(&self) -> bool {
        !matches!(self, DecodeError::Internal(_))
    }
}

/// Decode exactly one JSON value from `body` into `T`.
///
/// The first value is checked for well-formedness before it is decoded, so
/// a syntax or truncation error anywhere in it outranks a type or
/// unknown-key error that serde would otherwise report first.
pub fn decode_json<T: DeserializeOwned>(body: &[u8]) -> Result<T, DecodeError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Err(DecodeError::Empty);
    }

    let mut syntax = serde_json::Deserializer::from_slice(body);
    IgnoredAny::deserialize(&mut syntax).map_err(|err| classify(body, err, None))?;

    let mut de = serde_json::Deserializer::from_slice(body);
    let value = serde_path_to_error::deserialize(&mut de).map_err(|err| {
        let field = top_level_field(err.path());
        classify(body, err.into_inner(), field)
    })?;
    de.end().map_err(|_| DecodeError::TrailingData)?;
    Ok(value)
}

/// The top-level key a failure sits under; `genres[1]` reports as `genres`.
fn top_level_field(path: &serde_path_to_error::Path) -> Option<String> {
    match path.iter().next()? {
        Segment::Map { key } => Some(key.clone()),
        Segment::Enum { variant } => Some(variant.clone()),
        Segment::Seq { .. } | Segment::Unknown => None,
    }
}

fn classify(body: &[u8], err: serde_json::Error, field: Option<String>) -> DecodeError {
    use serde_json::error::Category;

    let offset = byte_offset(body, err.line(), err.column());

    match err.classify() {
        Category::Syntax => DecodeError::Syntax { offset },
        Category::Eof => DecodeError::Truncated,
        Category::Data => {
            let message = err.to_string();
            if let Some(name) = unknown_field_name(&message) {
                return DecodeError::UnknownField { field: name };
            }
            if message.starts_with("invalid type") || message.starts_with("invalid value") {
                return match field {
                    Some(field) => DecodeError::IncorrectFieldType { field },
                    None => DecodeError::IncorrectType { offset },
                };
            }
            DecodeError::Other(message)
        }
        // Slices never fail to read.
        Category::Io => DecodeError::Internal(err.to_string()),
    }
}

// serde reports "unknown field `name`, expected ..."; only the name is
// passed on so the target's shape is not disclosed.
fn unknown_field_name(message: &str) -> Option<String> {
    let rest = message.strip_prefix("unknown field `")?;
    let end = rest.find('`')?;
    Some(rest[..end].to_string())
}

fn byte_offset(body: &[u8], line: usize, column: usize) -> usize {
    if line <= 1 {
        return column;
    }
    let line_start = body
        .iter()
        .enumerate()
        .filter(|(_, b)| **b == b'\n')
        .nth(line - 2)
        .map(|(i, _)| i + 1)
        .unwrap_or(body.len());
    line_start + column
}

/// Read a request body, refusing anything over [`MAX_BODY_BYTES`].
pub async fn read_body(body: Body) -> Result<Bytes, DecodeError> {
    axum::body::to_bytes(body, MAX_BODY_BYTES)
        .await
        .map_err(|err| {
            let inner = err.into_inner();
            if inner.downcast_ref::<LengthLimitError>().is_some() {
                DecodeError::TooLarge { limit: MAX_BODY_BYTES }
            } else {
                DecodeError::Other(inner.to_string())
            }
        })
}

/// Extractor applying [`read_body`] and [`decode_json`].
pub struct StrictJson<T>(pub T);

impl<T, S> FromRequest<S> for StrictJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, _state: &S) -> Result<Self, Self::Rejection> {
        let bytes = read_body(req.into_body()).await?;
        let value = decode_json(&bytes)?;
        Ok(StrictJson(value))
    }
}
