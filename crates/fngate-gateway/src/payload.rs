//! Request payload extraction.
//!
//! [`DefaultPayloadExtractor`] turns an inbound request into one JSON value:
//!
//! - JSON-compatible bodies (`application/json`, `application/*+json`) are
//!   parsed verbatim; an empty JSON body yields `{}`.
//! - Anything else is treated as form data. Query-string pairs are read
//!   first, then `application/x-www-form-urlencoded` body pairs. A key seen
//!   once becomes a scalar, a key repeated within one source becomes a list,
//!   and body values replace query values for the same key.
//! - Multipart requests are refused.
//!
//! ```text
//! ?say=hello&to=arawn   +   to=minchan   =>   {"say":"hello","to":"minchan"}
//! ?k=v1&k=v2                                  {"k":["v1","v2"]}
//! ?flag                                       {"flag":null}
//! ```

use std::collections::BTreeMap;

use bytes::Bytes;
use fngate_kernel::gateway::GatewayRequest;
use serde_json::{Map, Value};
use thiserror::Error;

/// Content type assumed when the request declares none.
pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Failure to derive a payload from a request.
#[derive(Debug, Error)]
pub enum PayloadError {
    #[error("multipart content is not supported: {0}")]
    UnsupportedMultipart(String),

    #[error("invalid content type '{0}'")]
    InvalidContentType(String),

    #[error("failed to read request content: {0}")]
    ContentRead(String),
}

/// Derives the structured payload sent to a function.
pub trait PayloadExtractor: Send + Sync {
    fn extract(&self, request: &GatewayRequest) -> Result<Value, PayloadError>;

    /// The extracted payload rendered as JSON bytes.
    fn extract_bytes(&self, request: &GatewayRequest) -> Result<Bytes, PayloadError> {
        let value = self.extract(request)?;
        serde_json::to_vec(&value)
            .map(Bytes::from)
            .map_err(|e| PayloadError::ContentRead(e.to_string()))
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultPayloadExtractor;

impl DefaultPayloadExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl PayloadExtractor for DefaultPayloadExtractor {
    fn extract(&self, request: &GatewayRequest) -> Result<Value, PayloadError> {
        let media = MediaType::parse(request.content_type().unwrap_or(DEFAULT_CONTENT_TYPE))?;

        if media.is_multipart() {
            return Err(PayloadError::UnsupportedMultipart(media.essence()));
        }

        if media.is_json_compatible() {
            if request.has_empty_body() {
                return Ok(Value::Object(Map::new()));
            }
            return serde_json::from_slice(&request.body)
                .map_err(|e| PayloadError::ContentRead(e.to_string()));
        }

        let mut fields = match request.query.as_deref() {
            Some(query) => parse_pairs(query.as_bytes(), Source::Query)?,
            None => BTreeMap::new(),
        };
        if !request.has_empty_body() {
            // Body values win over query values for the same key.
            fields.extend(parse_pairs(&request.body, Source::Body)?);
        }

        Ok(Value::Object(
            fields
                .into_iter()
                .map(|(key, mut values)| {
                    let value = if values.len() == 1 {
                        values.remove(0)
                    } else {
                        Value::Array(values)
                    };
                    (key, value)
                })
                .collect(),
        ))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Content type
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, PartialEq, Eq)]
struct MediaType {
    kind: String,
    subtype: String,
}

impl MediaType {
    /// Parse `type/subtype[; params]`; parameters are ignored.
    fn parse(raw: &str) -> Result<Self, PayloadError> {
        let invalid = || PayloadError::InvalidContentType(raw.to_string());
        let essence = raw.split(';').next().unwrap_or_default().trim();
        let (kind, subtype) = essence.split_once('/').ok_or_else(invalid)?;
        let is_token = |s: &str| {
            !s.is_empty()
                && s.chars()
                    .all(|c| c.is_ascii_graphic() && !"()<>@,;:\\\"/[]?={}".contains(c))
        };
        if !is_token(kind) || !is_token(subtype) {
            return Err(invalid());
        }
        Ok(Self {
            kind: kind.to_ascii_lowercase(),
            subtype: subtype.to_ascii_lowercase(),
        })
    }

    fn is_multipart(&self) -> bool {
        self.kind == "multipart"
    }

    fn is_json_compatible(&self) -> bool {
        self.kind == "application" && (self.subtype == "json" || self.subtype.ends_with("+json"))
    }

    fn essence(&self) -> String {
        format!("{}/{}", self.kind, self.subtype)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Form decoding
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Source {
    Query,
    Body,
}

/// Split `a=1&b&c=` into per-key value lists.
///
/// A key without `=` is `null` in both sources. An empty value (`c=`) is
/// `null` in the query string and `""` in a form body.
fn parse_pairs(input: &[u8], source: Source) -> Result<BTreeMap<String, Vec<Value>>, PayloadError> {
    let mut fields: BTreeMap<String, Vec<Value>> = BTreeMap::new();

    for pair in input.split(|b| *b == b'&').filter(|p| !p.is_empty()) {
        let (raw_key, raw_value) = match pair.iter().position(|b| *b == b'=') {
            Some(at) => (&pair[..at], Some(&pair[at + 1..])),
            None => (pair, None),
        };

        let key = decode_component(raw_key)?;
        let value = match raw_value {
            None => Value::Null,
            Some(v) if v.is_empty() && source == Source::Query => Value::Null,
            Some(v) => Value::String(decode_component(v)?),
        };
        fields.entry(key).or_default().push(value);
    }

    Ok(fields)
}

/// Decode one `application/x-www-form-urlencoded` component.
///
/// `+` is a space; `%` must be followed by two hex digits and the decoded
/// bytes must be UTF-8.
fn decode_component(raw: &[u8]) -> Result<String, PayloadError> {
    let mut decoded = Vec::with_capacity(raw.len());
    let mut i = 0;
    while i < raw.len() {
        match raw[i] {
            b'+' => decoded.push(b' '),
            b'%' => {
                let hi = raw.get(i + 1).and_then(|b| hex_value(*b));
                let lo = raw.get(i + 2).and_then(|b| hex_value(*b));
                let (Some(hi), Some(lo)) = (hi, lo) else {
                    return Err(PayloadError::ContentRead(format!(
                        "malformed percent-encoding in '{}'",
                        String::from_utf8_lossy(raw)
                    )));
                };
                decoded.push(hi << 4 | lo);
                i += 2;
            }
            other => decoded.push(other),
        }
        i += 1;
    }

    String::from_utf8(decoded).map_err(|e| PayloadError::ContentRead(e.to_string()))
}

fn hex_value(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}
