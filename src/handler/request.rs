//! Request decomposition
//!
//! Turns the request target and body into a `ParsedRequest`: decoded path
//! segments, query parameters and a body variant chosen once from the
//! Content-Type.

use hyper::body::Bytes;
use std::fmt;
use url::form_urlencoded;

/// Request decomposition errors, all client errors
#[derive(Debug, thiserror::Error)]
pub enum RequestError {
    #[error("Invalid percent-encoding in path segment '{0}'")]
    InvalidPath(String),

    #[error("Invalid JSON body: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("Failed to read request body: {0}")]
    Body(String),
}

/// Ordered string multimap; duplicate keys keep every value in arrival order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Params(Vec<(String, String)>);

impl Params {
    /// Parse `application/x-www-form-urlencoded` input (also query strings)
    pub fn parse(input: &[u8]) -> Self {
        Self(form_urlencoded::parse(input).into_owned().collect())
    }

    /// First value of `key`
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}

/// Request body, decoded according to its Content-Type
#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    /// Absent body or a content type we do not decode
    Unparsed(Bytes),
    FormEncoded(Params),
    Json(serde_json::Value),
}

impl RequestBody {
    /// Select the variant from the Content-Type media type.
    ///
    /// A declared form body replaces the query even when it is empty; an empty
    /// JSON body is malformed JSON.
    pub fn decode(content_type: Option<&str>, raw: Bytes) -> Result<Self, RequestError> {
        match content_type.map(media_type) {
            Some(t) if t.eq_ignore_ascii_case("application/x-www-form-urlencoded") => {
                Ok(Self::FormEncoded(Params::parse(&raw)))
            }
            Some(t) if t.eq_ignore_ascii_case("application/json") => {
                Ok(Self::Json(serde_json::from_slice(&raw)?))
            }
            _ => Ok(Self::Unparsed(raw)),
        }
    }

    /// Short description for diagnostics
    pub fn summary(&self) -> String {
        match self {
            Self::Unparsed(raw) if raw.is_empty() => "empty".to_string(),
            Self::Unparsed(raw) => format!("{} bytes unparsed", raw.len()),
            Self::FormEncoded(params) => format!("form, {} params", params.len()),
            Self::Json(_) => "json".to_string(),
        }
    }
}

/// Effective parameter set of a request
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ParamSet<'a> {
    Pairs(&'a Params),
    Json(&'a serde_json::Value),
}

impl ParamSet<'_> {
    /// First value of `key`; JSON scalars are rendered as strings
    pub fn get(&self, key: &str) -> Option<String> {
        match self {
            Self::Pairs(params) => params.get(key).map(ToString::to_string),
            Self::Json(value) => match value.get(key)? {
                serde_json::Value::String(s) => Some(s.clone()),
                serde_json::Value::Null => None,
                other => Some(other.to_string()),
            },
        }
    }
}

/// A request decomposed for routing; lives for one request only
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedRequest {
    /// Percent-decoded path segments, without the leading empty one
    pub path_segments: Vec<String>,
    pub query: Params,
    pub body: RequestBody,
}

impl ParsedRequest {
    /// Decompose a request.
    ///
    /// Without a Content-Length the body is ignored and treated as empty.
    pub fn from_parts(
        path: &str,
        query: Option<&str>,
        content_type: Option<&str>,
        has_content_length: bool,
        body: Bytes,
    ) -> Result<Self, RequestError> {
        let body = if has_content_length {
            RequestBody::decode(content_type, body)?
        } else {
            RequestBody::Unparsed(Bytes::new())
        };

        Ok(Self {
            path_segments: split_path(path)?,
            query: query.map(|q| Params::parse(q.as_bytes())).unwrap_or_default(),
            body,
        })
    }

    /// First segment, selects the handler
    pub fn route(&self) -> &str {
        self.segment(0).unwrap_or_default()
    }

    pub fn segment(&self, index: usize) -> Option<&str> {
        self.path_segments.get(index).map(String::as_str)
    }

    /// Parameters after body decoding: a form or JSON body replaces the query
    pub fn params(&self) -> ParamSet<'_> {
        match &self.body {
            RequestBody::FormEncoded(params) => ParamSet::Pairs(params),
            RequestBody::Json(value) => ParamSet::Json(value),
            RequestBody::Unparsed(_) => ParamSet::Pairs(&self.query),
        }
    }
}

impl fmt::Display for ParsedRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}", self.path_segments.join("/"))
    }
}

/// Split a path on `/` and percent-decode each segment
pub fn split_path(path: &str) -> Result<Vec<String>, RequestError> {
    path.split('/')
        .skip(1)
        .map(|segment| {
            urlencoding::decode(segment)
                .map(std::borrow::Cow::into_owned)
                .map_err(|_| RequestError::InvalidPath(segment.to_string()))
        })
        .collect()
}

/// Media type of a Content-Type value, without parameters
fn media_type(content_type: &str) -> &str {
    content_type.split(';').next().unwrap_or_default().trim()
}
