use crate::error::Error;
use hyper::Method;
use lazy_static::lazy_static;
use regex::Regex;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

lazy_static! {
    static ref WHITESPACE_RUN: Regex = Regex::new(r"\s+").unwrap();
}

/// SHA-256 of the empty string, the payload hash of a bodyless request.
pub const EMPTY_PAYLOAD_HASH: &str =
    "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855";

#[derive(Debug, Clone)]
pub struct SigningRequest {
    pub method: Method,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub headers: BTreeMap<String, String>,
    pub body: Option<Vec<u8>>,
}

impl SigningRequest {
    pub fn new<S: Into<String>>(method: Method, path: S) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            headers: BTreeMap::new(),
            body: None,
        }
    }

    pub fn with_header<S1: Into<String>, S2: Into<String>>(mut self, name: S1, value: S2) -> Self {
        self.headers.insert(name.into().to_lowercase(), value.into());
        self
    }

    pub fn with_query<S1: Into<String>, S2: Into<String>>(mut self, key: S1, value: S2) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    pub fn with_body<B: Into<Vec<u8>>>(mut self, body: B) -> Self {
        self.body = Some(body.into());
        self
    }
}

#[derive(Debug, Clone)]
pub struct CanonicalRequest {
    pub text: String,
    pub signed_headers: String,
    pub payload_hash: String,
}

pub fn canonicalize(request: &SigningRequest) -> Result<CanonicalRequest, Error> {
    let path = canonical_path(&request.path)?;
    let query = canonical_query(&request.query);

    // lower-case the names before sorting so mixed-case input lands in the
    // same order as pre-lowered input; same-name values are comma-joined
    let mut canonical_headers: BTreeMap<String, String> = BTreeMap::new();
    for (name, value) in &request.headers {
        let name = name.to_lowercase();
        let value = canonical_header_value(value);
        match canonical_headers.get_mut(&name) {
            Some(existing) => {
                existing.push(',');
                existing.push_str(&value);
            }
            None => {
                canonical_headers.insert(name, value);
            }
        }
    }

    if !canonical_headers.contains_key("host") {
        return Err(Error::InvalidRequest(
            "a host header is required for signing".into(),
        ));
    }
    if !canonical_headers.contains_key("x-amz-date") {
        return Err(Error::InvalidRequest(
            "an x-amz-date header is required for signing".into(),
        ));
    }
    if request.body.is_some() && !canonical_headers.contains_key("content-type") {
        return Err(Error::InvalidRequest(
            "a content-type header is required when the request has a body".into(),
        ));
    }

    let signed_headers = canonical_headers
        .keys()
        .cloned()
        .collect::<Vec<_>>()
        .join(";");

    let payload_hash = match &request.body {
        Some(body) => hex::encode(Sha256::digest(body)),
        None => String::from(EMPTY_PAYLOAD_HASH),
    };

    let headers_block = canonical_headers
        .iter()
        .map(|(name, value)| format!("{}:{}", name, value))
        .collect::<Vec<_>>()
        .join("\n");

    let text = format!(
        "{}\n{}\n{}\n{}\n\n{}\n{}",
        request.method.as_str(),
        path,
        query,
        headers_block,
        signed_headers,
        payload_hash
    );

    Ok(CanonicalRequest {
        text,
        signed_headers,
        payload_hash,
    })
}

fn canonical_header_value(value: &str) -> String {
    value
        .split(',')
        .map(|part| WHITESPACE_RUN.replace_all(part.trim(), " ").into_owned())
        .collect::<Vec<_>>()
        .join(",")
}

fn canonical_path(path: &str) -> Result<String, Error> {
    if path.is_empty() {
        return Ok(String::from("/"));
    }

    let mut segments = Vec::new();
    for segment in path.split('/') {
        let decoded = percent_decode(segment)?;
        segments.push(percent_encode(&decoded));
    }

    let joined = segments.join("/");
    if joined.starts_with('/') {
        Ok(joined)
    } else {
        Ok(format!("/{}", joined))
    }
}

fn canonical_query(query: &[(String, String)]) -> String {
    let mut pairs = query
        .iter()
        .map(|(key, value)| {
            (
                percent_encode(key.as_bytes()),
                percent_encode(value.as_bytes()),
            )
        })
        .collect::<Vec<_>>();
    pairs.sort();

    pairs
        .into_iter()
        .map(|(key, value)| format!("{}={}", key, value))
        .collect::<Vec<_>>()
        .join("&")
}

pub(crate) fn percent_encode(bytes: &[u8]) -> String {
    let mut encoded = String::with_capacity(bytes.len());
    for &byte in bytes {
        if is_unreserved(byte) {
            encoded.push(byte as char);
        } else {
            encoded.push_str(&format!("%{:02X}", byte));
        }
    }

    encoded
}

fn is_unreserved(byte: u8) -> bool {
    byte.is_ascii_alphanumeric() || matches!(byte, b'-' | b'.' | b'_' | b'~')
}

// malformed escapes are rejected, not repaired
fn percent_decode(input: &str) -> Result<Vec<u8>, Error> {
    let bytes = input.as_bytes();
    let mut decoded = Vec::with_capacity(bytes.len());
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'%' => {
                let escape = if i + 2 < bytes.len() {
                    match (hex_value(bytes[i + 1]), hex_value(bytes[i + 2])) {
                        (Some(high), Some(low)) => Some(high * 16 + low),
                        _ => None,
                    }
                } else {
                    None
                };

                match escape {
                    Some(byte) => {
                        decoded.push(byte);
                        i += 3;
                    }
                    None => {
                        return Err(Error::InvalidRequest(format!(
                            "malformed percent-encoding in \"{}\"",
                            input
                        )))
                    }
                }
            }
            byte => {
                decoded.push(byte);
                i += 1;
            }
        }
    }

    Ok(decoded)
}

fn hex_value(byte: u8) -> Option<u8> {
    match byte {
        b'0'..=b'9' => Some(byte - b'0'),
        b'a'..=b'f' => Some(byte - b'a' + 10),
        b'A'..=b'F' => Some(byte - b'A' + 10),
        _ => None,
    }
}

pub(crate) fn parse_query(raw: &str) -> Result<Vec<(String, String)>, Error> {
    let mut pairs = Vec::new();
    if raw.is_empty() {
        return Ok(pairs);
    }

    for part in raw.split('&') {
        if part.is_empty() {
            continue;
        }

        let (key, value) = match part.find('=') {
            Some(index) => (&part[..index], &part[index + 1..]),
            None => (part, ""),
        };

        pairs.push((decode_component(key)?, decode_component(value)?));
    }

    Ok(pairs)
}

fn decode_component(raw: &str) -> Result<String, Error> {
    let decoded = percent_decode(&raw.replace('+', " "))?;
    String::from_utf8(decoded)
        .map_err(|_| Error::InvalidRequest(format!("query component \"{}\" is not valid utf-8", raw)))
}
