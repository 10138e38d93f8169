use crate::error::Error;
use crate::matching::Matcher;
use hyper::Method;
use serde_json::Value;
use std::{
    fmt::Debug,
    fs,
    path::{Path, PathBuf},
};

#[derive(Debug, Clone)]
pub struct Interaction {
    pub description: String,
    pub provider_state: Option<String>,
    pub request: RequestTemplate,
    pub response: ResponseTemplate,
}

#[derive(Debug, Clone)]
pub struct RequestTemplate {
    pub method: Method,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub headers: Vec<(String, Matcher)>,
    pub body: Option<Matcher>,
}

#[derive(Debug, Clone)]
pub struct ResponseTemplate {
    pub status: u16,
    pub headers: Vec<(String, Matcher)>,
    pub body: Option<Matcher>,
}

#[derive(Debug)]
pub struct InteractionBuilder {
    description: String,
    provider_state: Option<String>,
    method: Method,
    path: String,
    query: Vec<(String, String)>,
    request_headers: Vec<(String, Matcher)>,
    request_body: Option<Matcher>,
    status: u16,
    response_headers: Vec<(String, Matcher)>,
    response_body: Option<Matcher>,
}

impl InteractionBuilder {
    pub fn upon_receiving<S: Into<String>>(description: S) -> Self {
        Self {
            description: description.into(),
            provider_state: None,
            method: Method::GET,
            path: String::from("/"),
            query: Vec::new(),
            request_headers: Vec::new(),
            request_body: None,
            status: 200,
            response_headers: Vec::new(),
            response_body: None,
        }
    }

    pub fn given<S: Into<String>>(mut self, provider_state: S) -> Self {
        self.provider_state = Some(provider_state.into());
        self
    }

    pub fn with_request<S: Into<String>>(mut self, method: Method, path: S) -> Self {
        self.method = method;
        self.path = path.into();
        self
    }

    pub fn with_query<S1: Into<String>, S2: Into<String>>(mut self, key: S1, value: S2) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    pub fn with_request_header<S: Into<String>>(mut self, name: S, matcher: Matcher) -> Self {
        self.request_headers.push((name.into(), matcher));
        self
    }

    pub fn with_request_body(mut self, matcher: Matcher) -> Self {
        self.request_body = Some(matcher);
        self
    }

    pub fn will_respond_with(mut self, status: u16) -> Self {
        self.status = status;
        self
    }

    pub fn with_response_header<S: Into<String>>(mut self, name: S, matcher: Matcher) -> Self {
        self.response_headers.push((name.into(), matcher));
        self
    }

    pub fn with_response_body(mut self, matcher: Matcher) -> Self {
        self.response_body = Some(matcher);
        self
    }

    pub fn build(self) -> Interaction {
        Interaction {
            description: self.description,
            provider_state: self.provider_state,
            request: RequestTemplate {
                method: self.method,
                path: self.path,
                query: self.query,
                headers: self.request_headers,
                body: self.request_body,
            },
            response: ResponseTemplate {
                status: self.status,
                headers: self.response_headers,
                body: self.response_body,
            },
        }
    }
}

pub trait ContractSource: Debug {
    fn load_interactions(
        &self,
    ) -> Result<Vec<Interaction>, Box<dyn std::error::Error + Send + Sync>>;
}

/// Loads interactions from a contract document, or from every `.json`
/// document in a directory.
#[derive(Debug)]
pub struct FileContractSource {
    path: PathBuf,
}

impl FileContractSource {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }
}

impl ContractSource for FileContractSource {
    fn load_interactions(
        &self,
    ) -> Result<Vec<Interaction>, Box<dyn std::error::Error + Send + Sync>> {
        let mut interactions = Vec::new();

        if self.path.is_dir() {
            let mut paths = fs::read_dir(&self.path)?
                .filter_map(|entry| entry.ok().map(|entry| entry.path()))
                .filter(|path| path.extension().map_or(false, |extension| extension == "json"))
                .collect::<Vec<_>>();
            paths.sort();

            if paths.is_empty() {
                return Err(Box::new(Error::InvalidContractFormat(format!(
                    "no contract documents found in {}",
                    self.path.display()
                ))));
            }

            for path in paths {
                interactions.extend(load_document(&path)?);
            }
        } else {
            interactions.extend(load_document(&self.path)?);
        }

        Ok(interactions)
    }
}

fn load_document(path: &Path) -> Result<Vec<Interaction>, Box<dyn std::error::Error + Send + Sync>> {
    let text = fs::read_to_string(path)?;
    Ok(parse_document(&text)?)
}

#[derive(Debug, Clone, Default)]
pub struct InMemoryContractSource {
    interactions: Vec<Interaction>,
}

impl InMemoryContractSource {
    pub fn new(interactions: Vec<Interaction>) -> Self {
        Self { interactions }
    }
}

impl ContractSource for InMemoryContractSource {
    fn load_interactions(
        &self,
    ) -> Result<Vec<Interaction>, Box<dyn std::error::Error + Send + Sync>> {
        Ok(self.interactions.clone())
    }
}

pub fn parse_document(text: &str) -> Result<Vec<Interaction>, Error> {
    let document: Value = serde_json::from_str(text)?;

    let interactions = document
        .get("interactions")
        .and_then(Value::as_array)
        .ok_or_else(|| {
            Error::InvalidContractFormat(
                "a contract document requires an \"interactions\" array".into(),
            )
        })?;

    interactions.iter().map(parse_interaction).collect()
}

fn parse_interaction(value: &Value) -> Result<Interaction, Error> {
    let description = value
        .get("description")
        .and_then(Value::as_str)
        .ok_or_else(|| {
            Error::InvalidContractFormat("an interaction requires a \"description\"".into())
        })?
        .to_string();

    let provider_state = value
        .get("providerState")
        .and_then(Value::as_str)
        .map(String::from);

    let request = parse_request(value.get("request").ok_or_else(|| {
        Error::InvalidContractFormat(format!("\"{}\" has no request template", description))
    })?)?;

    let response = parse_response(value.get("response").ok_or_else(|| {
        Error::InvalidContractFormat(format!("\"{}\" has no response template", description))
    })?)?;

    Ok(Interaction {
        description,
        provider_state,
        request,
        response,
    })
}

fn parse_request(value: &Value) -> Result<RequestTemplate, Error> {
    let method = value
        .get("method")
        .and_then(Value::as_str)
        .ok_or_else(|| Error::InvalidContractFormat("a request requires a \"method\"".into()))?;
    let method = method.parse::<Method>().map_err(|_| {
        Error::InvalidContractFormat(format!("unknown http method \"{}\"", method))
    })?;

    let path = value
        .get("path")
        .and_then(Value::as_str)
        .ok_or_else(|| Error::InvalidContractFormat("a request requires a \"path\"".into()))?
        .to_string();

    let query = parse_query_section(value.get("query"))?;
    let headers = parse_header_section(value.get("headers"))?;
    let body = match value.get("body") {
        Some(body) => Some(Matcher::from_json(body)?),
        None => None,
    };

    Ok(RequestTemplate {
        method,
        path,
        query,
        headers,
        body,
    })
}

fn parse_response(value: &Value) -> Result<ResponseTemplate, Error> {
    let status = value
        .get("status")
        .and_then(Value::as_u64)
        .filter(|status| *status <= u16::MAX as u64)
        .ok_or_else(|| {
            Error::InvalidContractFormat("a response requires a numeric \"status\"".into())
        })? as u16;

    let headers = parse_header_section(value.get("headers"))?;
    let body = match value.get("body") {
        Some(body) => Some(Matcher::from_json(body)?),
        None => None,
    };

    Ok(ResponseTemplate {
        status,
        headers,
        body,
    })
}

fn parse_query_section(value: Option<&Value>) -> Result<Vec<(String, String)>, Error> {
    let mut pairs = Vec::new();

    if let Some(value) = value {
        let map = value.as_object().ok_or_else(|| {
            Error::InvalidContractFormat("\"query\" must be an object".into())
        })?;

        for (key, entry) in map {
            match entry {
                Value::String(single) => pairs.push((key.clone(), single.clone())),
                Value::Array(values) => {
                    for value in values {
                        let value = value.as_str().ok_or_else(|| {
                            Error::InvalidContractFormat(format!(
                                "query values for \"{}\" must be strings",
                                key
                            ))
                        })?;
                        pairs.push((key.clone(), value.to_string()));
                    }
                }
                _ => {
                    return Err(Error::InvalidContractFormat(format!(
                        "query values for \"{}\" must be strings",
                        key
                    )))
                }
            }
        }
    }

    Ok(pairs)
}

fn parse_header_section(value: Option<&Value>) -> Result<Vec<(String, Matcher)>, Error> {
    let mut headers = Vec::new();

    if let Some(value) = value {
        let map = value.as_object().ok_or_else(|| {
            Error::InvalidContractFormat("\"headers\" must be an object".into())
        })?;

        for (name, entry) in map {
            headers.push((name.clone(), Matcher::from_json(entry)?));
        }
    }

    Ok(headers)
}
