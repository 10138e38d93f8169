use hyper::http;
use std::{fmt::Display, io};

#[derive(Debug)]
pub enum Error {
    InvalidRequest(String),
    MissingCredentials(String),
    UnknownState(String),
    NetworkFailure(String),
    InvalidContractFormat(String),
    ContractLoadError(Box<dyn std::error::Error + Send + Sync>),
    InvalidHeaderName,
    InvalidHeaderValue,
    ParseUriError,
    HyperError(hyper::Error),
    HttpError(http::Error),
    IoError(io::Error),
    JsonError(serde_json::Error),
}

impl std::error::Error for Error {}

impl Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::InvalidRequest(reason) => write!(f, "The request can't be signed: {}", reason),
            Error::MissingCredentials(reason) => write!(f, "Missing credentials: {}", reason),
            Error::UnknownState(name) => {
                write!(f, "No state handler is registered for \"{}\"", name)
            }
            Error::NetworkFailure(reason) => write!(f, "Network failure: {}", reason),
            Error::InvalidContractFormat(reason) => {
                write!(f, "The contract format is invalid: {}", reason)
            }
            Error::ContractLoadError(e) => write!(f, "Couldn't load the contract: {}", e),
            Error::InvalidHeaderName => write!(f, "Invalid header name"),
            Error::InvalidHeaderValue => write!(f, "Invalid header value"),
            Error::ParseUriError => write!(f, "Parse URI Error"),
            Error::HyperError(e) => write!(f, "Hyper error: {}", e),
            Error::HttpError(e) => write!(f, "Http Error: {}", e),
            Error::IoError(e) => write!(f, "IoError: {}", e),
            Error::JsonError(e) => write!(f, "Json error: {}", e),
        }
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Error::IoError(e)
    }
}

impl From<hyper::header::InvalidHeaderName> for Error {
    fn from(_: hyper::header::InvalidHeaderName) -> Self {
        Error::InvalidHeaderName
    }
}

impl From<hyper::header::InvalidHeaderValue> for Error {
    fn from(_: hyper::header::InvalidHeaderValue) -> Self {
        Error::InvalidHeaderValue
    }
}

impl From<hyper::Error> for Error {
    fn from(e: hyper::Error) -> Self {
        Error::HyperError(e)
    }
}

impl From<http::Error> for Error {
    fn from(e: http::Error) -> Self {
        Error::HttpError(e)
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::JsonError(e)
    }
}
