use std::fmt::Display;

#[derive(Debug)]
pub enum Error {
    Unauthorized,
    Provider(String),
    SigningError(sigpact::Error),
    ReqwestError(reqwest::Error),
    DeserializationError(serde_json::Error),
}

impl std::error::Error for Error {}

impl From<sigpact::Error> for Error {
    fn from(e: sigpact::Error) -> Self {
        Error::SigningError(e)
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::ReqwestError(e)
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::DeserializationError(e)
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Unauthorized => write!(f, "Unauthorized."),
            Error::Provider(message) => write!(f, "{}", message),
            Error::SigningError(e) => write!(f, "{}", e.to_string()),
            Error::ReqwestError(e) => write!(f, "{}", e.to_string()),
            Error::DeserializationError(e) => write!(f, "{}", e.to_string()),
        }
    }
}
