use crate::canonical::{canonicalize, SigningRequest};
use crate::error::Error;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};
use std::{collections::HashMap, env, fmt};

type HmacSha256 = Hmac<Sha256>;

pub const ALGORITHM: &str = "AWS4-HMAC-SHA256";

const SCOPE_TERMINATOR: &str = "aws4_request";

#[derive(Clone)]
pub struct Credentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: Option<String>,
}

impl Credentials {
    pub fn new<S1: Into<String>, S2: Into<String>>(
        access_key_id: S1,
        secret_access_key: S2,
        session_token: Option<String>,
    ) -> Self {
        Self {
            access_key_id: access_key_id.into(),
            secret_access_key: secret_access_key.into(),
            session_token,
        }
    }

    pub fn from_env() -> Result<Self, Error> {
        let access_key_id = env::var("AWS_ACCESS_KEY_ID").unwrap_or_default();
        if access_key_id.is_empty() {
            return Err(Error::MissingCredentials(
                "AWS_ACCESS_KEY_ID is not set".into(),
            ));
        }

        let secret_access_key = env::var("AWS_SECRET_ACCESS_KEY").unwrap_or_default();
        if secret_access_key.is_empty() {
            return Err(Error::MissingCredentials(
                "AWS_SECRET_ACCESS_KEY is not set".into(),
            ));
        }

        let session_token = env::var("AWS_SESSION_TOKEN")
            .ok()
            .filter(|token| !token.is_empty());

        Ok(Self {
            access_key_id,
            secret_access_key,
            session_token,
        })
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // the secret must never reach a log line
        f.debug_struct("Credentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .field("session_token", &self.session_token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

pub trait ProvideCredentials: fmt::Debug + Send + Sync {
    fn credentials(&self) -> Result<Credentials, Error>;
}

/// Reads the credentials from the process environment on every call, so a
/// rotated secret is picked up by the next signing without a restart.
#[derive(Debug, Default)]
pub struct EnvCredentials;

impl ProvideCredentials for EnvCredentials {
    fn credentials(&self) -> Result<Credentials, Error> {
        Credentials::from_env()
    }
}

#[derive(Debug, Clone)]
pub struct StaticCredentials {
    credentials: Credentials,
}

impl StaticCredentials {
    pub fn new(credentials: Credentials) -> Self {
        Self { credentials }
    }
}

impl ProvideCredentials for StaticCredentials {
    fn credentials(&self) -> Result<Credentials, Error> {
        Ok(self.credentials.clone())
    }
}

#[derive(Debug, Clone)]
pub struct SigningScope {
    pub region: String,
    pub service: String,
}

impl SigningScope {
    pub fn new<S1: Into<String>, S2: Into<String>>(region: S1, service: S2) -> Self {
        Self {
            region: region.into(),
            service: service.into(),
        }
    }

    pub fn credential_scope(&self, date_stamp: &str) -> String {
        format!(
            "{}/{}/{}/{}",
            date_stamp, self.region, self.service, SCOPE_TERMINATOR
        )
    }
}

#[derive(Debug, Clone)]
pub struct SignedHeaders {
    pub host: String,
    pub amz_date: String,
    pub authorization: String,
    pub security_token: Option<String>,
}

impl SignedHeaders {
    /// Splices the computed headers into a header map, overwriting any
    /// placeholder values regardless of their casing.
    pub fn apply_to(&self, headers: &mut HashMap<String, String>) {
        for name in ["host", "x-amz-date", "authorization", "x-amz-security-token"].iter() {
            let existing = headers
                .keys()
                .filter(|key| key.eq_ignore_ascii_case(name))
                .cloned()
                .collect::<Vec<_>>();
            for key in existing {
                headers.remove(&key);
            }
        }

        headers.insert(String::from("Host"), self.host.clone());
        headers.insert(String::from("X-Amz-Date"), self.amz_date.clone());
        headers.insert(String::from("Authorization"), self.authorization.clone());
        if let Some(token) = &self.security_token {
            headers.insert(String::from("X-Amz-Security-Token"), token.clone());
        }
    }
}

pub fn sign(
    request: &SigningRequest,
    credentials: &Credentials,
    scope: &SigningScope,
    timestamp: DateTime<Utc>,
) -> Result<SignedHeaders, Error> {
    if credentials.access_key_id.is_empty() || credentials.secret_access_key.is_empty() {
        return Err(Error::MissingCredentials(
            "an access key id and a secret access key are required".into(),
        ));
    }

    let date_stamp = timestamp.format("%Y%m%d").to_string();
    let amz_date = timestamp.format("%Y%m%dT%H%M%SZ").to_string();

    let host = request
        .headers
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case("host"))
        .map(|(_, value)| value.clone())
        .ok_or_else(|| Error::InvalidRequest("a host header is required for signing".into()))?;

    let mut request = request.clone();
    request
        .headers
        .insert(String::from("x-amz-date"), amz_date.clone());
    if let Some(token) = &credentials.session_token {
        request
            .headers
            .insert(String::from("x-amz-security-token"), token.clone());
    }

    let canonical = canonicalize(&request)?;
    let credential_scope = scope.credential_scope(&date_stamp);

    let string_to_sign = format!(
        "{}\n{}\n{}\n{}",
        ALGORITHM,
        amz_date,
        credential_scope,
        hex::encode(Sha256::digest(canonical.text.as_bytes()))
    );

    let signing_key = derive_signing_key(&credentials.secret_access_key, &date_stamp, scope);
    let signature = hex::encode(hmac_sha256(&signing_key, string_to_sign.as_bytes()));

    let authorization = format!(
        "{} Credential={}/{}, SignedHeaders={}, Signature={}",
        ALGORITHM, credentials.access_key_id, credential_scope, canonical.signed_headers, signature
    );

    Ok(SignedHeaders {
        host,
        amz_date,
        authorization,
        security_token: credentials.session_token.clone(),
    })
}

// the chained derivation is a fold over the scope parts so the sequence
// can't drift out of step with the credential scope string
fn derive_signing_key(secret: &str, date_stamp: &str, scope: &SigningScope) -> Vec<u8> {
    let mut key = format!("AWS4{}", secret).into_bytes();
    for part in [
        date_stamp,
        scope.region.as_str(),
        scope.service.as_str(),
        SCOPE_TERMINATOR,
    ]
    .iter()
    {
        key = hmac_sha256(&key, part.as_bytes());
    }

    key
}

fn hmac_sha256(key: &[u8], data: &[u8]) -> Vec<u8> {
    let mut mac =
        HmacSha256::new_from_slice(key).expect("HMAC-SHA256 accepts keys of any length");
    mac.update(data);
    mac.finalize().into_bytes().to_vec()
}
