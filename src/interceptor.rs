use crate::{
    canonical::{self, SigningRequest},
    data::RequestData,
    error::Error,
    sigv4::{sign, EnvCredentials, ProvideCredentials, SigningScope},
};
use chrono::{DateTime, Utc};
use hyper::{Method, Uri};
use std::{collections::BTreeMap, sync::Arc};
use tracing::debug;

/// Rewrites outbound requests with freshly computed signed headers before
/// they leave the client, the way a signing middleware would.
#[derive(Debug, Clone)]
pub struct SigningInterceptor {
    scope: SigningScope,
    credentials_provider: Arc<dyn ProvideCredentials>,
}

impl SigningInterceptor {
    pub fn new<S1: Into<String>, S2: Into<String>>(region: S1, service: S2) -> Self {
        Self {
            scope: SigningScope::new(region, service),
            credentials_provider: Arc::new(EnvCredentials),
        }
    }

    pub fn with_credentials_provider(
        mut self,
        credentials_provider: Arc<dyn ProvideCredentials>,
    ) -> Self {
        self.credentials_provider = credentials_provider;
        self
    }

    pub fn scope(&self) -> &SigningScope {
        &self.scope
    }

    pub fn intercept(&self, request_data: &mut RequestData, base_url: &str) -> Result<(), Error> {
        self.intercept_at(request_data, base_url, Utc::now())
    }

    pub fn intercept_at(
        &self,
        request_data: &mut RequestData,
        base_url: &str,
        timestamp: DateTime<Utc>,
    ) -> Result<(), Error> {
        let credentials = self.credentials_provider.credentials()?;

        let base_uri = base_url.parse::<Uri>().map_err(|_| Error::ParseUriError)?;
        let host = base_uri
            .authority()
            .map(|authority| authority.as_str().to_string())
            .ok_or(Error::ParseUriError)?;

        let (request_path, raw_query) = match request_data.uri.find('?') {
            Some(index) => (&request_data.uri[..index], &request_data.uri[index + 1..]),
            None => (request_data.uri.as_str(), ""),
        };

        // the provider sees the base path prefixed to the request path, so
        // that full path is what gets signed
        let base_path = base_uri.path().trim_end_matches('/');
        let path = if request_path.starts_with('/') {
            format!("{}{}", base_path, request_path)
        } else {
            format!("{}/{}", base_path, request_path)
        };

        let method = request_data.method.parse::<Method>().map_err(|_| {
            Error::InvalidRequest(format!("unknown http method \"{}\"", request_data.method))
        })?;

        let mut headers = BTreeMap::new();
        headers.insert(String::from("host"), host);

        let body = request_data
            .body
            .as_ref()
            .map(|body| body.clone().into_bytes());
        if body.is_some() {
            let content_type = request_data
                .headers
                .iter()
                .find(|(name, _)| name.eq_ignore_ascii_case("content-type"))
                .map(|(_, value)| value.clone())
                .unwrap_or_else(|| String::from("application/json"));
            headers.insert(String::from("content-type"), content_type);
        }

        let signing_request = SigningRequest {
            method,
            path,
            query: canonical::parse_query(raw_query)?,
            headers,
            body,
        };

        debug!(
            method = %request_data.method,
            path = %signing_request.path,
            "signing outbound request"
        );

        let signed = sign(&signing_request, &credentials, &self.scope, timestamp)?;
        signed.apply_to(&mut request_data.headers);

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sigv4::{Credentials, StaticCredentials};

    fn interceptor() -> SigningInterceptor {
        SigningInterceptor::new("eu-west-2", "execute-api").with_credentials_provider(Arc::new(
            StaticCredentials::new(Credentials::new("FOOBAR", "wJalrXUtnFEMI", None)),
        ))
    }

    fn fixed_timestamp() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2023-02-24T00:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    #[test]
    fn splices_signed_headers_into_the_request() {
        let mut request_data = RequestData::new("GET", "/pets");

        interceptor()
            .intercept_at(&mut request_data, "http://127.0.0.1:55715", fixed_timestamp())
            .unwrap();

        assert_eq!(
            request_data.headers.get("Host").map(String::as_str),
            Some("127.0.0.1:55715")
        );
        assert_eq!(
            request_data.headers.get("X-Amz-Date").map(String::as_str),
            Some("20230224T000000Z")
        );
        let authorization = request_data.headers.get("Authorization").unwrap();
        assert!(authorization
            .starts_with("AWS4-HMAC-SHA256 Credential=FOOBAR/20230224/eu-west-2/execute-api"));
    }

    #[test]
    fn base_path_is_included_in_the_signed_path() {
        let mut with_prefix = RequestData::new("GET", "/pets");
        let mut without_prefix = RequestData::new("GET", "/pets");
        let interceptor = interceptor();

        interceptor
            .intercept_at(
                &mut with_prefix,
                "https://api.example.com/Prod",
                fixed_timestamp(),
            )
            .unwrap();
        interceptor
            .intercept_at(
                &mut without_prefix,
                "https://api.example.com",
                fixed_timestamp(),
            )
            .unwrap();

        // same host, same timestamp; only the path prefix differs
        assert_ne!(
            with_prefix.headers.get("Authorization"),
            without_prefix.headers.get("Authorization")
        );
    }

    #[test]
    fn query_parameters_are_signed_in_sorted_order() {
        let interceptor = interceptor();

        let mut forward = RequestData::new("GET", "/pets?b=2&a=1");
        let mut reversed = RequestData::new("GET", "/pets?a=1&b=2");
        interceptor
            .intercept_at(&mut forward, "http://127.0.0.1:55715", fixed_timestamp())
            .unwrap();
        interceptor
            .intercept_at(&mut reversed, "http://127.0.0.1:55715", fixed_timestamp())
            .unwrap();

        assert_eq!(
            forward.headers.get("Authorization"),
            reversed.headers.get("Authorization")
        );
    }

    #[test]
    fn body_adds_content_type_to_the_signed_headers() {
        let mut request_data = RequestData::new("POST", "/");
        request_data.body = Some(String::from(r#"{"details":"token"}"#));

        interceptor()
            .intercept_at(&mut request_data, "http://127.0.0.1:55715", fixed_timestamp())
            .unwrap();

        let authorization = request_data.headers.get("Authorization").unwrap();
        assert!(authorization.contains("SignedHeaders=content-type;host;x-amz-date,"));
    }

    #[test]
    fn missing_credentials_abort_the_intercept() {
        let interceptor = SigningInterceptor::new("eu-west-2", "execute-api")
            .with_credentials_provider(Arc::new(StaticCredentials::new(Credentials::new(
                "", "", None,
            ))));

        let mut request_data = RequestData::new("GET", "/pets");
        match interceptor.intercept_at(&mut request_data, "http://127.0.0.1:55715", fixed_timestamp())
        {
            Err(Error::MissingCredentials(_)) => (),
            other => panic!("expected a MissingCredentials error, got {:?}", other),
        }
    }
}
