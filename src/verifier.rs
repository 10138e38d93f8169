use crate::{
    contract::{ContractSource, Interaction, RequestTemplate, ResponseTemplate},
    data::{RequestData, ResponseData},
    error::Error,
    http_client::{HttpClient, HyperHttpClient},
    interceptor::SigningInterceptor,
    matching::{self, Matcher, Mismatch},
    sigv4::{EnvCredentials, ProvideCredentials, SigningScope},
    state::{HandlerOutcome, SigningDirective, StateHandlers},
};
use serde_json::Value;
use std::{fmt, sync::Arc, time::Duration};
use tracing::{debug, info, warn};

#[derive(Debug)]
pub struct VerifierConfiguration {
    provider_base_url: String,
    scope: SigningScope,
    contract_source: Arc<dyn ContractSource + Send + Sync>,
    state_handlers: StateHandlers,
    credentials_provider: Arc<dyn ProvideCredentials>,
    http_client: Option<Arc<dyn HttpClient + Send + Sync>>,
    strict_matching: bool,
    request_timeout: Duration,
}

impl VerifierConfiguration {
    pub fn new<S: Into<String>>(
        provider_base_url: S,
        scope: SigningScope,
        contract_source: Box<dyn ContractSource + Send + Sync>,
    ) -> Self {
        Self {
            provider_base_url: provider_base_url.into(),
            scope,
            contract_source: contract_source.into(),
            state_handlers: StateHandlers::new(),
            credentials_provider: Arc::new(EnvCredentials),
            http_client: None,
            strict_matching: false,
            request_timeout: Duration::from_secs(30),
        }
    }

    pub fn provider_base_url(&self) -> &str {
        &self.provider_base_url
    }

    pub fn scope(&self) -> &SigningScope {
        &self.scope
    }

    pub fn contract_source(&self) -> Arc<dyn ContractSource + Send + Sync> {
        self.contract_source.clone()
    }

    pub fn state_handlers(&self) -> &StateHandlers {
        &self.state_handlers
    }

    pub fn state_handlers_mut(&mut self) -> &mut StateHandlers {
        &mut self.state_handlers
    }

    pub fn set_state_handlers(&mut self, state_handlers: StateHandlers) {
        self.state_handlers = state_handlers;
    }

    pub fn set_credentials_provider(
        &mut self,
        credentials_provider: Arc<dyn ProvideCredentials>,
    ) {
        self.credentials_provider = credentials_provider;
    }

    pub fn credentials_provider(&self) -> Arc<dyn ProvideCredentials> {
        self.credentials_provider.clone()
    }

    pub fn set_http_client(&mut self, http_client: Arc<dyn HttpClient + Send + Sync>) {
        self.http_client = Some(http_client);
    }

    pub fn http_client(&self) -> Arc<dyn HttpClient + Send + Sync> {
        self.http_client
            .clone()
            .unwrap_or_else(|| Arc::new(HyperHttpClient::with_timeout(self.request_timeout)))
    }

    pub fn set_strict_matching(&mut self, value: bool) {
        self.strict_matching = value;
    }

    pub fn strict_matching(&self) -> bool {
        self.strict_matching
    }

    pub fn set_request_timeout(&mut self, timeout: Duration) {
        self.request_timeout = timeout;
    }

    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FailureReason {
    UnknownState(String),
    NetworkFailure(String),
    Mismatch(Mismatch),
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureReason::UnknownState(name) => {
                write!(f, "no state handler registered for \"{}\"", name)
            }
            FailureReason::NetworkFailure(reason) => write!(f, "network failure: {}", reason),
            FailureReason::Mismatch(mismatch) => write!(f, "{}", mismatch),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    Verified,
    Failed(FailureReason),
}

impl Verdict {
    pub fn is_verified(&self) -> bool {
        matches!(self, Verdict::Verified)
    }
}

#[derive(Debug, Clone)]
pub struct InteractionResult {
    pub description: String,
    pub provider_state: Option<String>,
    pub verdict: Verdict,
}

#[derive(Debug, Clone)]
pub struct VerificationReport {
    pub results: Vec<InteractionResult>,
}

impl VerificationReport {
    pub fn passed(&self) -> bool {
        self.results.iter().all(|result| result.verdict.is_verified())
    }

    pub fn verified_count(&self) -> usize {
        self.results
            .iter()
            .filter(|result| result.verdict.is_verified())
            .count()
    }
}

impl fmt::Display for VerificationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for result in &self.results {
            match &result.verdict {
                Verdict::Verified => writeln!(f, "verified: {}", result.description)?,
                Verdict::Failed(reason) => {
                    writeln!(f, "failed: {} ({})", result.description, reason)?
                }
            }
        }

        write!(
            f,
            "{} of {} interactions verified",
            self.verified_count(),
            self.results.len()
        )
    }
}

pub struct Verifier {
    configuration: VerifierConfiguration,
}

impl Verifier {
    pub fn new(configuration: VerifierConfiguration) -> Self {
        Self { configuration }
    }

    /// Replays every interaction against the configured provider, strictly in
    /// order. Signing or configuration defects abort the run; network
    /// failures and mismatches fail the single interaction and the run
    /// continues.
    pub async fn verify(&self) -> Result<VerificationReport, Error> {
        let interactions = self
            .configuration
            .contract_source()
            .load_interactions()
            .map_err(Error::ContractLoadError)?;

        let http_client = self.configuration.http_client();
        let interceptor = SigningInterceptor::new(
            self.configuration.scope().region.clone(),
            self.configuration.scope().service.clone(),
        )
        .with_credentials_provider(self.configuration.credentials_provider());

        let mut results = Vec::with_capacity(interactions.len());
        for interaction in &interactions {
            info!(description = %interaction.description, "verifying interaction");

            let verdict = self
                .verify_interaction(&*http_client, &interceptor, interaction)
                .await?;

            match &verdict {
                Verdict::Verified => {
                    info!(description = %interaction.description, "interaction verified")
                }
                Verdict::Failed(reason) => {
                    warn!(description = %interaction.description, reason = %reason, "interaction failed")
                }
            }

            results.push(InteractionResult {
                description: interaction.description.clone(),
                provider_state: interaction.provider_state.clone(),
                verdict,
            });
        }

        Ok(VerificationReport { results })
    }

    async fn verify_interaction(
        &self,
        http_client: &dyn HttpClient,
        interceptor: &SigningInterceptor,
        interaction: &Interaction,
    ) -> Result<Verdict, Error> {
        // Pending -> StatePrepared
        let outcome = match &interaction.provider_state {
            Some(state) => match self.configuration.state_handlers().prepare(state).await {
                Ok(outcome) => outcome,
                Err(Error::UnknownState(name)) => {
                    return Ok(Verdict::Failed(FailureReason::UnknownState(name)))
                }
                Err(e) => return Err(e),
            },
            None => HandlerOutcome::passthrough("no provider state"),
        };
        debug!(state = %outcome.description, "state prepared");

        // StatePrepared -> Requested
        let mut request_data = build_request_data(&interaction.request);
        if outcome.directive == SigningDirective::Sign {
            interceptor.intercept(&mut request_data, self.configuration.provider_base_url())?;
        }

        let response = match http_client
            .make_request(self.configuration.provider_base_url(), &request_data)
            .await
        {
            Ok(response) => response,
            Err(Error::NetworkFailure(reason)) => {
                return Ok(Verdict::Failed(FailureReason::NetworkFailure(reason)))
            }
            Err(e) => return Err(e),
        };

        // Requested -> Verified | Failed
        Ok(
            match match_response(
                &interaction.response,
                &response,
                self.configuration.strict_matching(),
            ) {
                Ok(()) => Verdict::Verified,
                Err(mismatch) => Verdict::Failed(FailureReason::Mismatch(mismatch)),
            },
        )
    }
}

fn build_request_data(template: &RequestTemplate) -> RequestData {
    let mut uri = template.path.clone();
    if !template.query.is_empty() {
        let query = template
            .query
            .iter()
            .map(|(key, value)| {
                format!(
                    "{}={}",
                    crate::canonical::percent_encode(key.as_bytes()),
                    crate::canonical::percent_encode(value.as_bytes())
                )
            })
            .collect::<Vec<_>>()
            .join("&");
        uri = format!("{}?{}", uri, query);
    }

    let mut request_data = RequestData::new(template.method.as_str(), uri);

    for (name, matcher) in &template.headers {
        request_data
            .headers
            .insert(name.clone(), sample_as_string(matcher));
    }

    request_data.body = template.body.as_ref().map(|matcher| match matcher.sample() {
        Value::String(text) => text,
        other => other.to_string(),
    });

    if request_data.body.is_some()
        && !request_data
            .headers
            .keys()
            .any(|name| name.eq_ignore_ascii_case("content-type"))
    {
        request_data.headers.insert(
            String::from("Content-Type"),
            String::from("application/json"),
        );
    }

    request_data
}

fn sample_as_string(matcher: &Matcher) -> String {
    match matcher.sample() {
        Value::String(text) => text,
        other => other.to_string(),
    }
}

fn match_response(
    template: &ResponseTemplate,
    response: &ResponseData,
    strict: bool,
) -> Result<(), Mismatch> {
    if template.status != response.status_code {
        return Err(Mismatch {
            path: String::from("$.status"),
            reason: format!(
                "expected status {}, got {}",
                template.status, response.status_code
            ),
        });
    }

    for (name, matcher) in &template.headers {
        let path = format!("$.headers.{}", name);
        let actual = response
            .headers
            .iter()
            .find(|(header, _)| header.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.clone());

        match actual {
            Some(value) => {
                matching::match_value_at(&path, matcher, &Value::String(value), strict)?
            }
            None => {
                return Err(Mismatch {
                    path,
                    reason: String::from("missing header"),
                })
            }
        }
    }

    if let Some(matcher) = &template.body {
        let actual = parse_body(&response.body);
        matching::match_value_at("$.body", matcher, &actual, strict)?;
    }

    Ok(())
}

// non-json bodies are matched as plain strings
fn parse_body(body: &str) -> Value {
    serde_json::from_str(body).unwrap_or_else(|_| Value::String(String::from(body)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract::InteractionBuilder;
    use crate::matching::Matcher;
    use hyper::Method;
    use serde_json::json;
    use std::collections::HashMap;

    fn response(status_code: u16, body: &str) -> ResponseData {
        ResponseData {
            status_code,
            headers: HashMap::new(),
            body: String::from(body),
        }
    }

    #[test]
    fn status_mismatch_is_reported_first() {
        let interaction = InteractionBuilder::upon_receiving("a request to retrieve all pets")
            .with_request(Method::GET, "/pets")
            .will_respond_with(200)
            .with_response_body(Matcher::literal(json!([])))
            .build();

        let mismatch =
            match_response(&interaction.response, &response(403, "[]"), false).unwrap_err();
        assert_eq!(mismatch.path, "$.status");
        assert!(mismatch.reason.contains("expected status 200, got 403"));
    }

    #[test]
    fn body_mismatch_carries_its_path() {
        let interaction = InteractionBuilder::upon_receiving("a request to retrieve all pets")
            .will_respond_with(200)
            .with_response_body(
                Matcher::from_json(&json!([{ "id": 1, "type": "dog", "price": 249.99 }])).unwrap(),
            )
            .build();

        let mismatch = match_response(
            &interaction.response,
            &response(200, r#"[{"id": 1, "type": "cat", "price": 249.99}]"#),
            false,
        )
        .unwrap_err();
        assert_eq!(mismatch.path, "$.body[0].type");
    }

    #[test]
    fn response_headers_are_matched_case_insensitively() {
        let interaction = InteractionBuilder::upon_receiving("a request with headers")
            .will_respond_with(200)
            .with_response_header(
                "Content-Type",
                Matcher::matching_regex("^application/json", "application/json").unwrap(),
            )
            .build();

        let mut actual = response(200, "");
        actual.headers.insert(
            String::from("content-type"),
            String::from("application/json; charset=utf-8"),
        );

        assert!(match_response(&interaction.response, &actual, false).is_ok());
    }

    #[test]
    fn request_data_is_built_from_template_samples() {
        let interaction = InteractionBuilder::upon_receiving("a request to retrieve all pets")
            .with_request(Method::GET, "/pets")
            .with_query("limit", "10")
            .with_request_header("Host", Matcher::like(json!("127.0.0.1:55715")))
            .build();

        let request_data = build_request_data(&interaction.request);
        assert_eq!(request_data.method, "GET");
        assert_eq!(request_data.uri, "/pets?limit=10");
        assert_eq!(
            request_data.headers.get("Host").map(String::as_str),
            Some("127.0.0.1:55715")
        );
        assert!(request_data.body.is_none());
    }

    #[test]
    fn json_body_template_gets_a_content_type() {
        let interaction = InteractionBuilder::upon_receiving("a request to store a token")
            .with_request(Method::POST, "/")
            .with_request_body(
                Matcher::from_json(&json!({"details": {"sigpact:match": "type", "value": "token"}}))
                    .unwrap(),
            )
            .build();

        let request_data = build_request_data(&interaction.request);
        assert_eq!(request_data.body.as_deref(), Some(r#"{"details":"token"}"#));
        assert_eq!(
            request_data.headers.get("Content-Type").map(String::as_str),
            Some("application/json")
        );
    }
}
