use crate::error::Error;
use reqwest::{self};
type ReqwestClient = reqwest::blocking::Client;
use serde::Deserialize;
use sigpact::{RequestData, SigningInterceptor};

const DEFAULT_BASE_URL: &str = "http://your-api.example.com";

/// A pet as the gateway returns it.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Pet {
    pub id: u64,
    #[serde(rename = "type")]
    pub pet_type: String,
    pub price: f64,
}

/// Builder used to build a PetApiClient instance
#[derive(Debug, Clone, Default)]
pub struct PetApiClientBuilder {
    base_url: Option<String>,
    http_client: Option<ReqwestClient>,
    interceptor: Option<SigningInterceptor>,
}

impl PetApiClientBuilder {
    /// Create a new PetApiClientBuilder instance.
    pub fn new() -> Self {
        Self {
            base_url: None,
            http_client: None,
            interceptor: None,
        }
    }

    /// Use the given base_url when building a PetApiClient instance.
    ///
    /// # Arguments
    /// `base_url` - a base url to use when calling the API.
    ///
    /// # Returns
    /// This builder.
    pub fn with_base_url<T: Into<String>>(mut self, base_url: T) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Use the given blocking reqwest client when building a PetApiClient instance.
    ///
    /// # Arguments
    /// `client` - a pre-configured blocking reqwest client.
    ///
    /// # Returns
    /// This builder.
    pub fn with_http_client(mut self, client: ReqwestClient) -> Self {
        self.http_client = Some(client);
        self
    }

    /// Sign every outbound request with the given interceptor. Without one
    /// the client calls the gateway unauthenticated.
    ///
    /// # Arguments
    /// `interceptor` - a configured signing interceptor.
    ///
    /// # Returns
    /// This builder.
    pub fn with_interceptor(mut self, interceptor: SigningInterceptor) -> Self {
        self.interceptor = Some(interceptor);
        self
    }

    /// Consume the builder and create a PetApiClient instance using all of the previously
    /// configured values or their defaults.
    ///
    /// # Returns
    /// A PetApiClient instance.
    pub fn build(mut self) -> PetApiClient {
        PetApiClient {
            http: self.http_client.take().unwrap_or_default(),
            base_url: self
                .base_url
                .take()
                .unwrap_or_else(|| String::from(DEFAULT_BASE_URL)),
            interceptor: self.interceptor.take(),
        }
    }
}

/// Struct that represents a client of an AWS-gated pet store API.
#[derive(Default, Debug, Clone)]
pub struct PetApiClient {
    http: ReqwestClient,
    base_url: String,
    interceptor: Option<SigningInterceptor>,
}

impl PetApiClient {
    /// Create a PetApiClient with the default reqwest client.
    ///
    /// # Returns
    /// A PetApiClient.
    pub fn new() -> Self {
        PetApiClient {
            http: ReqwestClient::new(),
            base_url: String::from(DEFAULT_BASE_URL),
            interceptor: None,
        }
    }

    /// Gets all pets from the pet store.
    ///
    /// # Returns
    /// All pets the gateway knows about, or an `Unauthorized.` error when the
    /// gateway rejects the request for a missing or invalid signature.
    pub fn get_pets(&self) -> Result<Vec<Pet>, Error> {
        let url = format!("{}/pets", self.base_url);
        let mut request_builder = self.http.get(&url);

        if let Some(interceptor) = &self.interceptor {
            let mut request_data = RequestData::new("GET", "/pets");
            interceptor.intercept(&mut request_data, &self.base_url)?;

            for (name, value) in &request_data.headers {
                request_builder = request_builder.header(name.as_str(), value.as_str());
            }
        }

        let response = request_builder.send()?;
        let status = response.status().as_u16();
        let body = response.text()?;

        if status == 200 {
            Ok(serde_json::from_str(&body)?)
        } else {
            Err(translate_error(status, &body))
        }
    }
}

// the body message and the stringified status code are two separate checks;
// both map to Unauthorized but they are not the same condition
fn translate_error(status: u16, body: &str) -> Error {
    let message = serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|value| {
            value
                .get("message")
                .and_then(|message| message.as_str().map(String::from))
        });

    if message.as_deref() == Some("Missing Authentication Token") {
        return Error::Unauthorized;
    }
    if status.to_string() == "403" {
        return Error::Unauthorized;
    }

    match message {
        Some(message) => Error::Provider(message),
        None => Error::Provider(String::from("An error occurred")),
    }
}

#[cfg(test)]
#[allow(non_snake_case)]
mod tests {
    use super::*;
    use hyper::service::{make_service_fn, service_fn};
    use hyper::{Body, Request, Response, Server};
    use sigpact::{Credentials, StaticCredentials};
    use std::convert::Infallible;
    use std::net::SocketAddr;
    use std::sync::{mpsc, Arc};
    use std::thread;

    #[test]
    fn test_missingAuthenticationTokenTranslatesToUnauthorized() {
        let error = translate_error(403, r#"{"message": "Missing Authentication Token"}"#);

        match error {
            Error::Unauthorized => assert_eq!(error.to_string(), "Unauthorized."),
            _ => panic!("The function returned a wrong error: {}", error.to_string()),
        }
    }

    #[test]
    fn test_status403TranslatesToUnauthorizedEvenWithAnotherMessage() {
        let error = translate_error(403, r#"{"message": "Forbidden"}"#);

        match error {
            Error::Unauthorized => (),
            _ => panic!("The function returned a wrong error: {}", error.to_string()),
        }
    }

    #[test]
    fn test_otherProviderMessagesPassThrough() {
        let error = translate_error(500, r#"{"message": "Internal Server Error"}"#);

        match error {
            Error::Provider(message) => assert_eq!(message, "Internal Server Error"),
            _ => panic!("The function returned a wrong error: {}", error.to_string()),
        }
    }

    #[test]
    fn test_unparseableErrorBodyGetsAGenericMessage() {
        let error = translate_error(500, "not json");

        match error {
            Error::Provider(message) => assert_eq!(message, "An error occurred"),
            _ => panic!("The function returned a wrong error: {}", error.to_string()),
        }
    }

    async fn handle(request: Request<Body>) -> Result<Response<Body>, Infallible> {
        let authorized = request
            .headers()
            .get("authorization")
            .and_then(|value| value.to_str().ok())
            .map_or(false, |value| value.starts_with("AWS4-HMAC-SHA256 Credential="));

        let response = if authorized {
            Response::builder()
                .status(200)
                .header("Content-Type", "application/json")
                .body(Body::from(
                    r#"[{"id":1,"type":"dog","price":249.99},{"id":2,"type":"cat","price":124.99},{"id":3,"type":"fish","price":0.99}]"#,
                ))
        } else {
            Response::builder()
                .status(403)
                .header("Content-Type", "application/json")
                .body(Body::from(r#"{"message":"Missing Authentication Token"}"#))
        };

        Ok(response.expect("the stub response is well-formed"))
    }

    fn start_stub_gateway() -> SocketAddr {
        let (sender, receiver) = mpsc::channel();

        thread::spawn(move || {
            tokio::runtime::Runtime::new().unwrap().block_on(async {
                let server = Server::bind(&SocketAddr::from(([127, 0, 0, 1], 0))).serve(
                    make_service_fn(|_| async { Ok::<_, Infallible>(service_fn(handle)) }),
                );
                sender.send(server.local_addr()).unwrap();

                if let Err(e) = server.await {
                    eprintln!("stub gateway error: {}", e);
                }
            });
        });

        receiver.recv().unwrap()
    }

    fn signing_interceptor() -> SigningInterceptor {
        SigningInterceptor::new("eu-west-2", "execute-api").with_credentials_provider(Arc::new(
            StaticCredentials::new(Credentials::new("FOOBAR", "wJalrXUtnFEMI/K7MDENG", None)),
        ))
    }

    #[test]
    fn test_getPetsReturnsAllPetsWhenAuthenticated() {
        let addr = start_stub_gateway();
        let client = PetApiClientBuilder::new()
            .with_base_url(format!("http://{}", addr))
            .with_interceptor(signing_interceptor())
            .build();

        let pets = client.get_pets().unwrap();

        assert_eq!(pets.len(), 3);
        assert_eq!(pets[0].pet_type, "dog");
        assert_eq!(pets[1].price, 124.99);
        assert_eq!(pets[2].id, 3);
    }

    #[test]
    fn test_getPetsIsUnauthorizedWithoutTheInterceptor() {
        let addr = start_stub_gateway();
        let client = PetApiClientBuilder::new()
            .with_base_url(format!("http://{}", addr))
            .build();

        let result = client.get_pets();

        match result {
            Err(Error::Unauthorized) => (),
            Err(err) => panic!("The function returned a wrong error: {}", err.to_string()),
            _ => panic!("The function call should return an error"),
        }
    }
}
