mod canonical;
mod contract;
mod data;
mod error;
mod http_client;
mod interceptor;
mod matching;
mod sigv4;
mod state;
mod util;
mod verifier;

pub use canonical::{canonicalize, CanonicalRequest, SigningRequest, EMPTY_PAYLOAD_HASH};
pub use contract::{
    parse_document, ContractSource, FileContractSource, InMemoryContractSource, Interaction,
    InteractionBuilder, RequestTemplate, ResponseTemplate,
};
pub use data::{RequestData, ResponseData};
pub use error::Error;
pub use http_client::{HttpClient, HyperHttpClient};
pub use interceptor::SigningInterceptor;
pub use matching::{match_value, Matcher, Mismatch, MATCH_KEY};
pub use sigv4::{
    sign, Credentials, EnvCredentials, ProvideCredentials, SignedHeaders, SigningScope,
    StaticCredentials, ALGORITHM,
};
pub use state::{HandlerOutcome, SigningDirective, StateHandlers};
pub use verifier::{
    FailureReason, InteractionResult, VerificationReport, Verdict, Verifier,
    VerifierConfiguration,
};
