use crate::error::Error;
use futures::future::BoxFuture;
use std::{collections::HashMap, fmt, future::Future};

/// Tells the harness whether the next outbound request must carry freshly
/// computed signed headers. Returned by a state handler and consumed when the
/// request is built, so nothing carries over between interactions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SigningDirective {
    Sign,
    Passthrough,
}

#[derive(Debug, Clone)]
pub struct HandlerOutcome {
    pub description: String,
    pub directive: SigningDirective,
}

impl HandlerOutcome {
    pub fn sign<S: Into<String>>(description: S) -> Self {
        Self {
            description: description.into(),
            directive: SigningDirective::Sign,
        }
    }

    pub fn passthrough<S: Into<String>>(description: S) -> Self {
        Self {
            description: description.into(),
            directive: SigningDirective::Passthrough,
        }
    }
}

type HandlerFuture = BoxFuture<'static, HandlerOutcome>;
type Handler = Box<dyn Fn() -> HandlerFuture + Send + Sync>;

#[derive(Default)]
pub struct StateHandlers {
    handlers: HashMap<String, Handler>,
}

impl StateHandlers {
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    pub fn register<S, F, Fut>(&mut self, state: S, handler: F)
    where
        S: Into<String>,
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerOutcome> + Send + 'static,
    {
        self.handlers.insert(
            state.into(),
            Box::new(move || -> HandlerFuture { Box::pin(handler()) }),
        );
    }

    pub fn contains<S: AsRef<str>>(&self, state: S) -> bool {
        self.handlers.contains_key(state.as_ref())
    }

    pub(crate) async fn prepare(&self, state: &str) -> Result<HandlerOutcome, Error> {
        match self.handlers.get(state) {
            Some(handler) => Ok(handler().await),
            None => Err(Error::UnknownState(String::from(state))),
        }
    }
}

impl fmt::Debug for StateHandlers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateHandlers")
            .field("states", &self.handlers.keys().collect::<Vec<_>>())
            .finish()
    }
}
