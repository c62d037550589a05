use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Required param is not set: \"{0}\"")]
    Configuration(String),

    #[error("Invalid value for \"{name}\": {reason}")]
    InvalidParam { name: String, reason: String },

    #[error("Cannot get hostname from Kubernetes API url {url}. Expected format: <scheme>://<host>:<port>")]
    MalformedUrl { url: String },

    #[error("Request failed with status code {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Kubernetes API request for {context} failed: {source}")]
    Kube {
        context: String,
        #[source]
        source: kube::Error,
    },

    #[error("Request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Failed to parse response received from Kubernetes API ({context}): {reason}")]
    ResponseShape { context: String, reason: String },

    #[error(transparent)]
    MetricsEndpoint(#[from] MetricsEndpointError),
}

/// Why a metrics aggregator endpoint could not be turned into a scrape URL.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MetricsEndpointError {
    #[error("Endpoint \"{name}\" not found")]
    NotFound { name: String },

    #[error("Endpoint \"{name}\" is not usable: {reason}")]
    Unusable { name: String, reason: String },
}

impl Error {
    pub fn response_shape(context: impl Into<String>, reason: impl ToString) -> Self {
        Error::ResponseShape {
            context: context.into(),
            reason: reason.to_string(),
        }
    }

    /// Map a client error for `context` (a resource or object name). API
    /// status responses keep their code, undecodable bodies become shape
    /// errors.
    pub fn from_kube(err: kube::Error, context: &str) -> Self {
        match err {
            kube::Error::Api(resp) => Error::Status {
                status: resp.code,
                body: resp.message,
            },
            kube::Error::SerdeError(e) => Error::response_shape(context, e),
            source => Error::Kube {
                context: context.to_string(),
                source,
            },
        }
    }

    /// True for non-2xx responses and for requests that never got one.
    pub fn is_transport(&self) -> bool {
        matches!(self, Error::Status { .. } | Error::Kube { .. } | Error::Transport { .. })
    }

    /// True for failures that happened before any request was sent.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Error::Configuration(_) | Error::InvalidParam { .. } | Error::MalformedUrl { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;
