use std::fmt;
use thiserror::Error;
use tokio::time::Duration;

#[derive(Error, Debug)]
pub enum StdError {
    #[error("JsonSerializationError: {0}")]
    JsonSerializationError(#[source] serde_json::Error),

    #[error("Kube Error: {0}")]
    KubeError(#[source] kube::Error),

    #[error("MetadataMissing: {0}")]
    MetadataMissing(String),

    #[error("PortParseError: {0}")]
    PortParseError(String),

    // The owner type was never registered with the OwnerRegistry
    #[error("SchemeError: {0}")]
    SchemeError(String),
}

impl StdError {
    pub fn metric_label(&self) -> String {
        match self {
            StdError::JsonSerializationError(_) => "jsonserializationerror".to_string(),
            StdError::KubeError(kube::Error::Api(resp)) => format!("kubeerror_{}", resp.reason.to_lowercase()),
            StdError::KubeError(_) => "kubeerror".to_string(),
            StdError::MetadataMissing(_) => "metadatamissing".to_string(),
            StdError::PortParseError(_) => "portparseerror".to_string(),
            StdError::SchemeError(_) => "schemeerror".to_string(),
        }
    }
}

impl From<kube::Error> for StdError {
    fn from(e: kube::Error) -> Self {
        StdError::KubeError(e)
    }
}

#[derive(Error, Debug)]
pub struct ErrorWithRequeue {
    pub duration: Duration,
    pub error: StdError,
}

impl ErrorWithRequeue {
    pub fn new(error: StdError, duration: Duration) -> ErrorWithRequeue {
        ErrorWithRequeue { error, duration }
    }

    pub fn metric_label(&self) -> String {
        self.error.metric_label()
    }
}

impl fmt::Display for ErrorWithRequeue {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.error)
    }
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("Standard Error: {0}")]
    StdError(#[source] StdError),

    #[error("Error With Requeue: {0}")]
    ErrorWithRequeue(#[source] ErrorWithRequeue),

    /// A failed reconciliation whose status write failed as well
    #[error("Aggregate Error: [{}]", join_errors(.0))]
    Aggregate(Vec<Error>),
}

fn join_errors(errors: &[Error]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

impl Error {
    pub fn metric_label(&self) -> String {
        match self {
            Error::StdError(e) => e.metric_label(),
            Error::ErrorWithRequeue(e) => e.metric_label(),
            Error::Aggregate(errors) => errors
                .first()
                .map(Error::metric_label)
                .unwrap_or_else(|| "aggregate".to_string()),
        }
    }

    /// Folds a primary failure and the failure to record it into one error.
    pub fn aggregate(primary: Error, secondary: Option<Error>) -> Error {
        match secondary {
            None => primary,
            Some(secondary) => Error::Aggregate(vec![primary, secondary]),
        }
    }
}

impl From<StdError> for Error {
    fn from(e: StdError) -> Self {
        Error::StdError(e)
    }
}

impl From<kube::Error> for Error {
    fn from(e: kube::Error) -> Self {
        Error::StdError(StdError::KubeError(e))
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
