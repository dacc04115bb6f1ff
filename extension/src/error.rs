// Error taxonomy shared by the relay and the mutation engine
// Errors are reported as {success:false, error} and never thrown across contexts

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ShifterError {
    #[error("Background engine is not ready yet")]
    NotReady,

    #[error("Document is not ready: page has no body element")]
    DocumentNotReady,

    #[error("No active tab found")]
    NoActiveTab,

    #[error("Could not load the background engine on this page ({0}). Please reload the page and try again.")]
    InjectionFailed(String),

    #[error("Could not reach the page: {0}. Please reload the page and try again.")]
    TransportFailure(String),

    #[error("Unknown action: {0}")]
    UnknownAction(String),

    #[error("Malformed request: {0}")]
    MalformedRequest(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Propagated verbatim from the image generation provider.
    #[error("{0}")]
    GenerationFailure(String),
}

pub type Result<T> = std::result::Result<T, ShifterError>;

impl ShifterError {
    /// Whether a transport failure means the content script is not listening yet.
    ///
    /// Chrome reports this as "Could not establish connection. Receiving end does not exist."
    pub fn is_no_receiver(cause: &str) -> bool {
        let cause = cause.to_ascii_lowercase();
        cause.contains("receiving end does not exist") || cause.contains("could not establish connection")
    }
}
