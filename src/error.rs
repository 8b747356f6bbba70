use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Why a device-code sign-in did not produce a token.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("the user declined the sign-in request")]
    Declined,

    #[error("the device code expired before the sign-in was approved")]
    Expired,

    #[error("gave up waiting for sign-in approval after {0} seconds")]
    Timeout(u64),

    #[error("could not reach the identity provider: {0}")]
    Network(#[from] reqwest::Error),

    #[error("identity provider rejected the request: {code} - {description}")]
    Protocol { code: String, description: String },
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("authentication failed: {0}")]
    Authentication(#[from] AuthError),

    /// Non-success response from the mail service, code and message passed through verbatim.
    #[error("{code} {message}")]
    Api {
        status: u16,
        code: String,
        message: String,
    },

    #[error("request to the mail service failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("failed to persist credentials to {location}: {source}")]
    Persistence {
        location: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("credential record at {location} is unreadable: {reason}")]
    CorruptRecord { location: String, reason: String },

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl Error {
    pub(crate) fn persistence(
        location: impl Into<String>,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self::Persistence {
            location: location.into(),
            source: source.into(),
        }
    }

    pub(crate) fn corrupt(location: impl Into<String>, reason: impl ToString) -> Self {
        Self::CorruptRecord {
            location: location.into(),
            reason: reason.to_string(),
        }
    }

    /// True for local storage problems the session can recover from by re-authenticating.
    pub fn is_storage_error(&self) -> bool {
        matches!(self, Self::Persistence { .. } | Self::CorruptRecord { .. })
    }
}
