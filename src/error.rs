//! Crate-level error types shared by the guard, exchange, and cache layers.
//!
//! Every error is [`Clone`] so a single failed refresh can be handed to each caller that was
//! waiting on it. Underlying causes are kept behind [`Arc`] for that reason.

// self
use crate::{_prelude::*, guard::UrlGuardError};

/// Crate-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Shared, cloneable error source.
pub type SharedError = Arc<dyn StdError + Send + Sync>;

/// Canonical error exposed by public APIs.
#[derive(Clone, Debug, ThisError)]
pub enum Error {
	/// The central instance refused the access key (HTTP 401).
	///
	/// Retrying without changing the local configuration is pointless.
	#[error("Cannot authenticate on central instance `{url}` with current configuration.")]
	AuthDenied {
		/// Token endpoint that rejected the credential.
		url: String,
	},
	/// Every other failure: unsafe URL, DNS, transport, unexpected status, malformed body.
	#[error(transparent)]
	Generic(#[from] GenericError),
}
impl Error {
	/// Returns `true` when the central instance rejected the access key.
	pub fn is_auth_denied(&self) -> bool {
		matches!(self, Self::AuthDenied { .. })
	}

	/// Returns the generic failure, if this is one.
	pub fn as_generic(&self) -> Option<&GenericError> {
		match self {
			Self::Generic(inner) => Some(inner),
			Self::AuthDenied { .. } => None,
		}
	}
}
impl From<UrlGuardError> for Error {
	fn from(e: UrlGuardError) -> Self {
		Self::Generic(e.into())
	}
}

/// Non-authentication failures raised while obtaining a token.
#[derive(Clone, Debug, ThisError)]
pub enum GenericError {
	/// Central instance URL failed validation.
	#[error("Central instance URL was rejected: {0}")]
	InvalidUrl(#[from] UrlGuardError),
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: SharedError,
	},
	/// Network-level failure (connect, TLS, I/O, timeout).
	#[error("Error sending POST request to `{url}`.")]
	Transport {
		/// Token endpoint being called.
		url: String,
		/// Transport-specific failure.
		#[source]
		source: SharedError,
	},
	/// Token endpoint answered with a status other than 200 or 401.
	#[error("Token endpoint `{url}` returned unexpected HTTP status {status}.")]
	UnexpectedStatus {
		/// Token endpoint being called.
		url: String,
		/// HTTP status code.
		status: u16,
	},
	/// Token endpoint answered 200 with a body that is not a valid access token.
	#[error("Token endpoint `{url}` returned a malformed token response.")]
	MalformedResponse {
		/// Token endpoint being called.
		url: String,
		/// Structured parsing failure.
		#[source]
		source: Arc<serde_path_to_error::Error<serde_json::Error>>,
	},
	/// `expiresIn` cannot be represented as an instant.
	#[error("The expiresIn value {expires_in} exceeds the supported range.")]
	ExpiresInOutOfRange {
		/// Raw value returned by the server, in milliseconds.
		expires_in: i64,
	},
}
impl GenericError {
	/// Wraps a transport's builder failure.
	pub fn http_client_build(src: impl 'static + Send + Sync + StdError) -> Self {
		Self::HttpClientBuild { source: Arc::new(src) }
	}

	/// Wraps a transport failure observed while calling `url`.
	pub fn transport(url: impl Into<String>, src: impl 'static + Send + Sync + StdError) -> Self {
		Self::Transport { url: url.into(), source: Arc::new(src) }
	}
}
