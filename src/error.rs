//! Broker-level error types shared across the lifecycle manager, exchange client, and stores.

// self
use crate::{_prelude::*, auth::UserId};

/// Broker-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Coarse failure classes surfaced to the route layer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FailureKind {
	/// No usable credential exists; the end user must authorize again.
	Unauthenticated,
	/// Upstream rejected or could not serve a request (includes timeouts and bad responses).
	Exchange,
	/// Durable persistence is unavailable.
	Store,
}

/// Canonical broker error exposed by public APIs.
#[derive(Debug, ThisError)]
pub enum Error {
	/// No refresh credential is available for the user, or the available one stopped working.
	#[error("No usable credential exists for user `{user}`.")]
	Unauthenticated {
		/// User the lookup was performed for.
		user: UserId,
		/// Exchange failure that invalidated the credential, if any.
		#[source]
		cause: Option<Box<Error>>,
	},
	/// Storage-layer failure.
	#[error("{0}")]
	Storage(
		#[from]
		#[source]
		crate::store::StoreError,
	),
	/// Local configuration problem or malformed upstream contract.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Temporary upstream failure.
	#[error(transparent)]
	Transient(#[from] TransientError),
	/// Transport failure (DNS, TCP, TLS).
	#[error(transparent)]
	Transport(#[from] TransportError),

	/// Provider rejected the grant (bad code, revoked or malformed refresh token).
	#[error("Provider rejected the grant: {reason}.")]
	InvalidGrant {
		/// Provider- or broker-supplied reason string.
		reason: String,
	},
	/// Client authentication failed or credentials are malformed.
	#[error("Client authentication failed: {reason}.")]
	InvalidClient {
		/// Provider- or broker-supplied reason string.
		reason: String,
	},
	/// Token lacks the scopes the upstream call needs.
	#[error("Token lacks the required scopes: {reason}.")]
	InsufficientScope {
		/// Provider- or broker-supplied reason string.
		reason: String,
	},
}
impl Error {
	/// Builds an [`Error::Unauthenticated`] without an underlying cause.
	pub fn unauthenticated(user: UserId) -> Self {
		Self::Unauthenticated { user, cause: None }
	}

	/// Builds an [`Error::Unauthenticated`] caused by a failed exchange.
	pub fn unauthenticated_by(user: UserId, cause: Error) -> Self {
		Self::Unauthenticated { user, cause: Some(Box::new(cause)) }
	}

	/// Classifies the error into one of the three failure kinds.
	pub fn kind(&self) -> FailureKind {
		match self {
			Self::Unauthenticated { .. } => FailureKind::Unauthenticated,
			Self::Storage(_) => FailureKind::Store,
			Self::Config(_)
			| Self::Transient(_)
			| Self::Transport(_)
			| Self::InvalidGrant { .. }
			| Self::InvalidClient { .. }
			| Self::InsufficientScope { .. } => FailureKind::Exchange,
		}
	}

	/// Returns `true` when upstream positively rejected the presented grant.
	pub fn is_rejection(&self) -> bool {
		matches!(self, Self::InvalidGrant { .. })
	}
}

/// Configuration and validation failures raised by the broker.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// HTTP request construction failed.
	#[error(transparent)]
	HttpRequest(#[from] oauth2::http::Error),
	/// Provider descriptor contains an invalid URL.
	#[error("Descriptor contains an invalid URL.")]
	InvalidDescriptor {
		/// Underlying parsing failure.
		#[source]
		source: oauth2::url::ParseError,
	},
	/// Redirect URI cannot be parsed or joined.
	#[error("Redirect URI is invalid.")]
	InvalidRedirect {
		/// Underlying parsing failure.
		#[source]
		source: oauth2::url::ParseError,
	},
	/// A required environment variable is not set.
	#[error("Environment variable `{name}` is not set.")]
	MissingEnv {
		/// Variable name.
		name: &'static str,
	},
	/// An environment variable holds an unusable value.
	#[error("Environment variable `{name}` is invalid: {reason}.")]
	InvalidEnv {
		/// Variable name.
		name: &'static str,
		/// Human-readable parse failure.
		reason: String,
	},

	/// Authorization-code grant came back without a refresh token.
	#[error("Token endpoint did not issue a refresh token.")]
	MissingRefreshToken,
	/// Token endpoint response omitted `expires_in`.
	#[error("Token endpoint response is missing expires_in.")]
	MissingExpiresIn,
	/// Token endpoint returned an excessively large `expires_in`.
	#[error("The expires_in value exceeds the supported range.")]
	ExpiresInOutOfRange,
	/// Token endpoint returned a non-positive duration.
	#[error("The expires_in value must be positive.")]
	NonPositiveExpiresIn,
	/// Identity endpoint returned an identifier that fails validation.
	#[error("Identity endpoint returned an invalid user identifier.")]
	InvalidIdentity(#[from] crate::auth::UserIdError),
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}

/// Temporary failure variants (safe to retry on a later request).
#[derive(Debug, ThisError)]
pub enum TransientError {
	/// Upstream returned an unexpected but non-fatal response, or timed out.
	#[error("Upstream endpoint returned an unexpected response: {message}.")]
	UpstreamEndpoint {
		/// Provider- or broker-supplied message summarizing the failure.
		message: String,
		/// HTTP status code, when available.
		status: Option<u16>,
		/// Retry-After hint from upstream, if supplied.
		retry_after: Option<Duration>,
	},
	/// The identity store did not answer within the configured bound.
	#[error("Identity store `{operation}` call timed out after {timeout:?}.")]
	StoreTimeout {
		/// Store operation that was abandoned.
		operation: &'static str,
		/// Bound the call exceeded.
		timeout: std::time::Duration,
	},
	/// Upstream responded with JSON that could not be parsed.
	#[error("Upstream endpoint returned malformed JSON.")]
	ResponseParse {
		/// Structured parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::error::Error>,
		/// HTTP status code, when available.
		status: Option<u16>,
	},
}

/// Transport-level failures (network, IO).
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while calling the upstream endpoint.")]
	Network {
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// Underlying IO failure surfaced during transport.
	#[error("I/O error occurred while calling the upstream endpoint.")]
	Io(#[from] std::io::Error),
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Network { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for TransportError {
	fn from(e: ReqwestError) -> Self {
		Self::network(e)
	}
}
