//! Error taxonomy shared by credential validation, token acquisition, and dispatch.

// self
use crate::{_prelude::*, context::Interrupted};

/// Crate-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Boxed transport-specific failure.
pub type BoxError = Box<dyn StdError + Send + Sync>;

/// Canonical error exposed by public APIs that span more than one layer.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Credentials were rejected before any I/O happened.
	#[error(transparent)]
	Validation(#[from] ValidationError),
	/// The authorization endpoint did not hand out a token.
	#[error(transparent)]
	Acquisition(#[from] AcquisitionError),
	/// An authenticated request could not be dispatched.
	#[error(transparent)]
	Dispatch(#[from] DispatchError),
}

/// Credential problems detected locally, before any network call.
#[derive(Debug, PartialEq, Eq, ThisError)]
pub enum ValidationError {
	/// Authorization URL does not point at a token-issuance endpoint.
	#[error("The authorization URL must end with /{expected}: {url}.")]
	InvalidAuthEndpoint {
		/// URL that failed validation.
		url: String,
		/// Path suffix the endpoint must carry.
		expected: &'static str,
	},
	/// A URL field could not be parsed.
	#[error("The {field} is not a valid URL.")]
	InvalidUrl {
		/// Name of the offending field.
		field: &'static str,
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// A required field was missing or blank.
	#[error("The {field} is required.")]
	MissingField {
		/// Name of the missing field.
		field: &'static str,
	},
}

/// Failures raised while exchanging credentials for a token.
///
/// None of these are retried by the crate; callers decide whether another attempt makes sense.
#[derive(Debug, ThisError)]
pub enum AcquisitionError {
	/// The token request could not be assembled.
	#[error("Token request could not be constructed.")]
	Request(#[from] oauth2::http::Error),
	/// Network failure (DNS, TCP, TLS) while calling the authorization endpoint.
	#[error("Network error occurred while calling the authorization endpoint.")]
	Transport {
		/// Transport-specific failure.
		#[source]
		source: BoxError,
	},
	/// The authorization endpoint answered with a non-200 status.
	#[error("Authorization endpoint rejected the client with HTTP {status}{}.", describe(.error, .description))]
	AuthenticationFailed {
		/// HTTP status returned by the endpoint.
		status: u16,
		/// RFC 6749 `error` code, when the body carried one.
		error: Option<String>,
		/// RFC 6749 `error_description`, when the body carried one.
		description: Option<String>,
	},
	/// The endpoint returned 200 with a body that is not a token response.
	#[error("Authorization endpoint returned a malformed token response.")]
	MalformedResponse {
		/// Path-aware decoding failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
	},
	/// The advertised `expires_in` puts the expiry outside the representable date range.
	#[error("Authorization endpoint returned an out-of-range token lifetime of {expires_in} seconds.")]
	LifetimeOutOfRange {
		/// Lifetime the endpoint advertised.
		expires_in: i64,
	},
	/// The surrounding context was cancelled or ran past its deadline.
	#[error(transparent)]
	Cancelled(#[from] Interrupted),
}
impl AcquisitionError {
	/// Wraps a transport-specific network error.
	pub fn transport(src: impl 'static + Send + Sync + StdError) -> Self {
		Self::Transport { source: Box::new(src) }
	}

	/// Returns the HTTP status for [`AcquisitionError::AuthenticationFailed`].
	pub fn status(&self) -> Option<u16> {
		match self {
			Self::AuthenticationFailed { status, .. } => Some(*status),
			_ => None,
		}
	}
}

/// Failures surfaced by [`AuthenticatedTransport`](crate::transport::AuthenticatedTransport).
#[derive(Debug, ThisError)]
pub enum DispatchError {
	/// Refreshing the token failed, so the request was never sent.
	#[error(transparent)]
	Acquisition(#[from] AcquisitionError),
	/// The token contains bytes that cannot travel in an HTTP header.
	#[error("Bearer token cannot be encoded as a header value.")]
	InvalidHeader(#[from] oauth2::http::header::InvalidHeaderValue),
	/// The underlying transport failed; passed through uninterpreted.
	#[error("Underlying transport failed to execute the request.")]
	Transport {
		/// Transport-specific failure.
		#[source]
		source: BoxError,
	},
	/// The surrounding context was cancelled or ran past its deadline.
	#[error(transparent)]
	Cancelled(#[from] Interrupted),
}
impl DispatchError {
	/// Wraps an error emitted by the underlying transport.
	pub fn transport(src: impl 'static + Send + Sync + StdError) -> Self {
		Self::Transport { source: Box::new(src) }
	}
}

#[cfg(feature = "reqwest")]
impl From<ReqwestError> for AcquisitionError {
	fn from(e: ReqwestError) -> Self {
		Self::transport(e)
	}
}

fn describe(error: &Option<String>, description: &Option<String>) -> String {
	match (error, description) {
		(_, Some(description)) => format!(": {description}"),
		(Some(error), None) => format!(": {error}"),
		(None, None) => String::new(),
	}
}
