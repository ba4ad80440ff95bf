//! HTTP transport capability shared by token exchanges and authenticated API calls.
//!
//! [`HttpTransport`] is the crate's only dependency on an HTTP stack. Requests and responses
//! use the `http` crate types re-exported by `oauth2` ([`HttpRequest`], [`HttpResponse`]) so
//! any client can be plugged in. [`AuthenticatedTransport`](crate::transport::AuthenticatedTransport)
//! implements the same trait, which makes it a drop-in decorator for code that only needs to
//! send requests.

// crates.io
pub use oauth2::{HttpRequest, HttpResponse, http};
// self
use crate::_prelude::*;

/// Boxed future returned by [`HttpTransport::execute`].
pub type TransportFuture<'a, E> = Pin<Box<dyn Future<Output = Result<HttpResponse, E>> + 'a + Send>>;

/// Executes HTTP requests and hands back the raw response.
///
/// Implementations must not interpret status codes: a 4xx/5xx answer is still `Ok`. Only
/// failures to obtain a response at all (DNS, TCP, TLS, I/O) are reported as errors. The
/// returned future must be `Send` so callers can move dispatches across executor threads.
pub trait HttpTransport
where
	Self: 'static + Send + Sync,
{
	/// Concrete error emitted by the underlying client.
	type Error: 'static + Send + Sync + StdError;

	/// Sends `request` and resolves once the full response body has been read.
	fn execute(&self, request: HttpRequest) -> TransportFuture<'_, Self::Error>;
}

/// Thin wrapper around [`ReqwestClient`] so shared HTTP behavior lives in one place.
///
/// Token endpoints answer directly, so a custom [`ReqwestClient`] passed through
/// [`ReqwestHttpClient::with_client`] should not follow redirects.
#[cfg(feature = "reqwest")]
#[derive(Clone, Debug, Default)]
pub struct ReqwestHttpClient(pub ReqwestClient);
#[cfg(feature = "reqwest")]
impl ReqwestHttpClient {
	/// Wraps an existing reqwest [`ReqwestClient`].
	pub fn with_client(client: ReqwestClient) -> Self {
		Self(client)
	}
}
#[cfg(feature = "reqwest")]
impl AsRef<ReqwestClient> for ReqwestHttpClient {
	fn as_ref(&self) -> &ReqwestClient {
		&self.0
	}
}
#[cfg(feature = "reqwest")]
impl Deref for ReqwestHttpClient {
	type Target = ReqwestClient;

	fn deref(&self) -> &Self::Target {
		&self.0
	}
}
#[cfg(feature = "reqwest")]
impl HttpTransport for ReqwestHttpClient {
	type Error = ReqwestError;

	fn execute(&self, request: HttpRequest) -> TransportFuture<'_, Self::Error> {
		let client = self.0.clone();

		Box::pin(async move {
			let response = client.execute(request.try_into()?).await?;
			let status = response.status();
			let headers = response.headers().to_owned();
			let mut response_new = HttpResponse::new(response.bytes().await?.to_vec());

			*response_new.status_mut() = status;
			*response_new.headers_mut() = headers;

			Ok(response_new)
		})
	}
}
