//! Client-credentials token exchange.
//!
//! [`TokenSource::acquire`] posts the credentials to the authorization endpoint and turns a
//! `{"access_token": .., "expires_in": ..}` answer into a [`Token`]. The source holds no token
//! state; every call performs a fresh exchange and never retries.

// crates.io
use base64::{Engine as _, engine::general_purpose::STANDARD};
use oauth2::{
	basic::BasicErrorResponse,
	http::{
		Method, Request, StatusCode,
		header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
	},
};
// self
use crate::{
	_prelude::*,
	auth::{Credentials, Token},
	clock::{Clock, SystemClock},
	context::Context,
	error::AcquisitionError,
	http::{HttpRequest, HttpResponse, HttpTransport},
	obs::{self, OpSpan, Operation, Outcome},
};
#[cfg(feature = "reqwest")] use crate::http::ReqwestHttpClient;

/// OAuth 2.0 grant used for every exchange.
pub const GRANT_TYPE: &str = "client_credentials";
/// Content type of the token request body.
pub const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

#[cfg(feature = "reqwest")]
/// Token source specialized for the crate's default reqwest transport.
pub type ReqwestTokenSource = TokenSource<ReqwestHttpClient>;

/// Exchanges [`Credentials`] for fresh [`Token`]s over an [`HttpTransport`].
///
/// The injected [`Clock`] stamps the issue instant of every token so expiry math stays
/// deterministic under test.
pub struct TokenSource<C>
where
	C: ?Sized + HttpTransport,
{
	http_client: Arc<C>,
	clock: Arc<dyn Clock>,
}
impl<C> TokenSource<C>
where
	C: ?Sized + HttpTransport,
{
	/// Creates a source backed by the wall clock.
	pub fn new(http_client: impl Into<Arc<C>>) -> Self {
		Self { http_client: http_client.into(), clock: Arc::new(SystemClock) }
	}

	/// Replaces the clock used for issue timestamps and expiry checks.
	pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
		self.clock = clock;

		self
	}

	/// Transport used for token requests.
	pub fn http_client(&self) -> &Arc<C> {
		&self.http_client
	}

	/// Clock shared with everything that evaluates tokens minted by this source.
	pub fn clock(&self) -> &dyn Clock {
		self.clock.as_ref()
	}

	/// Exchanges `credentials` for a new token, honoring cancellation of `context`.
	pub async fn acquire(
		&self,
		credentials: &Credentials,
		context: &Context,
	) -> Result<Token, AcquisitionError> {
		const OP: Operation = Operation::Acquire;

		let span = OpSpan::new(OP, "acquire");

		obs::record_outcome(OP, Outcome::Attempt);

		let result = span
			.instrument(async {
				let request = token_request(credentials)?;
				let response = context
					.run(self.http_client.execute(request))
					.await?
					.map_err(AcquisitionError::transport)?;
				let issued_at = self.clock.now();
				let token = token_from_response(&response, issued_at)?;

				obs::record_token_lifetime(token.remaining_at(issued_at));

				Ok::<_, AcquisitionError>(token)
			})
			.await;

		match &result {
			Ok(_) => obs::record_outcome(OP, Outcome::Success),
			Err(e) => {
				obs::trace_acquisition_failure(e);
				obs::record_outcome(OP, Outcome::Failure);
			},
		}

		result
	}
}
#[cfg(feature = "reqwest")]
impl Default for TokenSource<ReqwestHttpClient> {
	fn default() -> Self {
		Self::new(ReqwestHttpClient::default())
	}
}
impl<C> Clone for TokenSource<C>
where
	C: ?Sized + HttpTransport,
{
	fn clone(&self) -> Self {
		Self { http_client: Arc::clone(&self.http_client), clock: Arc::clone(&self.clock) }
	}
}
impl<C> Debug for TokenSource<C>
where
	C: ?Sized + HttpTransport,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TokenSource").finish_non_exhaustive()
	}
}

#[derive(Deserialize)]
struct TokenResponse {
	access_token: String,
	expires_in: i64,
}

/// Builds the form-encoded `client_credentials` request for `credentials`.
pub fn token_request(credentials: &Credentials) -> Result<HttpRequest, AcquisitionError> {
	let basic = STANDARD
		.encode(format!("{}:{}", credentials.client_id(), credentials.client_secret().expose()));
	let body = url::form_urlencoded::Serializer::new(String::new())
		.append_pair("grant_type", GRANT_TYPE)
		.append_pair("scope", credentials.scope())
		.append_pair("client_id", credentials.client_id())
		.finish();
	let request = Request::builder()
		.method(Method::POST)
		.uri(credentials.auth_url().as_str())
		.header(AUTHORIZATION, format!("Basic {basic}"))
		.header(CONTENT_TYPE, FORM_CONTENT_TYPE)
		.header(ACCEPT, "*/*")
		.body(body.into_bytes())?;

	Ok(request)
}

fn token_from_response(
	response: &HttpResponse,
	issued_at: OffsetDateTime,
) -> Result<Token, AcquisitionError> {
	let status = response.status();

	if status != StatusCode::OK {
		let rejection = serde_json::from_slice::<BasicErrorResponse>(response.body()).ok();

		return Err(AcquisitionError::AuthenticationFailed {
			status: status.as_u16(),
			error: rejection.as_ref().map(|body| body.error().as_ref().to_owned()),
			description: rejection.as_ref().and_then(|body| body.error_description().cloned()),
		});
	}

	let mut deserializer = serde_json::Deserializer::from_slice(response.body());
	let payload: TokenResponse = serde_path_to_error::deserialize(&mut deserializer)
		.map_err(|source| AcquisitionError::MalformedResponse { source })?;

	let expires_in = payload.expires_in;

	Token::issued(payload.access_token, issued_at, Duration::seconds(expires_in))
		.ok_or(AcquisitionError::LifetimeOutOfRange { expires_in })
}
