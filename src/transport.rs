//! Refresh-on-dispatch decorator for outbound API requests.
//!
//! [`AuthenticatedTransport::dispatch`] re-evaluates the carrier's token on every call. A
//! missing or stale token is replaced through the [`TokenSource`] before the request leaves;
//! if that exchange fails the request is never sent. Concurrent dispatches that all see a
//! stale token each refresh independently and the last write wins on the token slot.

mod metrics;

pub use metrics::{RefreshMetrics, RefreshOutcome};

// crates.io
use oauth2::http::{
	HeaderName, HeaderValue,
	header::{AUTHORIZATION, InvalidHeaderValue},
};
// self
use crate::{
	_prelude::*,
	auth::{Credentials, Token},
	carrier::{AuthenticatedContext, TokenState},
	context::Context,
	error::{AcquisitionError, DispatchError},
	http::{HttpRequest, HttpResponse, HttpTransport, TransportFuture},
	obs::{self, OpSpan, Operation, Outcome},
	source::TokenSource,
};
#[cfg(feature = "reqwest")] use crate::http::ReqwestHttpClient;

/// Header identifying this client to the API.
pub const CLIENT_HEADER: &str = "x-oauth2-client";
/// Default value sent in [`CLIENT_HEADER`].
pub const CLIENT_HEADER_VALUE: &str = concat!("oauth2-carrier/", env!("CARGO_PKG_VERSION"));

#[cfg(feature = "reqwest")]
/// Authenticated transport specialized for the crate's default reqwest stack.
pub type ReqwestAuthenticatedTransport = AuthenticatedTransport<ReqwestHttpClient>;

/// HTTP decorator that injects a fresh bearer token into every request.
///
/// `C` is the transport that carries API requests and `S` the one used for token exchanges;
/// both default to the same type so one client can serve both.
pub struct AuthenticatedTransport<C, S = C>
where
	C: ?Sized + HttpTransport,
	S: ?Sized + HttpTransport,
{
	inner: Arc<C>,
	source: TokenSource<S>,
	carrier: AuthenticatedContext,
	client_header: (HeaderName, HeaderValue),
	refresh_metrics: Arc<RefreshMetrics>,
}
impl<C, S> AuthenticatedTransport<C, S>
where
	C: ?Sized + HttpTransport,
	S: ?Sized + HttpTransport,
{
	/// Wraps `inner`, refreshing the carrier's token through `source` when needed.
	pub fn new(
		carrier: AuthenticatedContext,
		source: TokenSource<S>,
		inner: impl Into<Arc<C>>,
	) -> Self {
		Self {
			inner: inner.into(),
			source,
			carrier,
			client_header: (
				HeaderName::from_static(CLIENT_HEADER),
				HeaderValue::from_static(CLIENT_HEADER_VALUE),
			),
			refresh_metrics: Default::default(),
		}
	}

	/// Overrides the client-identification header sent with every request.
	pub fn with_client_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
		self.client_header = (name, value);

		self
	}

	/// Carrier whose token slot this transport maintains.
	pub fn carrier(&self) -> &AuthenticatedContext {
		&self.carrier
	}

	/// Credentials carried by the carrier.
	pub fn credentials(&self) -> &Credentials {
		self.carrier.credentials()
	}

	/// API base URL callers should target.
	pub fn api_url(&self) -> &Url {
		self.carrier.credentials().api_url()
	}

	/// Counters for refreshes triggered on the dispatch path.
	pub fn refresh_metrics(&self) -> &RefreshMetrics {
		&self.refresh_metrics
	}

	/// Authenticates and forwards `request`, returning the inner transport's answer verbatim.
	///
	/// The request runs under the [`Context`] stored in its extensions; requests without one
	/// get the carrier's context attached. That context also bounds any refresh.
	pub async fn dispatch(&self, mut request: HttpRequest) -> Result<HttpResponse, DispatchError> {
		const OP: Operation = Operation::Dispatch;

		let span = OpSpan::new(OP, "dispatch");

		obs::record_outcome(OP, Outcome::Attempt);

		let result = span
			.instrument(async move {
				let context = match request.extensions().get::<Context>() {
					Some(context) => context.clone(),
					None => {
						let context = self.carrier.context().clone();

						request.extensions_mut().insert(context.clone());

						context
					},
				};
				let token = self.current_token(&context).await?;
				let headers = request.headers_mut();

				headers.insert(AUTHORIZATION, bearer(&token)?);
				headers.insert(self.client_header.0.clone(), self.client_header.1.clone());

				context.run(self.inner.execute(request)).await?.map_err(DispatchError::transport)
			})
			.await;

		match &result {
			Ok(_) => obs::record_outcome(OP, Outcome::Success),
			Err(_) => obs::record_outcome(OP, Outcome::Failure),
		}

		result
	}

	async fn current_token(&self, context: &Context) -> Result<Arc<Token>, AcquisitionError> {
		let state = self.carrier.token_state(self.source.clock().now());

		obs::trace_token_state(
			state.as_str(),
			match &state {
				TokenState::Fresh(token) | TokenState::Stale(token) => Some(token.expires_at()),
				TokenState::Missing => None,
			},
		);

		match state {
			TokenState::Fresh(token) => Ok(token),
			TokenState::Missing | TokenState::Stale(_) => self.refresh(context).await,
		}
	}

	async fn refresh(&self, context: &Context) -> Result<Arc<Token>, AcquisitionError> {
		const OP: Operation = Operation::Refresh;

		let span = OpSpan::new(OP, "refresh");

		obs::record_outcome(OP, Outcome::Attempt);

		let result = span
			.instrument(self.source.acquire(self.carrier.credentials(), context))
			.await
			.map(|token| self.carrier.install_token(token));

		match self.refresh_metrics.record(&result, self.source.clock().now()) {
			RefreshOutcome::Installed => obs::record_outcome(OP, Outcome::Success),
			RefreshOutcome::Rejected | RefreshOutcome::Interrupted =>
				obs::record_outcome(OP, Outcome::Failure),
		}

		result
	}
}
impl<C> AuthenticatedTransport<C, C>
where
	C: ?Sized + HttpTransport,
{
	/// Builds a carrier (acquiring the first token) and a transport that reuses the source's
	/// HTTP client for API calls.
	pub async fn connect(
		base: &Context,
		credentials: impl Into<Arc<Credentials>>,
		source: TokenSource<C>,
	) -> Result<Self> {
		let carrier = AuthenticatedContext::new(base, credentials, &source).await?;

		Ok(Self::from_source(carrier, source))
	}

	/// Wraps an existing carrier, reusing the source's HTTP client for API calls.
	pub fn from_source(carrier: AuthenticatedContext, source: TokenSource<C>) -> Self {
		let inner = Arc::clone(source.http_client());

		Self::new(carrier, source, inner)
	}
}
impl<C, S> HttpTransport for AuthenticatedTransport<C, S>
where
	C: ?Sized + HttpTransport,
	S: ?Sized + HttpTransport,
{
	type Error = DispatchError;

	fn execute(&self, request: HttpRequest) -> TransportFuture<'_, Self::Error> {
		Box::pin(self.dispatch(request))
	}
}
impl<C, S> Clone for AuthenticatedTransport<C, S>
where
	C: ?Sized + HttpTransport,
	S: ?Sized + HttpTransport,
{
	fn clone(&self) -> Self {
		Self {
			inner: Arc::clone(&self.inner),
			source: self.source.clone(),
			carrier: self.carrier.clone(),
			client_header: self.client_header.clone(),
			refresh_metrics: Arc::clone(&self.refresh_metrics),
		}
	}
}
impl<C, S> Debug for AuthenticatedTransport<C, S>
where
	C: ?Sized + HttpTransport,
	S: ?Sized + HttpTransport,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("AuthenticatedTransport")
			.field("carrier", &self.carrier)
			.field("client_header", &self.client_header.0)
			.field("refresh_metrics", &self.refresh_metrics)
			.finish()
	}
}

fn bearer(token: &Token) -> Result<HeaderValue, InvalidHeaderValue> {
	let mut value = HeaderValue::from_str(&format!("Bearer {}", token.access_token().expose()))?;

	value.set_sensitive(true);

	Ok(value)
}

#[cfg(test)]
mod tests {
	// std
	use std::{collections::VecDeque, time::Duration as StdDuration};
	// crates.io
	use oauth2::http::{Method, Request, StatusCode};
	// self
	use super::*;
	use crate::{
		clock::{Clock, ManualClock},
		context::Interrupted,
	};

	#[derive(Debug, ThisError)]
	#[error("Scripted transport has no response queued.")]
	struct Exhausted;

	#[derive(Default)]
	struct ScriptedTransport {
		tokens: Mutex<VecDeque<(u16, String)>>,
		seen: Mutex<Vec<HttpRequest>>,
		token_delay: Option<StdDuration>,
		stall_api: bool,
	}
	impl ScriptedTransport {
		fn with_tokens<I>(tokens: I) -> Self
		where
			I: IntoIterator<Item = (u16, &'static str)>,
		{
			Self {
				tokens: Mutex::new(tokens.into_iter().map(|(s, b)| (s, b.to_owned())).collect()),
				..Default::default()
			}
		}

		fn token_calls(&self) -> usize {
			self.seen.lock().iter().filter(|r| r.uri().path().ends_with("oauth2/token")).count()
		}

		fn api_calls(&self) -> Vec<Option<String>> {
			self.seen
				.lock()
				.iter()
				.filter(|r| r.uri().path() == "/graphql")
				.map(|r| {
					r.headers().get(AUTHORIZATION).and_then(|v| v.to_str().ok()).map(str::to_owned)
				})
				.collect()
		}
	}
	impl HttpTransport for ScriptedTransport {
		type Error = Exhausted;

		fn execute(&self, request: HttpRequest) -> TransportFuture<'_, Self::Error> {
			let is_token = request.uri().path().ends_with("oauth2/token");

			Box::pin(async move {
				self.seen.lock().push(request);

				if !is_token {
					if self.stall_api {
						std::future::pending::<()>().await;
					}

					return Ok(HttpResponse::new(b"{\"data\":{}}".to_vec()));
				}

				if let Some(delay) = self.token_delay {
					tokio::time::sleep(delay).await;
				}

				let (status, body) = self.tokens.lock().pop_front().ok_or(Exhausted)?;
				let mut response = HttpResponse::new(body.into_bytes());

				*response.status_mut() =
					StatusCode::from_u16(status).expect("Scripted status should be valid.");

				Ok(response)
			})
		}
	}

	fn credentials() -> Credentials {
		Credentials::builder()
			.client_id("test_client_id")
			.client_secret("test_client_secret")
			.scope("*")
			.auth_url("https://auth.example.com/oauth2/token")
			.api_url("https://api.example.com/graphql")
			.build()
			.expect("Fixture credentials should validate.")
	}

	fn api_request() -> HttpRequest {
		Request::builder()
			.method(Method::POST)
			.uri("https://api.example.com/graphql")
			.body(b"{\"query\":\"{ viewer { id } }\"}".to_vec())
			.expect("Fixture API request should build.")
	}

	fn transport(
		scripted: Arc<ScriptedTransport>,
		clock: &ManualClock,
		seed: Option<Token>,
	) -> AuthenticatedTransport<ScriptedTransport> {
		let clock: Arc<dyn Clock> = Arc::new(clock.clone());
		let source = TokenSource::<ScriptedTransport>::new(Arc::clone(&scripted)).with_clock(clock);
		let base = Context::background();
		let carrier = match seed {
			Some(token) => AuthenticatedContext::with_token(&base, credentials(), token),
			None => AuthenticatedContext::pending(&base, credentials()),
		}
		.expect("Fixture carrier should build.");

		AuthenticatedTransport::from_source(carrier, source)
	}

	fn seeded_token() -> Token {
		Token::issued("tok-A", OffsetDateTime::UNIX_EPOCH, Duration::seconds(3600))
			.expect("Fixture token should build.")
	}

	#[tokio::test]
	async fn fresh_token_is_reused_without_refresh() {
		let scripted = Arc::new(ScriptedTransport::default());
		let clock = ManualClock::default();
		let transport = transport(Arc::clone(&scripted), &clock, Some(seeded_token()));

		clock.advance(Duration::seconds(60));

		let response = transport.dispatch(api_request()).await.expect("Dispatch should succeed.");

		assert_eq!(response.status(), StatusCode::OK);
		assert_eq!(scripted.token_calls(), 0);
		assert_eq!(scripted.api_calls(), vec![Some("Bearer tok-A".to_owned())]);
		assert_eq!(transport.refresh_metrics().refreshes(), 0);
	}

	#[tokio::test]
	async fn stale_token_is_refreshed_before_dispatch() {
		let scripted = Arc::new(ScriptedTransport::with_tokens([(
			200,
			r#"{"access_token":"tok-B","expires_in":3600}"#,
		)]));
		let clock = ManualClock::default();
		let transport = transport(Arc::clone(&scripted), &clock, Some(seeded_token()));

		clock.advance(Duration::seconds(3481));
		transport.dispatch(api_request()).await.expect("Dispatch should succeed.");

		assert_eq!(scripted.token_calls(), 1);
		assert_eq!(scripted.api_calls(), vec![Some("Bearer tok-B".to_owned())]);

		let token = transport.carrier().token().expect("Refreshed token should be installed.");

		assert_eq!(token.access_token().expose(), "tok-B");
		assert_eq!(token.expires_at(), OffsetDateTime::UNIX_EPOCH + Duration::seconds(6961));
		assert_eq!(transport.refresh_metrics().installed(), 1);
		assert_eq!(
			transport.refresh_metrics().last_installed_at(),
			Some(OffsetDateTime::UNIX_EPOCH + Duration::seconds(3481))
		);

		transport.dispatch(api_request()).await.expect("Second dispatch should succeed.");

		assert_eq!(scripted.token_calls(), 1);
	}

	#[tokio::test]
	async fn failed_refresh_aborts_the_request() {
		let scripted = Arc::new(ScriptedTransport::with_tokens([(403, "forbidden")]));
		let clock = ManualClock::default();
		let transport = transport(Arc::clone(&scripted), &clock, Some(seeded_token()));

		clock.advance(Duration::seconds(3481));

		let err = transport.dispatch(api_request()).await.expect_err("Refresh failure must abort.");

		match err {
			DispatchError::Acquisition(AcquisitionError::AuthenticationFailed { status, .. }) =>
				assert_eq!(status, 403),
			other => panic!("Unexpected error variant: {other:?}."),
		}

		assert!(scripted.api_calls().is_empty());
		assert_eq!(
			transport.carrier().token().map(|t| t.access_token().expose().to_owned()),
			Some("tok-A".to_owned())
		);
		assert_eq!(transport.refresh_metrics().rejected(), 1);
		assert_eq!(transport.refresh_metrics().interrupted(), 0);
	}

	#[tokio::test]
	async fn missing_token_is_acquired_on_first_dispatch() {
		let scripted = Arc::new(ScriptedTransport::with_tokens([(
			200,
			r#"{"access_token":"tok-lazy","expires_in":600}"#,
		)]));
		let clock = ManualClock::default();
		let transport = transport(Arc::clone(&scripted), &clock, None);

		transport.dispatch(api_request()).await.expect("Dispatch should succeed.");

		assert_eq!(scripted.token_calls(), 1);
		assert_eq!(scripted.api_calls(), vec![Some("Bearer tok-lazy".to_owned())]);
	}

	#[tokio::test]
	async fn client_header_and_context_are_attached() {
		let scripted = Arc::new(ScriptedTransport::default());
		let clock = ManualClock::default();
		let transport = transport(Arc::clone(&scripted), &clock, Some(seeded_token()))
			.with_client_header(
				HeaderName::from_static("x-fragment-client"),
				HeaderValue::from_static("rust-client"),
			);

		transport.dispatch(api_request()).await.expect("Dispatch should succeed.");

		let seen = scripted.seen.lock();
		let request = seen.first().expect("API request should reach the transport.");

		assert_eq!(
			request.headers().get("x-fragment-client").and_then(|v| v.to_str().ok()),
			Some("rust-client")
		);
		assert!(request.headers().get(AUTHORIZATION).is_some_and(HeaderValue::is_sensitive));
		assert!(request.extensions().get::<Context>().is_some());
	}

	#[tokio::test]
	async fn request_context_bounds_the_dispatch() {
		let scripted = Arc::new(ScriptedTransport { stall_api: true, ..Default::default() });
		let clock = ManualClock::default();
		let transport = transport(Arc::clone(&scripted), &clock, Some(seeded_token()));
		let mut request = api_request();

		let deadline = Context::background().with_timeout(StdDuration::from_millis(20));

		request.extensions_mut().insert(deadline);

		let err = transport.dispatch(request).await.expect_err("Stalled dispatch must time out.");

		assert!(matches!(err, DispatchError::Cancelled(Interrupted::DeadlineExceeded)));
	}

	#[tokio::test]
	async fn cancelled_carrier_refuses_to_refresh() {
		let scripted = Arc::new(ScriptedTransport::default());
		let clock = ManualClock::default();
		let transport = transport(Arc::clone(&scripted), &clock, None);

		transport.carrier().cancel();

		let err =
			transport.dispatch(api_request()).await.expect_err("Cancelled carrier must fail.");

		assert!(matches!(
			err,
			DispatchError::Acquisition(AcquisitionError::Cancelled(Interrupted::Cancelled))
		));
		assert_eq!(scripted.token_calls(), 0);
	}

	#[tokio::test]
	async fn cancellation_during_refresh_returns_promptly() {
		let scripted = Arc::new(ScriptedTransport {
			tokens: Mutex::new(VecDeque::from([(
				200,
				r#"{"access_token":"tok-late","expires_in":3600}"#.to_owned(),
			)])),
			token_delay: Some(StdDuration::from_secs(3600)),
			..Default::default()
		});
		let clock = ManualClock::default();
		let transport = transport(Arc::clone(&scripted), &clock, None);
		let context = Context::background();
		let canceller = context.clone();
		let mut request = api_request();

		request.extensions_mut().insert(context);
		tokio::spawn(async move {
			tokio::time::sleep(StdDuration::from_millis(20)).await;
			canceller.cancel();
		});

		let err = tokio::time::timeout(StdDuration::from_secs(5), transport.dispatch(request))
			.await
			.expect("Cancellation should end the in-flight refresh.")
			.expect_err("Cancelled refresh must fail the dispatch.");

		assert!(matches!(
			err,
			DispatchError::Acquisition(AcquisitionError::Cancelled(Interrupted::Cancelled))
		));
		assert_eq!(scripted.token_calls(), 1);
		assert!(scripted.api_calls().is_empty());
		assert!(transport.carrier().token().is_none());
		assert_eq!(transport.refresh_metrics().interrupted(), 1);
		assert_eq!(transport.refresh_metrics().rejected(), 0);
	}

	#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
	async fn concurrent_stale_dispatches_each_send_a_whole_bearer() {
		const DISPATCHES: usize = 8;

		let issued = (0..DISPATCHES).map(|i| format!("tok-{i}")).collect::<Vec<_>>();
		let scripted = Arc::new(ScriptedTransport {
			tokens: Mutex::new(
				issued
					.iter()
					.map(|t| (200, format!(r#"{{"access_token":"{t}","expires_in":3600}}"#)))
					.collect(),
			),
			token_delay: Some(StdDuration::from_millis(10)),
			..Default::default()
		});
		let clock = ManualClock::default();
		let transport = transport(Arc::clone(&scripted), &clock, Some(seeded_token()));

		clock.advance(Duration::seconds(3481));

		let handles = (0..DISPATCHES)
			.map(|_| {
				let transport = transport.clone();

				tokio::spawn(async move { transport.dispatch(api_request()).await })
			})
			.collect::<Vec<_>>();

		for handle in handles {
			handle
				.await
				.expect("Dispatch task should not panic.")
				.expect("Every concurrent dispatch should succeed.");
		}

		let bearers = scripted.api_calls();

		assert_eq!(bearers.len(), DISPATCHES);

		for bearer in bearers {
			let bearer = bearer.expect("Every API request should carry a bearer header.");

			assert!(
				issued.iter().any(|t| bearer == format!("Bearer {t}")),
				"Unexpected bearer header: {bearer}."
			);
		}

		let refreshes = transport.refresh_metrics().refreshes();

		assert!((1..=DISPATCHES as u64).contains(&refreshes));
		assert_eq!(refreshes, scripted.token_calls() as u64);
		assert_eq!(transport.refresh_metrics().installed(), refreshes);

		let current = transport.carrier().token().expect("A refreshed token should be installed.");

		assert!(issued.iter().any(|t| t == current.access_token().expose()));
	}
}
