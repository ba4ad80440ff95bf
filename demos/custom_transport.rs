//! Demonstrates plugging a custom [`HttpTransport`] into the token source and transport.
//!
//! 1. Implement [`HttpTransport`] for any client; only failures to obtain a response are errors.
//! 2. Hand it to [`TokenSource::new`] and build the carrier with [`AuthenticatedContext::new`].
//! 3. Drive time with a [`ManualClock`] to watch the transport refresh a stale token.

// std
use std::{
	error::Error as StdError,
	fmt::{Display, Formatter, Result as FmtResult},
	sync::{
		Arc,
		atomic::{AtomicUsize, Ordering},
	},
};
// crates.io
use color_eyre::Result;
use time::{Duration, OffsetDateTime};
// self
use oauth2_carrier::{
	auth::Credentials,
	carrier::AuthenticatedContext,
	clock::{Clock, ManualClock},
	context::Context,
	http::{
		HttpRequest, HttpResponse, HttpTransport, TransportFuture,
		http::{Method, Request, header::AUTHORIZATION},
	},
	source::TokenSource,
	transport::AuthenticatedTransport,
};

#[derive(Debug)]
struct Unreachable;
impl Display for Unreachable {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		write!(f, "In-memory transport cannot fail.")
	}
}
impl StdError for Unreachable {}

/// Answers token requests with numbered tokens and echoes the bearer header for API calls.
#[derive(Default)]
struct InMemoryTransport {
	issued: AtomicUsize,
}
impl HttpTransport for InMemoryTransport {
	type Error = Unreachable;

	fn execute(&self, request: HttpRequest) -> TransportFuture<'_, Self::Error> {
		Box::pin(async move {
			let body = if request.uri().path().ends_with("oauth2/token") {
				let n = self.issued.fetch_add(1, Ordering::Relaxed) + 1;

				format!("{{\"access_token\":\"memory-{n}\",\"expires_in\":3600}}")
			} else {
				let bearer = request
					.headers()
					.get(AUTHORIZATION)
					.and_then(|v| v.to_str().ok())
					.unwrap_or_default();

				format!("{{\"seen\":\"{bearer}\"}}")
			};

			Ok(HttpResponse::new(body.into_bytes()))
		})
	}
}

fn api_request(url: &str) -> Result<HttpRequest> {
	Ok(Request::builder().method(Method::POST).uri(url).body(b"{}".to_vec())?)
}

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let clock = ManualClock::new(OffsetDateTime::UNIX_EPOCH);
	let shared_clock: Arc<dyn Clock> = Arc::new(clock.clone());
	let source =
		TokenSource::<InMemoryTransport>::new(InMemoryTransport::default()).with_clock(shared_clock);
	let credentials = Credentials::builder()
		.client_id("demo-client")
		.client_secret("demo-secret")
		.auth_url("https://auth.example.com/oauth2/token")
		.api_url("https://api.example.com/graphql")
		.build()?;
	let carrier = AuthenticatedContext::new(&Context::background(), credentials, &source).await?;
	let transport = AuthenticatedTransport::from_source(carrier, source);
	let url = transport.api_url().to_string();
	let first = transport.dispatch(api_request(&url)?).await?;

	println!("Before expiry: {}.", String::from_utf8_lossy(first.body()));

	clock.advance(Duration::hours(1));

	let second = transport.dispatch(api_request(&url)?).await?;

	println!("After expiry: {}.", String::from_utf8_lossy(second.body()));
	println!("Refreshes on dispatch: {}.", transport.refresh_metrics().installed());

	Ok(())
}
