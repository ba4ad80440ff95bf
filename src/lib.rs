//! OAuth 2.0 client-credentials token lifecycle for API clients: validated credentials, typed
//! carrier contexts, clock-aware expiry, and transports that refresh on dispatch.
//!
//! The usual flow is to build [`auth::Credentials`], let
//! [`carrier::AuthenticatedContext::new`] fetch the first token through a
//! [`source::TokenSource`], and then send every API request through a
//! [`transport::AuthenticatedTransport`], which re-checks expiry and refreshes before the
//! request leaves.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod auth;
pub mod carrier;
pub mod clock;
pub mod context;
pub mod error;
pub mod http;
pub mod obs;
pub mod source;
pub mod transport;
#[cfg(all(any(test, feature = "test"), feature = "reqwest"))]
pub mod _preludet {
	//! Convenience re-exports and helpers for integration tests; enabled via `cfg(test)` or the
	//! `test` crate feature.

	pub use crate::_prelude::*;

	// self
	use crate::{
		auth::Credentials,
		clock::{Clock, ManualClock},
		http::ReqwestHttpClient,
		source::{ReqwestTokenSource, TokenSource},
	};

	/// Client identifier shared by integration fixtures.
	pub const TEST_CLIENT_ID: &str = "test_client_id";
	/// Client secret shared by integration fixtures.
	pub const TEST_CLIENT_SECRET: &str = "test_client_secret";
	/// Path of the mock token endpoint.
	pub const TOKEN_PATH: &str = "/oauth2/token";
	/// Path of the mock API endpoint.
	pub const API_PATH: &str = "/graphql";

	/// Builds a reqwest HTTP client that accepts the self-signed certificates produced by
	/// `httpmock` during tests.
	pub fn test_reqwest_http_client() -> ReqwestHttpClient {
		let client = ReqwestClient::builder()
			.danger_accept_invalid_certs(true)
			.danger_accept_invalid_hostnames(true)
			.build()
			.expect("Failed to build insecure Reqwest client for tests.");

		ReqwestHttpClient::with_client(client)
	}

	/// Builds fixture credentials whose endpoints live under `base_url`.
	pub fn test_credentials(base_url: &str) -> Credentials {
		let base = base_url.trim_end_matches('/');

		Credentials::builder()
			.client_id(TEST_CLIENT_ID)
			.client_secret(TEST_CLIENT_SECRET)
			.scope("*")
			.auth_url(format!("{base}{TOKEN_PATH}"))
			.api_url(format!("{base}{API_PATH}"))
			.build()
			.expect("Failed to build fixture credentials.")
	}

	/// Builds a reqwest-backed token source driven by `clock`.
	pub fn test_token_source(clock: &ManualClock) -> ReqwestTokenSource {
		let clock: Arc<dyn Clock> = Arc::new(clock.clone());

		TokenSource::new(test_reqwest_http_client()).with_clock(clock)
	}
}

mod _prelude {
	pub use std::{
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		ops::Deref,
		pin::Pin,
		sync::Arc,
	};

	pub use parking_lot::Mutex;
	#[cfg(feature = "reqwest")]
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::Deserialize;
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

#[cfg(feature = "reqwest")] pub use reqwest;
pub use url;
#[cfg(all(test, feature = "reqwest"))] use {color_eyre as _, httpmock as _};
