//! Demonstrates acquiring a client-credentials token with the default reqwest transport and
//! sending an authenticated GraphQL request through the refresh-on-dispatch transport.

// crates.io
use color_eyre::Result;
use httpmock::prelude::*;
// self
use oauth2_carrier::{
	auth::Credentials,
	context::Context,
	http::{
		HttpRequest,
		http::{Method, Request, header::CONTENT_TYPE},
	},
	source::ReqwestTokenSource,
	transport::ReqwestAuthenticatedTransport,
};

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let server = MockServer::start_async().await;
	let token_mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/oauth2/token").header_exists("authorization");
			then.status(200)
				.header("content-type", "application/json")
				.body("{\"access_token\":\"demo-access\",\"expires_in\":3600}");
		})
		.await;
	let api_mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/graphql").header("authorization", "Bearer demo-access");
			then.status(200)
				.header("content-type", "application/json")
				.body("{\"data\":{\"viewer\":{\"id\":\"demo\"}}}");
		})
		.await;
	let credentials = Credentials::builder()
		.client_id("demo-client")
		.client_secret("demo-secret")
		.scope("*")
		.auth_url(server.url("/oauth2/token"))
		.api_url(server.url("/graphql"))
		.build()?;
	let transport = ReqwestAuthenticatedTransport::connect(
		&Context::background(),
		credentials,
		ReqwestTokenSource::default(),
	)
	.await?;
	let body = serde_json::json!({ "query": "{ viewer { id } }" });
	let request: HttpRequest = Request::builder()
		.method(Method::POST)
		.uri(transport.api_url().as_str())
		.header(CONTENT_TYPE, "application/json")
		.body(serde_json::to_vec(&body)?)?;
	let response = transport.dispatch(request).await?;

	println!("API answered {}: {}.", response.status(), String::from_utf8_lossy(response.body()));

	token_mock.assert_async().await;
	api_mock.assert_async().await;

	Ok(())
}
