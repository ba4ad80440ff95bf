//! Client-credentials parameter bundle and its structural validation.

// self
use crate::{_prelude::*, auth::Secret, error::ValidationError};

/// Path suffix every authorization URL must carry.
pub const TOKEN_ENDPOINT_SUFFIX: &str = "oauth2/token";

/// Validated parameters needed to mint tokens and reach the API.
///
/// Values are immutable once built. Share them behind an [`Arc`] so carriers reference the
/// caller's copy instead of duplicating the secret.
#[derive(Clone, PartialEq, Eq, Deserialize)]
#[serde(try_from = "RawCredentials")]
pub struct Credentials {
	client_id: String,
	client_secret: Secret,
	scope: String,
	auth_url: Url,
	api_url: Url,
}
impl Credentials {
	/// Returns a builder that validates on [`CredentialsBuilder::build`].
	pub fn builder() -> CredentialsBuilder {
		CredentialsBuilder::default()
	}

	/// Checks that the authorization URL points at a token-issuance endpoint.
	///
	/// Purely structural: no network access is performed.
	pub fn validate(&self) -> Result<(), ValidationError> {
		if self.auth_url.path().ends_with(TOKEN_ENDPOINT_SUFFIX) {
			Ok(())
		} else {
			Err(ValidationError::InvalidAuthEndpoint {
				url: self.auth_url.to_string(),
				expected: TOKEN_ENDPOINT_SUFFIX,
			})
		}
	}

	/// OAuth 2.0 client identifier.
	pub fn client_id(&self) -> &str {
		&self.client_id
	}

	/// OAuth 2.0 client secret.
	pub fn client_secret(&self) -> &Secret {
		&self.client_secret
	}

	/// Scope requested on every token exchange.
	pub fn scope(&self) -> &str {
		&self.scope
	}

	/// Token endpoint URL.
	pub fn auth_url(&self) -> &Url {
		&self.auth_url
	}

	/// Base URL of the API the tokens are minted for.
	pub fn api_url(&self) -> &Url {
		&self.api_url
	}
}
impl Debug for Credentials {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Credentials")
			.field("client_id", &self.client_id)
			.field("client_secret", &self.client_secret)
			.field("scope", &self.scope)
			.field("auth_url", &self.auth_url.as_str())
			.field("api_url", &self.api_url.as_str())
			.finish()
	}
}
impl TryFrom<RawCredentials> for Credentials {
	type Error = ValidationError;

	fn try_from(raw: RawCredentials) -> Result<Self, Self::Error> {
		Credentials::builder()
			.client_id(raw.client_id)
			.client_secret(raw.client_secret)
			.scope(raw.scope)
			.auth_url(raw.auth_url)
			.api_url(raw.api_url)
			.build()
	}
}

/// Builder for [`Credentials`].
#[derive(Debug, Default)]
pub struct CredentialsBuilder {
	client_id: Option<String>,
	client_secret: Option<Secret>,
	scope: String,
	auth_url: Option<String>,
	api_url: Option<String>,
}
impl CredentialsBuilder {
	/// Sets the client identifier.
	pub fn client_id(mut self, client_id: impl Into<String>) -> Self {
		self.client_id = Some(client_id.into());

		self
	}

	/// Sets the client secret.
	pub fn client_secret(mut self, client_secret: impl Into<Secret>) -> Self {
		self.client_secret = Some(client_secret.into());

		self
	}

	/// Sets the requested scope (sent verbatim).
	pub fn scope(mut self, scope: impl Into<String>) -> Self {
		self.scope = scope.into();

		self
	}

	/// Sets the token endpoint URL; its path must end with [`TOKEN_ENDPOINT_SUFFIX`].
	pub fn auth_url(mut self, url: impl AsRef<str>) -> Self {
		self.auth_url = Some(url.as_ref().to_owned());

		self
	}

	/// Sets the API base URL.
	pub fn api_url(mut self, url: impl AsRef<str>) -> Self {
		self.api_url = Some(url.as_ref().to_owned());

		self
	}

	/// Consumes the builder and validates the resulting credentials.
	pub fn build(self) -> Result<Credentials, ValidationError> {
		let client_id = self
			.client_id
			.filter(|value| !value.trim().is_empty())
			.ok_or(ValidationError::MissingField { field: "client_id" })?;
		let client_secret = self
			.client_secret
			.filter(|secret| !secret.is_blank())
			.ok_or(ValidationError::MissingField { field: "client_secret" })?;
		let auth_url = parse_url("auth_url", self.auth_url)?;
		let api_url = parse_url("api_url", self.api_url)?;
		let credentials =
			Credentials { client_id, client_secret, scope: self.scope, auth_url, api_url };

		credentials.validate()?;

		Ok(credentials)
	}
}

#[derive(Deserialize)]
struct RawCredentials {
	client_id: String,
	client_secret: Secret,
	#[serde(default)]
	scope: String,
	auth_url: String,
	api_url: String,
}

fn parse_url(field: &'static str, value: Option<String>) -> Result<Url, ValidationError> {
	let value = value
		.filter(|value| !value.trim().is_empty())
		.ok_or(ValidationError::MissingField { field })?;

	Url::parse(&value).map_err(|source| ValidationError::InvalidUrl { field, source })
}
