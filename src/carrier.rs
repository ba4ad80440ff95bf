//! Request-scoped carrier that binds credentials and the current token to a [`Context`].
//!
//! An [`AuthenticatedContext`] is a derived context: it inherits cancellation and deadlines
//! from the base context it was built from and dereferences to [`Context`] so it can be handed
//! to anything that expects one. On top of that it exposes typed slots for the caller's
//! [`Credentials`] (fixed at construction) and the current [`Token`] (swapped atomically on
//! refresh). Clones share both slots.

// crates.io
use arc_swap::ArcSwapOption;
// self
use crate::{
	_prelude::*,
	auth::{Credentials, Token},
	context::Context,
	error::ValidationError,
	http::HttpTransport,
	source::TokenSource,
};

/// Freshness of the token slot at a given instant.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TokenState {
	/// No acquisition has succeeded yet.
	Missing,
	/// A token is present but its (skewed) expiry has passed.
	Stale(Arc<Token>),
	/// A token is present and usable.
	Fresh(Arc<Token>),
}
impl TokenState {
	/// Classifies `token` at `now`.
	pub fn evaluate(token: Option<Arc<Token>>, now: OffsetDateTime) -> Self {
		match token {
			None => Self::Missing,
			Some(token) if token.is_expired_at(now) => Self::Stale(token),
			Some(token) => Self::Fresh(token),
		}
	}

	/// Returns the fresh token, if any.
	pub fn fresh(self) -> Option<Arc<Token>> {
		match self {
			Self::Fresh(token) => Some(token),
			_ => None,
		}
	}

	/// Returns a stable label suitable for logs.
	pub const fn as_str(&self) -> &'static str {
		match self {
			Self::Missing => "missing",
			Self::Stale(_) => "stale",
			Self::Fresh(_) => "fresh",
		}
	}
}

/// Context carrying credentials and the current bearer token.
#[derive(Clone)]
pub struct AuthenticatedContext(Arc<Slots>);

struct Slots {
	context: Context,
	credentials: Arc<Credentials>,
	token: ArcSwapOption<Token>,
}

impl AuthenticatedContext {
	/// Validates `credentials`, derives a child of `base`, and acquires the first token.
	///
	/// Acquisition runs under the derived context, so cancelling `base` aborts it.
	pub async fn new<C>(
		base: &Context,
		credentials: impl Into<Arc<Credentials>>,
		source: &TokenSource<C>,
	) -> Result<Self>
	where
		C: ?Sized + HttpTransport,
	{
		let carrier = Self::pending(base, credentials)?;
		let token = source.acquire(carrier.credentials(), carrier.context()).await?;

		carrier.set_token(token);

		Ok(carrier)
	}

	/// Validates `credentials` and seeds the carrier with a token obtained elsewhere.
	pub fn with_token(
		base: &Context,
		credentials: impl Into<Arc<Credentials>>,
		token: Token,
	) -> Result<Self, ValidationError> {
		let carrier = Self::pending(base, credentials)?;

		carrier.set_token(token);

		Ok(carrier)
	}

	/// Validates `credentials` without acquiring; the first dispatch fills the token slot.
	pub fn pending(
		base: &Context,
		credentials: impl Into<Arc<Credentials>>,
	) -> Result<Self, ValidationError> {
		let credentials = credentials.into();

		credentials.validate()?;

		Ok(Self(Arc::new(Slots {
			context: base.child(),
			credentials,
			token: ArcSwapOption::empty(),
		})))
	}

	/// Execution context the carrier wraps.
	pub fn context(&self) -> &Context {
		&self.0.context
	}

	/// Credentials the carrier was built with.
	pub fn credentials(&self) -> &Credentials {
		&self.0.credentials
	}

	/// Shared handle to the credentials.
	pub fn credentials_arc(&self) -> Arc<Credentials> {
		Arc::clone(&self.0.credentials)
	}

	/// Snapshot of the current token; `None` until the first acquisition succeeds.
	///
	/// The snapshot stays valid even if another task replaces the slot afterwards.
	pub fn token(&self) -> Option<Arc<Token>> {
		self.0.token.load_full()
	}

	/// Atomically replaces the token slot.
	pub fn set_token(&self, token: Token) {
		self.install_token(token);
	}

	pub(crate) fn install_token(&self, token: Token) -> Arc<Token> {
		let token = Arc::new(token);

		self.0.token.store(Some(Arc::clone(&token)));

		token
	}

	/// Evaluates the token slot at `now`.
	pub fn token_state(&self, now: OffsetDateTime) -> TokenState {
		TokenState::evaluate(self.token(), now)
	}
}
impl Deref for AuthenticatedContext {
	type Target = Context;

	fn deref(&self) -> &Self::Target {
		self.context()
	}
}
impl AsRef<Context> for AuthenticatedContext {
	fn as_ref(&self) -> &Context {
		self.context()
	}
}
impl Debug for AuthenticatedContext {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("AuthenticatedContext")
			.field("context", &self.0.context)
			.field("credentials", &self.0.credentials)
			.field("token", &self.token())
			.finish()
	}
}
