//! Immutable bearer token values.

// self
use crate::{_prelude::*, auth::Secret};

/// Margin subtracted from every token lifetime so refreshes happen before the server-side
/// expiry, absorbing clock drift and request latency.
pub const EXPIRY_SKEW: Duration = Duration::seconds(120);

/// Bearer token plus the absolute instant after which it must be refreshed.
///
/// Tokens are never mutated; a refresh replaces the whole value.
#[derive(Clone, PartialEq, Eq)]
pub struct Token {
	access_token: Secret,
	expires_at: OffsetDateTime,
}
impl Token {
	/// Creates a token with an explicit expiry instant.
	pub fn new(access_token: impl Into<Secret>, expires_at: OffsetDateTime) -> Self {
		Self { access_token: access_token.into(), expires_at }
	}

	/// Creates a token issued at `issued_at` that the server considers valid for `expires_in`.
	///
	/// The stored expiry is `issued_at + expires_in - EXPIRY_SKEW`. Returns `None` when that
	/// instant falls outside the representable date range.
	pub fn issued(
		access_token: impl Into<Secret>,
		issued_at: OffsetDateTime,
		expires_in: Duration,
	) -> Option<Self> {
		let expires_at = issued_at.checked_add(expires_in)?.checked_sub(EXPIRY_SKEW)?;

		Some(Self::new(access_token, expires_at))
	}

	/// Bearer value; callers must avoid logging it.
	pub fn access_token(&self) -> &Secret {
		&self.access_token
	}

	/// Instant from which the token counts as stale.
	pub fn expires_at(&self) -> OffsetDateTime {
		self.expires_at
	}

	/// Returns `true` when `now` is at or past the expiry instant.
	pub fn is_expired_at(&self, now: OffsetDateTime) -> bool {
		now >= self.expires_at
	}

	/// Lifetime left at `now`; negative once expired.
	pub fn remaining_at(&self, now: OffsetDateTime) -> Duration {
		self.expires_at - now
	}
}
impl Debug for Token {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Token")
			.field("access_token", &self.access_token)
			.field("expires_at", &self.expires_at)
			.finish()
	}
}
