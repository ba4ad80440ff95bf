// std
use std::sync::atomic::{AtomicU64, Ordering};
// self
use crate::{_prelude::*, auth::Token, error::AcquisitionError};

/// How a refresh triggered on the dispatch path ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RefreshOutcome {
	/// A new token replaced the carrier's slot.
	Installed,
	/// The authorization endpoint or the network refused to produce a token.
	Rejected,
	/// The request context was cancelled or ran out of time mid-refresh.
	Interrupted,
}
impl RefreshOutcome {
	/// Classifies the result of a refresh.
	pub fn of<T>(result: &Result<T, AcquisitionError>) -> Self {
		match result {
			Ok(_) => Self::Installed,
			Err(AcquisitionError::Cancelled(_)) => Self::Interrupted,
			Err(_) => Self::Rejected,
		}
	}
}

/// Per-transport refresh bookkeeping, shared by clones of the transport.
///
/// Interrupted refreshes are kept apart from rejections: the former say nothing about the
/// credentials, only about the caller giving up.
#[derive(Debug, Default)]
pub struct RefreshMetrics {
	installed: AtomicU64,
	rejected: AtomicU64,
	interrupted: AtomicU64,
	last_installed_at: Mutex<Option<OffsetDateTime>>,
}
impl RefreshMetrics {
	/// Refreshes started on the dispatch path, whatever their outcome.
	pub fn refreshes(&self) -> u64 {
		self.installed() + self.rejected() + self.interrupted()
	}

	/// Refreshes that installed a new token.
	pub fn installed(&self) -> u64 {
		self.installed.load(Ordering::Relaxed)
	}

	/// Refreshes that failed for reasons other than cancellation.
	pub fn rejected(&self) -> u64 {
		self.rejected.load(Ordering::Relaxed)
	}

	/// Refreshes abandoned because the context was cancelled or timed out.
	pub fn interrupted(&self) -> u64 {
		self.interrupted.load(Ordering::Relaxed)
	}

	/// Clock reading taken when the latest token was installed, if any.
	pub fn last_installed_at(&self) -> Option<OffsetDateTime> {
		*self.last_installed_at.lock()
	}

	pub(crate) fn record(
		&self,
		result: &Result<Arc<Token>, AcquisitionError>,
		now: OffsetDateTime,
	) -> RefreshOutcome {
		let outcome = RefreshOutcome::of(result);
		let counter = match outcome {
			RefreshOutcome::Installed => {
				*self.last_installed_at.lock() = Some(now);

				&self.installed
			},
			RefreshOutcome::Rejected => &self.rejected,
			RefreshOutcome::Interrupted => &self.interrupted,
		};

		counter.fetch_add(1, Ordering::Relaxed);

		outcome
	}
}
