//! Cancellable, deadline-bearing execution contexts.
//!
//! A [`Context`] travels with every token request and outbound API call. Deriving a context
//! from another one links their lifetimes: cancelling the parent cancels every descendant, and
//! a derived deadline can only tighten the inherited one. Cancelling a child never reaches the
//! parent.

// crates.io
use tokio::time::{self as tokio_time, Instant};
use tokio_util::sync::CancellationToken;
// self
use crate::_prelude::*;

/// Reason a context stopped accepting work.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, ThisError)]
pub enum Interrupted {
	/// [`Context::cancel`] was called on the context or one of its ancestors.
	#[error("Context was cancelled before the request completed.")]
	Cancelled,
	/// The context deadline passed before the request completed.
	#[error("Context deadline elapsed before the request completed.")]
	DeadlineExceeded,
}

/// Execution context carrying cancellation and an optional deadline.
#[derive(Clone, Debug, Default)]
pub struct Context {
	cancel: CancellationToken,
	deadline: Option<Instant>,
}
impl Context {
	/// Creates a root context that is never cancelled unless asked to and has no deadline.
	pub fn background() -> Self {
		Self::default()
	}

	/// Derives a child context that inherits cancellation and the deadline.
	pub fn child(&self) -> Self {
		Self { cancel: self.cancel.child_token(), deadline: self.deadline }
	}

	/// Derives a child context that expires at `deadline` (or earlier, if inherited).
	pub fn with_deadline(&self, deadline: Instant) -> Self {
		let deadline = match self.deadline {
			Some(inherited) if inherited < deadline => inherited,
			_ => deadline,
		};

		Self { cancel: self.cancel.child_token(), deadline: Some(deadline) }
	}

	/// Derives a child context that expires after `timeout`.
	pub fn with_timeout(&self, timeout: std::time::Duration) -> Self {
		self.with_deadline(Instant::now() + timeout)
	}

	/// Cancels this context and all contexts derived from it.
	pub fn cancel(&self) {
		self.cancel.cancel();
	}

	/// Returns `true` once this context or an ancestor has been cancelled.
	pub fn is_cancelled(&self) -> bool {
		self.cancel.is_cancelled()
	}

	/// Returns the effective deadline, if any.
	pub fn deadline(&self) -> Option<Instant> {
		self.deadline
	}

	/// Reports why the context is done, or `None` while it is still live.
	pub fn err(&self) -> Option<Interrupted> {
		if self.is_cancelled() {
			return Some(Interrupted::Cancelled);
		}

		match self.deadline {
			Some(deadline) if deadline <= Instant::now() => Some(Interrupted::DeadlineExceeded),
			_ => None,
		}
	}

	/// Completes when the context is cancelled.
	pub async fn cancelled(&self) {
		self.cancel.cancelled().await
	}

	/// Drives `fut` to completion unless the context is cancelled or its deadline passes first.
	///
	/// The future is dropped as soon as the context is done, which aborts any in-flight I/O it
	/// owns.
	pub async fn run<F>(&self, fut: F) -> Result<F::Output, Interrupted>
	where
		F: Future,
	{
		if let Some(reason) = self.err() {
			return Err(reason);
		}

		let deadline = async {
			match self.deadline {
				Some(at) => tokio_time::sleep_until(at).await,
				None => std::future::pending::<()>().await,
			}
		};

		tokio::select! {
			biased;

			_ = self.cancel.cancelled() => Err(Interrupted::Cancelled),
			_ = deadline => Err(Interrupted::DeadlineExceeded),
			output = fut => Ok(output),
		}
	}
}
