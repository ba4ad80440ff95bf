// self
use crate::{
	_prelude::*,
	obs::{Operation, Outcome},
};

/// Records an operation outcome on the `oauth2_carrier_op_total` counter (when enabled).
pub fn record_outcome(op: Operation, outcome: Outcome) {
	#[cfg(feature = "metrics")]
	{
		metrics::counter!(
			"oauth2_carrier_op_total",
			"op" => op.as_str(),
			"outcome" => outcome.as_str()
		)
		.increment(1);
	}

	#[cfg(not(feature = "metrics"))]
	{
		let _ = (op, outcome);
	}
}

/// Records the usable lifetime of a freshly minted token, after the expiry skew, on the
/// `oauth2_carrier_token_lifetime_seconds` histogram (when enabled).
///
/// Lifetimes at or below zero mean the endpoint hands out tokens that are stale on arrival,
/// which turns every dispatch into a refresh.
pub fn record_token_lifetime(lifetime: Duration) {
	#[cfg(feature = "metrics")]
	{
		metrics::histogram!("oauth2_carrier_token_lifetime_seconds")
			.record(lifetime.as_seconds_f64());
	}

	#[cfg(not(feature = "metrics"))]
	{
		let _ = lifetime;
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn recorders_accept_every_label_without_a_recorder() {
		for op in [Operation::Acquire, Operation::Refresh, Operation::Dispatch] {
			record_outcome(op, Outcome::Failure);
		}

		record_token_lifetime(Duration::seconds(-120));
	}
}
