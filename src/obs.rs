//! Optional observability helpers for cache and exchange operations.
//!
//! # Feature Flags
//!
//! - Enable `tracing` to emit structured spans named `central_token.op` with the `op` and
//!   `stage` (call site) fields, plus debug/warn events for hits, refreshes, and rejections.
//! - Enable `metrics` to increment the `central_token_op_total` counter for every
//!   attempt/hit/success/failure, labeled by `op` + `outcome`.

mod metrics;
mod tracing;

pub use self::metrics::*;
pub use self::tracing::*;
pub(crate) use self::tracing::{debug_event, warn_event};

// self
use crate::_prelude::*;

/// Operations observed by the crate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TokenOp {
	/// [`TokenCache::acquire`](crate::cache::TokenCache::acquire) calls.
	Acquire,
	/// Outbound token endpoint calls.
	Exchange,
}
impl TokenOp {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			TokenOp::Acquire => "acquire",
			TokenOp::Exchange => "exchange",
		}
	}
}
impl Display for TokenOp {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Outcome labels recorded for each operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OpOutcome {
	/// Entry to an operation.
	Attempt,
	/// Served from the cache without contacting the central instance.
	Hit,
	/// Successful completion.
	Success,
	/// Failure propagated back to the caller.
	Failure,
}
impl OpOutcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			OpOutcome::Attempt => "attempt",
			OpOutcome::Hit => "hit",
			OpOutcome::Success => "success",
			OpOutcome::Failure => "failure",
		}
	}
}
impl Display for OpOutcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
