//! Process-wide single-slot token cache with singleflight refreshes.
//!
//! [`TokenCache::acquire`] serves the cached [`AccessToken`] while it is fresh and otherwise
//! performs one [`TokenExchange`]. Fresh reads only take a short read lock. Refreshes are
//! serialized by an async mutex: callers that queued behind an in-flight refresh take its
//! outcome (the fetched token, even one that is already expired, or a clone of the same error)
//! instead of stampeding the token endpoint. The slot is emptied before a refresh starts, so a
//! failed or cancelled refresh can never leave a stale token behind.

mod metrics;

pub use metrics::CacheMetrics;

// std
use std::sync::{
	OnceLock,
	atomic::{AtomicU64, Ordering},
};
// self
use crate::{
	_prelude::*,
	auth::{AccessToken, LocalInstance},
	clock::{Clock, SystemClock},
	exchange::TokenExchange,
	obs::{self, OpOutcome, OpSpan, TokenOp},
};

static GLOBAL: OnceLock<TokenCache> = OnceLock::new();

/// Cached token and the instant it stops being served.
///
/// Both values live in one struct behind one lock, so a token without an expiry (or the
/// reverse) cannot be observed.
#[derive(Clone, Debug)]
pub struct CacheSlot {
	/// Token returned by the central instance.
	pub token: AccessToken,
	/// Absolute expiry computed as receive time plus `expiresIn`.
	pub expires_at: OffsetDateTime,
}
impl CacheSlot {
	/// Returns `true` once `now` reaches the expiry instant. No skew margin is applied.
	pub fn is_expired_at(&self, now: OffsetDateTime) -> bool {
		now >= self.expires_at
	}
}

#[derive(Debug, Default)]
struct RefreshState {
	generation: u64,
	last: Option<RefreshOutcome>,
}

#[derive(Debug)]
struct RefreshOutcome {
	// Invalidation epoch at completion; a token outlived by `invalidate` is not handed out.
	epoch: u64,
	result: Result<AccessToken>,
}
impl RefreshOutcome {
	fn shared(&self, epoch: u64) -> Option<Result<AccessToken>> {
		match &self.result {
			Ok(_) if self.epoch != epoch => None,
			result => Some(result.clone()),
		}
	}
}

/// Single-slot bearer-token cache.
///
/// Use [`TokenCache::global`] for the lazily created process-wide instance, or construct one
/// with [`TokenCache::new`] and pass it to callers explicitly.
pub struct TokenCache {
	exchange: TokenExchange,
	clock: Arc<dyn Clock>,
	slot: RwLock<Option<CacheSlot>>,
	refresh: AsyncMutex<RefreshState>,
	generation: AtomicU64,
	epoch: AtomicU64,
	metrics: CacheMetrics,
}
impl TokenCache {
	/// Creates an empty cache refreshing through `exchange` and reading the wall clock.
	pub fn new(exchange: TokenExchange) -> Self {
		Self {
			exchange,
			clock: Arc::new(SystemClock),
			slot: RwLock::new(None),
			refresh: AsyncMutex::new(RefreshState::default()),
			generation: AtomicU64::new(0),
			epoch: AtomicU64::new(0),
			metrics: CacheMetrics::default(),
		}
	}

	/// Returns the process-wide cache, creating it with default settings on first use.
	pub fn global() -> &'static TokenCache {
		GLOBAL.get_or_init(TokenCache::default)
	}

	/// Replaces the time source used for expiry decisions.
	pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
		self.clock = clock;

		self
	}

	/// Returns the cache's activity counters.
	pub fn metrics(&self) -> &CacheMetrics {
		&self.metrics
	}

	/// Returns the cached token if it is still fresh, without contacting the central instance.
	pub fn peek(&self) -> Option<AccessToken> {
		let now = self.clock.now();

		self.slot
			.read()
			.as_ref()
			.filter(|slot| !slot.is_expired_at(now))
			.map(|slot| slot.token.clone())
	}

	/// Returns the expiry instant of the cached token, fresh or not.
	pub fn expires_at(&self) -> Option<OffsetDateTime> {
		self.slot.read().as_ref().map(|slot| slot.expires_at)
	}

	/// Returns a fresh access token, exchanging the instance's access key when needed.
	///
	/// Callers queued behind a refresh receive that refresh's token or error, even if the token
	/// is already expired by the time they resume. Any failure empties the slot before it is
	/// returned. Nothing is retried.
	pub async fn acquire(&self, instance: &LocalInstance) -> Result<AccessToken> {
		const OP: TokenOp = TokenOp::Acquire;

		let span = OpSpan::new(OP, "acquire");

		obs::record_op_outcome(OP, OpOutcome::Attempt);

		let result = span
			.instrument(async move {
				if let Some(token) = self.peek() {
					return Ok((token, true));
				}

				let observed = self.generation.load(Ordering::Acquire);
				let mut state = self.refresh.lock().await;

				if let Some(token) = self.peek() {
					return Ok((token, true));
				}
				// A refresh finished while this caller was queued; share its outcome.
				let shared = state
					.last
					.as_ref()
					.filter(|_| state.generation != observed)
					.and_then(|last| last.shared(self.epoch.load(Ordering::Acquire)));

				if let Some(shared) = shared {
					return shared.map(|token| (token, true));
				}

				self.slot.write().take();
				self.metrics.record_exchange();

				obs::debug_event!("Refreshing central instance access token.");

				let epoch = self.epoch.load(Ordering::Acquire);
				let outcome = self.exchange.exchange(instance).await.and_then(|token| {
					let expires_at = token.expires_at(self.clock.now())?;

					Ok(CacheSlot { token, expires_at })
				});
				let result = outcome.map(|slot| {
					let token = slot.token.clone();

					*self.slot.write() = Some(slot);

					token
				});

				state.last = Some(RefreshOutcome { epoch, result: result.clone() });
				state.generation += 1;
				// Published after the slot and the outcome are in place.
				self.generation.store(state.generation, Ordering::Release);

				result.map(|token| (token, false))
			})
			.await;

		match result {
			Ok((token, hit)) => {
				if hit {
					self.metrics.record_hit();
					obs::record_op_outcome(OP, OpOutcome::Hit);
				} else {
					obs::record_op_outcome(OP, OpOutcome::Success);
				}

				Ok(token)
			},
			Err(err) => {
				self.metrics.record_failure();
				obs::record_op_outcome(OP, OpOutcome::Failure);

				Err(err)
			},
		}
	}

	/// Drops the cached token so the next [`acquire`](Self::acquire) performs an exchange.
	///
	/// Call this after the central instance rejects the token on a downstream request.
	pub fn invalidate(&self) {
		self.epoch.fetch_add(1, Ordering::AcqRel);
		self.slot.write().take();
		self.metrics.record_invalidation();

		obs::debug_event!("Invalidated central instance access token.");
	}
}
impl Default for TokenCache {
	fn default() -> Self {
		Self::new(TokenExchange::default())
	}
}
impl Debug for TokenCache {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TokenCache")
			.field("exchange", &self.exchange)
			.field("expires_at", &self.expires_at())
			.field("metrics", &self.metrics)
			.finish()
	}
}
