//! Single-slot bearer-token cache for central-instance authentication, with SSRF-guarded token
//! exchanges and single-flight refreshes.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod auth;
pub mod cache;
pub mod clock;
pub mod error;
pub mod exchange;
pub mod guard;
pub mod http;
pub mod obs;
#[cfg(any(test, feature = "test"))]
pub mod _preludet {
	//! Convenience re-exports and helpers for integration tests; enabled via `cfg(test)` or the
	//! `test` crate feature.

	pub use crate::_prelude::*;

	// self
	use crate::{
		exchange::TokenExchange,
		guard::{StaticResolver, UrlGuard},
		http::HttpConfig,
	};

	/// Host name the test guard resolves to a public TEST-NET-3 address.
	pub const TEST_CENTRAL_HOST: &str = "central.test";

	/// Builds a guard that resolves [`TEST_CENTRAL_HOST`] to `203.0.113.10`, which passes
	/// validation.
	pub fn test_url_guard() -> UrlGuard {
		let resolver = StaticResolver::default()
			.with_host(TEST_CENTRAL_HOST, [IpAddr::V4(Ipv4Addr::new(203, 0, 113, 10))]);

		UrlGuard::new(Arc::new(resolver))
	}

	/// Routes connections for [`TEST_CENTRAL_HOST`] to the loopback interface where `httpmock`
	/// listens, keeping the URL's port.
	pub fn test_http_config() -> HttpConfig {
		HttpConfig::default()
			.with_test_route(TEST_CENTRAL_HOST, SocketAddr::from((Ipv4Addr::LOCALHOST, 0)))
	}

	/// Constructs a [`TokenExchange`] from [`test_url_guard`] and `http`.
	///
	/// `http` should start from [`test_http_config`] for requests to reach the mock server.
	pub fn build_test_exchange(http: HttpConfig) -> TokenExchange {
		TokenExchange::new(test_url_guard(), http)
	}
}

mod _prelude {
	pub use std::{
		collections::HashMap,
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr},
		pin::Pin,
		sync::Arc,
	};

	pub use async_lock::Mutex as AsyncMutex;
	pub use parking_lot::{Mutex, RwLock};
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

pub use cache::TokenCache;
pub use reqwest;
pub use url;
#[cfg(test)] use httpmock as _;
