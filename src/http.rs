//! Transport primitives for token exchanges.
//!
//! [`HttpConfig`] describes how the per-exchange reqwest client is built. Each exchange gets a
//! fresh [`ScopedHttpClient`] whose DNS for the central host is pinned to the addresses the URL
//! guard validated, so the connection cannot be steered elsewhere by a second lookup. The client
//! is dropped when the exchange returns, on every path.

// crates.io
use reqwest::{header::CONTENT_TYPE, redirect::Policy};
// self
use crate::{
	_prelude::*,
	auth::TokenSecret,
	error::GenericError,
	guard::{self, GuardedUrl, UrlGuardError},
};

/// Token endpoint path appended to the central-instance URL.
pub const DEFAULT_TOKEN_PATH: &str = "/api/v2/members/auth/token";

/// Settings for the HTTP client used by token exchanges.
///
/// Additional fields may be added in future releases, so downstream code should use the
/// `with_*` builders instead of struct literals.
#[derive(Clone, Debug)]
pub struct HttpConfig {
	/// Path of the token endpoint relative to the central-instance URL.
	pub token_path: String,
	/// Total request timeout.
	pub timeout: Duration,
	/// TCP/TLS connect timeout.
	pub connect_timeout: Duration,
	/// Optional `User-Agent` header value.
	pub user_agent: Option<String>,
	/// Static host → address overrides (curl `--resolve` semantics).
	///
	/// Overrides win over address pinning, so they go through the same blocked-range check as
	/// resolved addresses. An override onto a loopback, link-local, or private address fails
	/// the exchange.
	pub resolve_overrides: HashMap<String, SocketAddr>,
	#[cfg(any(test, feature = "test"))]
	test_routes: HashMap<String, SocketAddr>,
}
impl HttpConfig {
	const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::seconds(10);
	const DEFAULT_TIMEOUT: Duration = Duration::seconds(30);

	/// Overrides the token endpoint path (defaults to [`DEFAULT_TOKEN_PATH`]).
	pub fn with_token_path(mut self, path: impl Into<String>) -> Self {
		self.token_path = path.into();

		self
	}

	/// Overrides the total request timeout (defaults to 30 seconds).
	pub fn with_timeout(mut self, timeout: Duration) -> Self {
		self.timeout = timeout;

		self
	}

	/// Overrides the connect timeout (defaults to 10 seconds).
	pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
		self.connect_timeout = timeout;

		self
	}

	/// Sets the `User-Agent` header.
	pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
		self.user_agent = Some(user_agent.into());

		self
	}

	/// Routes connections for `host` to `addr`. A zero port keeps the URL's port.
	pub fn with_resolve_override(mut self, host: impl Into<String>, addr: SocketAddr) -> Self {
		self.resolve_overrides.insert(host.into(), addr);

		self
	}

	/// Routes `host` to `addr` without the blocked-range check so tests can reach a local mock.
	#[cfg(any(test, feature = "test"))]
	pub(crate) fn with_test_route(mut self, host: impl Into<String>, addr: SocketAddr) -> Self {
		self.test_routes.insert(host.into(), addr);

		self
	}

	/// Builds the token endpoint URL on top of a validated central-instance URL.
	///
	/// Trailing slashes on the base path are collapsed; query and fragment are dropped.
	pub fn endpoint(&self, base: &GuardedUrl) -> Url {
		let mut endpoint = base.url.clone();
		let prefix = endpoint.path().trim_end_matches('/').to_owned();
		let suffix = self.token_path.trim_start_matches('/');

		endpoint.set_path(&format!("{prefix}/{suffix}"));
		endpoint.set_query(None);
		endpoint.set_fragment(None);

		endpoint
	}
}
impl Default for HttpConfig {
	fn default() -> Self {
		Self {
			token_path: DEFAULT_TOKEN_PATH.into(),
			timeout: Self::DEFAULT_TIMEOUT,
			connect_timeout: Self::DEFAULT_CONNECT_TIMEOUT,
			user_agent: None,
			resolve_overrides: HashMap::new(),
			#[cfg(any(test, feature = "test"))]
			test_routes: HashMap::new(),
		}
	}
}

/// Raw token endpoint answer.
#[derive(Clone, Debug)]
pub struct TokenEndpointResponse {
	/// HTTP status code.
	pub status: u16,
	/// Response body bytes.
	pub body: Vec<u8>,
}

/// Thin wrapper around a [`ReqwestClient`] built for a single exchange.
///
/// Redirects are never followed: the token endpoint must answer directly, and a redirect could
/// otherwise lead the request to a host the guard never saw.
#[derive(Clone, Debug)]
pub struct ScopedHttpClient(ReqwestClient);
impl ScopedHttpClient {
	/// Builds a client for `target`, pinning DNS for its host to the validated addresses.
	pub fn connect(config: &HttpConfig, target: &GuardedUrl) -> Result<Self, GenericError> {
		let mut builder = ReqwestClient::builder()
			.redirect(Policy::none())
			.timeout(config.timeout.unsigned_abs())
			.connect_timeout(config.connect_timeout.unsigned_abs());

		if let Some(user_agent) = &config.user_agent {
			builder = builder.user_agent(user_agent.as_str());
		}
		if target.is_domain() {
			builder = builder.resolve_to_addrs(&target.host, &target.pinned_addrs());
		}
		for (host, addr) in &config.resolve_overrides {
			if guard::is_blocked(addr.ip()) {
				return Err(UrlGuardError::HostNotAllowed { host: host.clone(), address: addr.ip() }
					.into());
			}

			builder = builder.resolve(host, *addr);
		}
		#[cfg(any(test, feature = "test"))]
		for (host, addr) in &config.test_routes {
			builder = builder.resolve(host, *addr);
		}

		builder.build().map(Self).map_err(GenericError::http_client_build)
	}

	/// Posts the access key to `endpoint` as bearer credential and raw body.
	///
	/// The key travels twice (header and body) because the central instance expects both.
	pub async fn post_access_key(
		&self,
		endpoint: &Url,
		access_key: &TokenSecret,
	) -> Result<TokenEndpointResponse, ReqwestError> {
		let response = self
			.0
			.post(endpoint.clone())
			.bearer_auth(access_key.expose())
			.header(CONTENT_TYPE, "application/json")
			.body(access_key.expose().to_owned())
			.send()
			.await?;
		let status = response.status().as_u16();
		let body = response.bytes().await?.to_vec();

		Ok(TokenEndpointResponse { status, body })
	}
}
