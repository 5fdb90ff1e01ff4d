use anyhow::{Context, Result};
use std::{env, net::SocketAddr, time::Duration};

/// Environment variable holding the socket address to bind.
pub const LISTEN_ENV: &str = "SWITCHYARD_LISTEN";

/// Environment variable holding the shutdown grace period in milliseconds.
pub const SHUTDOWN_GRACE_ENV: &str = "SWITCHYARD_SHUTDOWN_GRACE_MS";

pub const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
	pub addr: SocketAddr,
	/// How long in-flight connections get to finish after a stop before they are dropped.
	pub shutdown_grace: Duration,
}

impl Default for ServerConfig {
	fn default() -> Self {
		Self {
			addr: ([127, 0, 0, 1], 3000).into(),
			shutdown_grace: DEFAULT_SHUTDOWN_GRACE,
		}
	}
}

impl ServerConfig {
	pub fn new(addr: impl Into<SocketAddr>) -> Self {
		Self {
			addr: addr.into(),
			..Self::default()
		}
	}

	pub fn with_shutdown_grace(mut self, grace: Duration) -> Self {
		self.shutdown_grace = grace;
		self
	}

	/// Reads overrides from the environment. Unset variables keep their defaults.
	pub fn from_env() -> Result<Self> {
		Self::from_lookup(|key| env::var(key).ok())
	}

	fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
		let mut config = Self::default();

		if let Some(addr) = lookup(LISTEN_ENV) {
			config.addr = addr
				.trim()
				.parse()
				.with_context(|| format!("invalid {}: {:?}", LISTEN_ENV, addr))?;
		}

		if let Some(grace) = lookup(SHUTDOWN_GRACE_ENV) {
			let millis: u64 = grace
				.trim()
				.parse()
				.with_context(|| format!("invalid {}: {:?}", SHUTDOWN_GRACE_ENV, grace))?;
			config.shutdown_grace = Duration::from_millis(millis);
		}

		Ok(config)
	}
}

#[cfg(test)]
mod test {
	use super::{ServerConfig, DEFAULT_SHUTDOWN_GRACE, LISTEN_ENV, SHUTDOWN_GRACE_ENV};
	use std::{collections::HashMap, time::Duration};

	fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
		let vars: HashMap<String, String> = vars
			.iter()
			.map(|(k, v)| (k.to_string(), v.to_string()))
			.collect();
		move |key: &str| vars.get(key).cloned()
	}

	#[test]
	fn defaults_to_one_second_grace() {
		let config = ServerConfig::from_lookup(lookup(&[])).unwrap();
		assert_eq!(config, ServerConfig::default());
		assert_eq!(config.shutdown_grace, DEFAULT_SHUTDOWN_GRACE);
		assert_eq!(config.addr.to_string(), "127.0.0.1:3000");
	}

	#[test]
	fn reads_overrides() {
		let config = ServerConfig::from_lookup(lookup(&[
			(LISTEN_ENV, "0.0.0.0:8080"),
			(SHUTDOWN_GRACE_ENV, " 250 "),
		]))
		.unwrap();

		assert_eq!(config.addr.to_string(), "0.0.0.0:8080");
		assert_eq!(config.shutdown_grace, Duration::from_millis(250));
	}

	#[test]
	fn rejects_malformed_values() {
		let err = ServerConfig::from_lookup(lookup(&[(LISTEN_ENV, "localhost")])).unwrap_err();
		assert!(err.to_string().contains(LISTEN_ENV));

		let err = ServerConfig::from_lookup(lookup(&[(SHUTDOWN_GRACE_ENV, "1s")])).unwrap_err();
		assert!(err.to_string().contains(SHUTDOWN_GRACE_ENV));
	}
}
