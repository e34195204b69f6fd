//! Layered configuration (§10.3): TOML/YAML config file(s) plus
//! `RELAY_`-prefixed environment variables, merged through `figment` and
//! defaulted through `educe` — the same shape as `wind`'s
//! `conf::persistent` module, extended with the ambient necessities the
//! distilled spec left to "out of scope": TLS certificate/key paths, the
//! listen address, and the pipeline enable switch (§10.9).

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use educe::Educe;
use figment::Figment;
use figment::providers::{Env, Format, Toml, Yaml};
use serde::{Deserialize, Serialize};

use crate::config::SessionConfig;

#[derive(Debug, Clone, Deserialize, Serialize, Educe)]
#[educe(Default)]
pub struct TlsPaths {
	#[educe(Default(expression = PathBuf::from("cert.pem")))]
	pub cert_path: PathBuf,
	#[educe(Default(expression = PathBuf::from("key.pem")))]
	pub key_path: PathBuf,
}

/// On-disk/env representation of everything the `wind-relay` listener needs.
/// `session` is the exact subset the [`crate::session::Session`] state
/// machine consults (§6); everything else here is ambient listener plumbing
/// the core itself never sees.
#[derive(Debug, Clone, Deserialize, Serialize, Educe)]
#[educe(Default)]
pub struct PersistentConfig {
	#[educe(Default(expression = "0.0.0.0:443".parse().unwrap()))]
	pub listen_addr: SocketAddr,

	#[serde(default)]
	pub tls: TlsPaths,

	#[serde(default)]
	pub session: SessionConfig,

	/// §10.9: accepted and stored, but currently inert — no concrete
	/// pipeline transport ships in this crate (§4.5), so the listener never
	/// constructs pipelined sessions regardless of this flag. Kept so a
	/// future transport can be enabled without a config migration.
	#[educe(Default = false)]
	pub pipeline_enabled: bool,
}

impl PersistentConfig {
	/// Merges (in ascending priority) a config directory's `config.toml`/
	/// `config.yaml`, an explicit `--config` file, and `RELAY_`-prefixed
	/// environment variables. Missing files are silently skipped; unset
	/// keys fall back to the `Educe`-derived defaults above.
	pub fn load(config_path: Option<&str>, config_dir: Option<&Path>) -> crate::Result<Self> {
		let mut figment = Figment::new();

		if let Some(dir) = config_dir {
			let toml_path = dir.join("config.toml");
			if toml_path.exists() {
				figment = figment.merge(Toml::file(toml_path));
			}
			let yaml_path = dir.join("config.yaml");
			if yaml_path.exists() {
				figment = figment.merge(Yaml::file(yaml_path));
			}
		} else {
			if Path::new("config.toml").exists() {
				figment = figment.merge(Toml::file("config.toml"));
			}
			if Path::new("config.yaml").exists() {
				figment = figment.merge(Yaml::file("config.yaml"));
			}
		}

		if let Some(path) = config_path {
			if path.ends_with(".yaml") || path.ends_with(".yml") {
				figment = figment.merge(Yaml::file(path));
			} else {
				figment = figment.merge(Toml::file(path));
			}
		}

		figment = figment.merge(Env::prefixed("RELAY_").split("_"));

		figment.extract().map_err(|e| eyre::eyre!("loading wind-relay config: {e}"))
	}

	pub fn export_to_file(&self, path: &Path, format: &str) -> crate::Result<()> {
		use std::fs;
		use std::io::Write;

		let rendered = match format.to_lowercase().as_str() {
			"yaml" => serde_yaml::to_string(self)?,
			"toml" => toml::to_string_pretty(self)?,
			other => return Err(eyre::eyre!("unsupported config format: {other}")),
		};
		let mut file = fs::File::create(path)?;
		file.write_all(rendered.as_bytes())?;
		Ok(())
	}
}

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn defaults_are_self_consistent() {
		let config = PersistentConfig::default();
		assert_eq!(config.listen_addr.port(), 443);
		assert!(!config.pipeline_enabled);
		assert_eq!(config.session.max_buf_length, crate::config::MAX_BUF_LENGTH);
	}

	#[test]
	fn export_then_load_round_trips_toml() -> eyre::Result<()> {
		let dir = std::env::temp_dir().join(format!("wind-relay-conf-test-{}", std::process::id()));
		std::fs::create_dir_all(&dir)?;
		let mut config = PersistentConfig::default();
		config.session.remote_addr = "origin.example".into();
		config.session.remote_port = 8443;

		let path = dir.join("config.toml");
		config.export_to_file(&path, "toml")?;

		let loaded = PersistentConfig::load(Some(path.to_str().unwrap()), None)?;
		assert_eq!(loaded.session.remote_addr, "origin.example");
		assert_eq!(loaded.session.remote_port, 8443);

		std::fs::remove_file(&path)?;
		Ok(())
	}
}
