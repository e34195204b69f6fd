use std::sync::Arc;

use clap::Parser as _;
use tracing::Level;
use wind_core::info;
use wind_relay::auth::DenyAllAuthenticator;
use wind_relay::conf::PersistentConfig;
use wind_relay::listener::Listener;
use wind_relay::tls::load_server_config;

use crate::cli::Cli;

mod cli;
mod log;

#[tokio::main]
async fn main() -> eyre::Result<()> {
	log::init_log(Level::INFO)?;

	let cli = match Cli::try_parse() {
		Ok(v) => v,
		Err(err) => {
			println!("{err:#}");
			return Ok(());
		}
	};

	if cli.version {
		const VER: &str = match option_env!("WIND_RELAYD_OVERRIDE_VERSION") {
			Some(v) => v,
			None => env!("CARGO_PKG_VERSION"),
		};
		println!("wind-relayd {VER}");
		return Ok(());
	}

	if let Some(cli::Commands::Init { format, output }) = &cli.command {
		let config = PersistentConfig::default();
		config.export_to_file(output, format.as_str())?;
		println!("wrote default config to {}", output.display());
		return Ok(());
	}

	info!(target: "[MAIN]", "wind-relay starting");

	let config = PersistentConfig::load(cli.config.as_deref(), cli.config_dir.as_deref())?;

	let alpn_protocols: Vec<Vec<u8>> = config.session.ssl.alpn_port_override.keys().map(|p| p.clone().into_bytes()).collect();
	let tls_config = load_server_config(&config.tls.cert_path, &config.tls.key_path, alpn_protocols)?;

	let listen_addr = config.listen_addr;
	let session_config = Arc::new(config.session);
	let authenticator = Arc::new(DenyAllAuthenticator);

	if config.pipeline_enabled {
		wind_core::warn!("pipeline_enabled is set but no pipeline transport ships with this binary; ignoring");
	}

	let listener = Listener::new(listen_addr, session_config, tls_config, authenticator);
	listener.run().await
}
