//! Main entry point for the faucet server.

use anyhow::Result;
use clap::{Arg, ArgMatches, Command};
use std::path::Path;
use terra_faucet::{config::FaucetConfig, http::start_server};
use tracing::{error, info};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const DEFAULT_CONFIG_PATH: &str = "faucet-config.toml";

fn cli() -> Command {
    Command::new("terra-faucet")
        .version(env!("CARGO_PKG_VERSION"))
        .author("Terra Faucet Team")
        .about("Terra Testnet Faucet - Dispense testnet coins to bech32 addresses")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Path to configuration file")
                .default_value(DEFAULT_CONFIG_PATH),
        )
        .arg(
            Arg::new("generate-config")
                .long("generate-config")
                .help("Generate a default configuration file and exit")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new("captcha-secret")
                .long("captcha-secret")
                .value_name("SECRET")
                .env("FAUCET_CAPTCHA_SECRET")
                .help("reCAPTCHA server secret, overrides captcha.secret"),
        )
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();

    let matches = cli().get_matches();

    let config_path = matches
        .get_one::<String>("config")
        .map(String::as_str)
        .unwrap_or(DEFAULT_CONFIG_PATH);

    // Handle config generation
    if matches.get_flag("generate-config") {
        return generate_config(config_path);
    }

    info!("Starting Terra Faucet Server v{}", env!("CARGO_PKG_VERSION"));
    info!("Loading configuration from: {}", config_path);

    let config = match load_config(config_path) {
        Ok(config) => apply_overrides(config, &matches),
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            error!("Use --generate-config to create a default configuration file");
            std::process::exit(1);
        }
    };

    if let Err(e) = config.validate() {
        error!("Configuration validation failed: {}", e);
        std::process::exit(1);
    }

    info!("Configuration loaded and validated successfully");
    info!("Server will bind to: {}:{}", config.http.bind_address, config.http.port);
    info!("LCD: {} (chain {})", config.lcd.url, config.lcd.chain_id);
    info!("Rate-limit ledger: {}", config.ledger.db_path);

    if let Err(e) = start_server(&config).await {
        error!("Server error: {}", e);
        std::process::exit(1);
    }

    Ok(())
}

/// Load configuration from file
fn load_config(path: &str) -> Result<FaucetConfig> {
    if !Path::new(path).exists() {
        return Err(anyhow::anyhow!(
            "Configuration file '{}' not found. Use --generate-config to create one.",
            path
        ));
    }

    FaucetConfig::from_file(path).map_err(|e| anyhow::anyhow!("Failed to parse config: {}", e))
}

/// Command-line values take precedence over the file
fn apply_overrides(mut config: FaucetConfig, matches: &ArgMatches) -> FaucetConfig {
    if let Some(secret) = matches.get_one::<String>("captcha-secret") {
        config.captcha.secret = secret.clone();
    }
    config
}

/// Generate a default configuration file
fn generate_config(path: &str) -> Result<()> {
    let config = FaucetConfig::default();

    config.save_to_file(path)?;

    println!("Generated default configuration file: {}", path);
    println!();
    println!("IMPORTANT: Please edit the configuration file before running the server:");
    println!("1. Set the faucet account's private key (wallet.private_key)");
    println!("2. Set the reCAPTCHA secret (captcha.secret) or pass --captcha-secret");
    println!("3. Point lcd.url and lcd.chain_id at the target network");
    println!("4. Adjust drip amounts and rate limits as needed (drip, ledger sections)");
    println!();
    println!("Example usage after configuration:");
    println!("  cargo run --bin terra-faucet -- --config {}", path);

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    fn toml_temp_file() -> std::io::Result<NamedTempFile> {
        tempfile::Builder::new().suffix(".toml").tempfile()
    }

    #[test]
    fn test_generate_and_load_config() -> Result<()> {
        let temp_file = toml_temp_file()?;
        let temp_path = temp_file.path().to_str().unwrap();

        // Generate config
        generate_config(temp_path)?;

        // Should be able to load it
        let config = load_config(temp_path)?;

        // Should have default values
        assert_eq!(config.http.port, 3000);
        assert_eq!(config.drip.amounts["uusd"], 10_000_000);

        Ok(())
    }

    #[test]
    fn test_load_nonexistent_config() {
        let result = load_config("nonexistent-file.toml");
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("not found"));
    }

    #[test]
    fn test_config_validation() -> Result<()> {
        let temp_file = toml_temp_file()?;
        let temp_path = temp_file.path().to_str().unwrap();

        // Generate and load default config
        generate_config(temp_path)?;
        let config = load_config(temp_path)?;

        // Default config should fail validation (missing real credentials)
        assert!(config.validate().is_err());

        Ok(())
    }

    #[test]
    fn test_captcha_secret_override() {
        let matches = cli()
            .try_get_matches_from(["terra-faucet", "--captcha-secret", "6Lc-override"])
            .unwrap();

        let config = apply_overrides(FaucetConfig::default(), &matches);
        assert_eq!(config.captcha.secret, "6Lc-override");
        assert_eq!(
            matches.get_one::<String>("config").map(String::as_str),
            Some(DEFAULT_CONFIG_PATH)
        );
    }
}
