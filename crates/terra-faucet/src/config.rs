//! Configuration management for the faucet server.

use crate::broadcast::BroadcastMode;
use crate::denom::{DenomLimits, DEFAULT_DENOMS, MICRO_UNIT};
use crate::tx::Coin;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

const PLACEHOLDER_PRIVATE_KEY: &str = "your_private_key_here";
const PLACEHOLDER_CAPTCHA_SECRET: &str = "your_recaptcha_secret_here";

/// Longest accepted claim interval (one year)
pub const MAX_REQUEST_INTERVAL_SECS: u64 = 365 * 24 * 60 * 60;

/// Configuration for the faucet server
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FaucetConfig {
    /// HTTP server configuration
    pub http: HttpConfig,

    /// Remote ledger (LCD) configuration
    pub lcd: LcdConfig,

    /// Faucet account key material
    pub wallet: WalletConfig,

    /// Human verification configuration
    pub captcha: CaptchaConfig,

    /// Rate-limit ledger configuration
    pub ledger: LedgerConfig,

    /// Per-drip transaction parameters
    pub drip: DripConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    /// Port to bind to
    pub port: u16,

    /// Address to bind to
    pub bind_address: String,

    /// Directory holding the built frontend
    pub static_dir: String,
}

/// Remote ledger configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LcdConfig {
    /// LCD base URL
    pub url: String,

    /// Chain identifier signed into every transaction
    pub chain_id: String,

    /// Timeout for each outbound call, in seconds
    pub timeout_secs: u64,

    /// Broadcast mode (async, sync or block)
    pub broadcast_mode: BroadcastMode,
}

/// Faucet account configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletConfig {
    /// secp256k1 private key derived from the faucet seed phrase (hex)
    pub private_key: String,

    /// Bech32 prefix of the faucet's own address
    pub account_prefix: String,
}

/// reCAPTCHA configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptchaConfig {
    /// Whether claims must pass verification
    pub enabled: bool,

    /// Server-side secret
    pub secret: String,

    /// Verification endpoint
    pub verify_url: String,
}

/// Rate-limit ledger configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// sled database directory
    pub db_path: String,

    /// Minimum seconds between two claims of one account
    pub request_interval_secs: u64,

    /// Daily cap per denomination, in drips
    pub window_multiplier: u64,
}

/// Drip transaction configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DripConfig {
    /// Memo attached to every transfer
    pub memo: String,

    /// Fee denomination
    pub fee_denom: String,

    /// Fee amount
    pub fee_amount: u64,

    /// Denomination -> amount dispensed per claim
    pub amounts: BTreeMap<String, u64>,
}

impl Default for FaucetConfig {
    fn default() -> Self {
        Self {
            http: HttpConfig {
                port: 3000,
                bind_address: "0.0.0.0".to_string(),
                static_dir: "./frontend/build".to_string(),
            },
            lcd: LcdConfig {
                url: "https://lcd.terra.money".to_string(),
                chain_id: "soju-0007".to_string(),
                timeout_secs: 10,
                broadcast_mode: BroadcastMode::Async,
            },
            wallet: WalletConfig {
                private_key: PLACEHOLDER_PRIVATE_KEY.to_string(),
                account_prefix: "terra".to_string(),
            },
            captcha: CaptchaConfig {
                enabled: true,
                secret: PLACEHOLDER_CAPTCHA_SECRET.to_string(),
                verify_url: "https://www.google.com/recaptcha/api/siteverify".to_string(),
            },
            ledger: LedgerConfig {
                db_path: "db/ipdb".to_string(),
                request_interval_secs: 30,
                window_multiplier: 10,
            },
            drip: DripConfig {
                memo: "faucet".to_string(),
                fee_denom: "uluna".to_string(),
                fee_amount: 10,
                amounts: DEFAULT_DENOMS
                    .iter()
                    .map(|denom| (denom.to_string(), 10 * MICRO_UNIT))
                    .collect(),
            },
        }
    }
}

impl FaucetConfig {
    /// Load configuration from a TOML file, overlaid by `FAUCET__*` variables
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, config::ConfigError> {
        let settings = config::Config::builder()
            .add_source(config::File::from(path.as_ref()))
            .add_source(config::Environment::with_prefix("FAUCET").separator("__"))
            .build()?;

        settings.try_deserialize()
    }

    /// Save configuration to a TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> anyhow::Result<()> {
        let toml_string = toml::to_string_pretty(self)?;
        std::fs::write(path, toml_string)?;
        Ok(())
    }

    /// Validate the configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.wallet.private_key == PLACEHOLDER_PRIVATE_KEY {
            return Err(anyhow::anyhow!("Private key must be configured"));
        }

        let key = self.wallet.private_key.strip_prefix("0x").unwrap_or(&self.wallet.private_key);
        if key.len() != 64 || hex::decode(key).is_err() {
            return Err(anyhow::anyhow!("Private key must be 64 hex characters"));
        }

        if self.wallet.account_prefix.is_empty() {
            return Err(anyhow::anyhow!("Account prefix must be set"));
        }

        url::Url::parse(&self.lcd.url)
            .map_err(|e| anyhow::anyhow!("Invalid LCD URL {}: {}", self.lcd.url, e))?;

        if self.lcd.chain_id.is_empty() {
            return Err(anyhow::anyhow!("Chain id must be set"));
        }

        if self.lcd.timeout_secs == 0 {
            return Err(anyhow::anyhow!("LCD timeout must be greater than 0"));
        }

        if self.captcha.enabled
            && (self.captcha.secret.is_empty() || self.captcha.secret == PLACEHOLDER_CAPTCHA_SECRET)
        {
            return Err(anyhow::anyhow!("reCAPTCHA secret must be configured"));
        }

        if self.ledger.request_interval_secs == 0 {
            return Err(anyhow::anyhow!("Request interval must be greater than 0"));
        }

        if self.ledger.request_interval_secs > MAX_REQUEST_INTERVAL_SECS {
            return Err(anyhow::anyhow!(
                "Request interval must not exceed {} seconds",
                MAX_REQUEST_INTERVAL_SECS
            ));
        }

        if self.ledger.window_multiplier == 0 {
            return Err(anyhow::anyhow!("Window multiplier must be greater than 0"));
        }

        if self.drip.amounts.is_empty() {
            return Err(anyhow::anyhow!("At least one denomination must be dispensed"));
        }

        if let Some((denom, _)) = self.drip.amounts.iter().find(|(_, amount)| **amount == 0) {
            return Err(anyhow::anyhow!("Drip amount for {} must be positive", denom));
        }

        Ok(())
    }

    /// Denomination table derived from the drip amounts
    pub fn denom_limits(&self) -> DenomLimits {
        DenomLimits::new(
            self.drip.amounts.iter().map(|(denom, amount)| (denom.clone(), *amount)),
            self.ledger.window_multiplier,
        )
    }

    /// Fee attached to every transfer
    pub fn fees(&self) -> Vec<Coin> {
        vec![Coin::new(self.drip.fee_denom.as_str(), self.drip.fee_amount)]
    }

    pub fn lcd_timeout(&self) -> Duration {
        Duration::from_secs(self.lcd.timeout_secs)
    }

    pub fn request_interval(&self) -> chrono::Duration {
        let secs = self.ledger.request_interval_secs.min(MAX_REQUEST_INTERVAL_SECS);
        chrono::Duration::seconds(secs as i64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_KEY: &str = "abcd1234567890abcd1234567890abcd1234567890abcd1234567890abcd1234";

    fn valid_config() -> FaucetConfig {
        let mut config = FaucetConfig::default();
        config.wallet.private_key = TEST_KEY.to_string();
        config.captcha.secret = "6Lc-secret".to_string();
        config
    }

    #[test]
    fn test_default_config() {
        let config = FaucetConfig::default();

        assert_eq!(config.http.port, 3000);
        assert_eq!(config.lcd.url, "https://lcd.terra.money");
        assert_eq!(config.lcd.chain_id, "soju-0007");
        assert_eq!(config.ledger.request_interval_secs, 30);
        assert_eq!(config.drip.amounts.len(), 8);
        assert_eq!(config.drip.amounts["uluna"], 10_000_000);
    }

    #[test]
    fn test_config_serialization() {
        let config = FaucetConfig::default();

        let serialized = toml::to_string(&config).unwrap();
        let deserialized: FaucetConfig = toml::from_str(&serialized).unwrap();

        assert_eq!(config.http.port, deserialized.http.port);
        assert_eq!(config.lcd.broadcast_mode, deserialized.lcd.broadcast_mode);
        assert_eq!(config.drip.amounts, deserialized.drip.amounts);
    }

    #[test]
    fn test_config_from_file() -> anyhow::Result<()> {
        let toml_content = r#"
[http]
port = 8080
bind_address = "127.0.0.1"
static_dir = "./public"

[lcd]
url = "http://localhost:1317"
chain_id = "localterra"
timeout_secs = 5
broadcast_mode = "sync"

[wallet]
private_key = "abcd1234567890abcd1234567890abcd1234567890abcd1234567890abcd1234"
account_prefix = "terra"

[captcha]
enabled = false
secret = ""
verify_url = "https://www.google.com/recaptcha/api/siteverify"

[ledger]
db_path = "/tmp/faucet-db"
request_interval_secs = 60
window_multiplier = 5

[drip]
memo = "testnet faucet"
fee_denom = "uluna"
fee_amount = 20

[drip.amounts]
uluna = 10
ukrw = 5000
"#;

        // Create a temporary file with .toml extension
        let temp_dir = tempfile::tempdir()?;
        let temp_path = temp_dir.path().join("test_config.toml");
        std::fs::write(&temp_path, toml_content)?;

        let config = FaucetConfig::from_file(&temp_path)?;

        assert_eq!(config.http.port, 8080);
        assert_eq!(config.lcd.chain_id, "localterra");
        assert_eq!(config.lcd.broadcast_mode, BroadcastMode::Sync);
        assert!(!config.captcha.enabled);
        assert_eq!(config.ledger.window_multiplier, 5);
        assert!(config.validate().is_ok());

        let limits = config.denom_limits();
        assert_eq!(limits.get("uluna").unwrap().window_cap, 50);
        assert_eq!(limits.drip_amount("ukrw"), Some(5000));
        assert_eq!(config.fees(), vec![Coin::new("uluna", 20)]);

        Ok(())
    }

    #[test]
    fn test_config_validation() {
        let mut config = FaucetConfig::default();

        // Should fail with default values
        assert!(config.validate().is_err());

        config.wallet.private_key = TEST_KEY.to_string();
        assert!(config.validate().is_err(), "placeholder captcha secret accepted");

        config.captcha.secret = "6Lc-secret".to_string();
        assert!(config.validate().is_ok());

        // Disabled captcha needs no secret
        config.captcha.enabled = false;
        config.captcha.secret.clear();
        assert!(config.validate().is_ok());

        // Test invalid private key length
        config.wallet.private_key = "short".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation_rejects_bad_values() {
        let mut config = valid_config();
        config.wallet.private_key = format!("0x{}", TEST_KEY);
        assert!(config.validate().is_ok());

        let mut config = valid_config();
        config.wallet.private_key = "zz".repeat(32);
        assert!(config.validate().is_err());

        let mut config = valid_config();
        config.lcd.url = "lcd.terra.money".to_string();
        assert!(config.validate().is_err());

        let mut config = valid_config();
        config.ledger.request_interval_secs = 0;
        assert!(config.validate().is_err());

        let mut config = valid_config();
        config.ledger.request_interval_secs = MAX_REQUEST_INTERVAL_SECS + 1;
        assert!(config.validate().is_err());

        let mut config = valid_config();
        config.ledger.request_interval_secs = MAX_REQUEST_INTERVAL_SECS;
        assert!(config.validate().is_ok());

        let mut config = valid_config();
        config.drip.amounts.clear();
        assert!(config.validate().is_err());

        let mut config = valid_config();
        config.drip.amounts.insert("uusd".to_string(), 0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_request_interval_never_overflows() {
        let mut config = valid_config();
        config.ledger.request_interval_secs = u64::MAX;
        assert_eq!(
            config.request_interval(),
            chrono::Duration::seconds(MAX_REQUEST_INTERVAL_SECS as i64)
        );
    }

    #[test]
    fn test_save_and_load_config() -> anyhow::Result<()> {
        let mut config = valid_config();
        config.http.port = 8080;

        // Create a temporary file with .toml extension
        let temp_dir = tempfile::tempdir()?;
        let temp_path = temp_dir.path().join("test_save_config.toml");
        config.save_to_file(&temp_path)?;

        let loaded_config = FaucetConfig::from_file(&temp_path)?;

        assert_eq!(config.http.port, loaded_config.http.port);
        assert_eq!(config.wallet.private_key, loaded_config.wallet.private_key);
        assert_eq!(config.drip.amounts, loaded_config.drip.amounts);

        Ok(())
    }
}
