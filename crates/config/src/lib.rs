use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

const APP_NAME: &str = "mari-portal";
const KEYCHAIN_SERVICE: &str = "mari.credentials";

/// Keychain entry holding the bearer credential from the last sign-in.
pub const SESSION_TOKEN_KEY: &str = "session_token";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub client: ClientConfig,
    #[serde(default)]
    pub deposit: DepositConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// "mock" | "live"
    #[serde(default = "default_client_kind")]
    pub kind: String,
    pub base_url: Option<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            kind: default_client_kind(),
            base_url: None,
        }
    }
}

fn default_client_kind() -> String {
    "mock".to_string()
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DepositConfig {
    /// Wallet number remembered for mobile-wallet deposits.
    pub default_wallet: Option<String>,
    /// Where the local attempt ledger lives.
    pub ledger_path: Option<String>,
}

impl DepositConfig {
    pub fn ledger_path(&self) -> &str {
        self.ledger_path.as_deref().unwrap_or(".mari_deposits")
    }
}

pub fn load() -> Result<AppConfig> {
    let cfg: AppConfig = confy::load(APP_NAME, None).context("Failed to load app config")?;
    Ok(cfg)
}

pub fn store(cfg: &AppConfig) -> Result<()> {
    confy::store(APP_NAME, None, cfg).context("Failed to store app config")?;
    Ok(())
}

/// Store a secret in the OS keychain
pub fn store_secret(key: &str, value: &str) -> Result<()> {
    let entry = keyring::Entry::new(KEYCHAIN_SERVICE, key)?;
    entry.set_password(value)?;
    Ok(())
}

/// Retrieve a secret from the OS keychain
pub fn get_secret(key: &str) -> Result<String> {
    let entry = keyring::Entry::new(KEYCHAIN_SERVICE, key)?;
    let password = entry.get_password()?;
    Ok(password)
}

/// Delete a secret from the OS keychain
pub fn delete_secret(key: &str) -> Result<()> {
    let entry = keyring::Entry::new(KEYCHAIN_SERVICE, key)?;
    entry.delete_password()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_mock_client() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.client.kind, "mock");
        assert!(cfg.client.base_url.is_none());
        assert_eq!(cfg.deposit.ledger_path(), ".mari_deposits");
    }

    #[test]
    fn partial_config_fills_defaults() {
        let cfg: AppConfig =
            serde_json::from_str(r#"{"client":{"base_url":"https://api.example.test"}}"#).unwrap();
        assert_eq!(cfg.client.kind, "mock");
        assert_eq!(
            cfg.client.base_url.as_deref(),
            Some("https://api.example.test")
        );
    }
}
