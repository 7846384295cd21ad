use serde::Deserialize;
use std::env;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub gateway: GatewayConfig,
    pub carrier: CarrierConfig,
    pub business_rules: BusinessRules,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct GatewayConfig {
    pub partner_code: String,
    pub access_key: String,
    pub secret_key: String,
    /// Where the buyer lands after paying.
    pub redirect_url: String,
    /// Where the gateway posts payment results.
    pub callback_url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CarrierConfig {
    pub shop_id: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct BusinessRules {
    /// Expiry deadline for gateway-paid orders, from placement.
    pub payment_wait_seconds: i64,
    /// Expiry deadline for cash orders awaiting confirmation.
    pub confirmation_wait_seconds: i64,
    #[serde(default)]
    pub allow_cancel_in_transit: bool,
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = config::Config::builder()
            // Start off by merging in the "default" configuration file
            .add_source(config::File::with_name("config/default"))
            // Add in the current environment file
            // Default to 'development' env
            // Note that this file is _optional_
            .add_source(config::File::with_name(&format!("config/{}", run_mode)).required(false))
            // Add in a local configuration file
            // This file shouldn't be checked in to git
            .add_source(config::File::with_name("config/local").required(false))
            // Add in settings from the environment (with a prefix of BAZAAR)
            // Eg.. `BAZAAR__SERVER__PORT=9000` would set the server port
            .add_source(config::Environment::with_prefix("BAZAAR").separator("__"))
            .build()?;

        s.try_deserialize()
    }
}
