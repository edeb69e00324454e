use std::env;

use log::*;
use shop_payment_engine::CheckoutProviderConfig;
use spg_common::{helpers::parse_boolean_flag, Secret};
#[cfg(feature = "telegram")]
use telegram_tools::TelegramConfig;

const DEFAULT_SPG_HOST: &str = "127.0.0.1";
const DEFAULT_SPG_PORT: u16 = 8440;
const DEFAULT_CHECKOUT_URL: &str = "https://link.payway.com.kh";
const DEFAULT_RECEIPT_MAX_MB: u64 = 5;

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    /// The provider webhook rejects plain-HTTP delivery unless this debug escape hatch is set.
    pub allow_insecure_webhooks: bool,
    /// Hosted-payment-page provider credentials and URLs, injected into the reconciliation engine.
    pub provider: CheckoutProviderConfig,
    #[cfg(feature = "telegram")]
    pub telegram: TelegramConfig,
    pub receipt: ReceiptConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_SPG_HOST.to_string(),
            port: DEFAULT_SPG_PORT,
            database_url: String::default(),
            allow_insecure_webhooks: false,
            provider: CheckoutProviderConfig::default(),
            #[cfg(feature = "telegram")]
            telegram: TelegramConfig::default(),
            receipt: ReceiptConfig::default(),
        }
    }
}

impl ServerConfig {
    pub fn new(host: &str, port: u16) -> Self {
        Self { host: host.to_string(), port, ..Default::default() }
    }

    pub fn from_env_or_default() -> Self {
        let host = env::var("SPG_HOST").ok().unwrap_or_else(|| DEFAULT_SPG_HOST.into());
        let port = env::var("SPG_PORT")
            .map(|s| {
                s.parse::<u16>().unwrap_or_else(|e| {
                    error!(
                        "🪛️ {s} is not a valid port for SPG_PORT. {e} Using the default, {DEFAULT_SPG_PORT}, instead."
                    );
                    DEFAULT_SPG_PORT
                })
            })
            .ok()
            .unwrap_or(DEFAULT_SPG_PORT);
        let database_url = env::var("SPG_DATABASE_URL").ok().unwrap_or_else(|| {
            error!("🪛️ SPG_DATABASE_URL is not set. Please set it to the URL for the back-office database.");
            String::default()
        });
        let allow_insecure_webhooks = parse_boolean_flag(env::var("SPG_ALLOW_INSECURE_WEBHOOKS").ok(), false);
        let provider = provider_config_from_env();
        #[cfg(feature = "telegram")]
        let telegram = TelegramConfig::new_from_env_or_default();
        let receipt = ReceiptConfig::from_env_or_default();
        Self {
            host,
            port,
            database_url,
            allow_insecure_webhooks,
            provider,
            #[cfg(feature = "telegram")]
            telegram,
            receipt,
        }
    }
}

fn provider_config_from_env() -> CheckoutProviderConfig {
    let merchant_id = env::var("SPG_PAYWAY_MERCHANT_ID").unwrap_or_else(|_| {
        warn!("🪛️ SPG_PAYWAY_MERCHANT_ID not set. Checkout links and webhook verification will fail.");
        String::default()
    });
    let api_key = Secret::new(env::var("SPG_PAYWAY_API_KEY").unwrap_or_else(|_| {
        warn!("🪛️ SPG_PAYWAY_API_KEY not set. Checkout links and webhook verification will fail.");
        String::default()
    }));
    let checkout_base_url = env::var("SPG_PAYWAY_CHECKOUT_URL").unwrap_or_else(|_| DEFAULT_CHECKOUT_URL.to_string());
    let return_url = env::var("SPG_PAYWAY_RETURN_URL").unwrap_or_else(|_| {
        warn!("🪛️ SPG_PAYWAY_RETURN_URL not set. Using /");
        "/".to_string()
    });
    let callback_url = env::var("SPG_PAYWAY_CALLBACK_URL").unwrap_or_else(|_| {
        warn!("🪛️ SPG_PAYWAY_CALLBACK_URL not set. The provider will not be able to post results back.");
        String::default()
    });
    let currency = env::var("SPG_PAYWAY_CURRENCY").unwrap_or_else(|_| spg_common::USD_CURRENCY_CODE.to_string());
    CheckoutProviderConfig { merchant_id, api_key, checkout_base_url, return_url, callback_url, currency }
}

#[derive(Clone, Debug)]
pub struct ReceiptConfig {
    pub max_megabytes: u64,
    pub allowed_extensions: Vec<String>,
}

impl Default for ReceiptConfig {
    fn default() -> Self {
        Self {
            max_megabytes: DEFAULT_RECEIPT_MAX_MB,
            allowed_extensions: ["jpg", "jpeg", "png", "pdf"].iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl ReceiptConfig {
    pub fn from_env_or_default() -> Self {
        let max_megabytes = env::var("SPG_RECEIPT_MAX_MB")
            .ok()
            .and_then(|s| {
                s.parse::<u64>()
                    .map_err(|e| {
                        error!("🪛️ {s} is not a valid value for SPG_RECEIPT_MAX_MB. {e} Using the default.");
                        e
                    })
                    .ok()
            })
            .unwrap_or(DEFAULT_RECEIPT_MAX_MB);
        let allowed_extensions = env::var("SPG_RECEIPT_ALLOWED_EXTENSIONS")
            .map(|s| s.split(',').map(|ext| ext.trim().to_lowercase()).filter(|ext| !ext.is_empty()).collect())
            .unwrap_or_else(|_| ReceiptConfig::default().allowed_extensions);
        Self { max_megabytes, allowed_extensions }
    }

    pub fn max_bytes(&self) -> u64 {
        self.max_megabytes * 1024 * 1024
    }
}
