// config.rs
use serde::Serialize;
use std::env;

use crate::models::PaymentProvider;

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_list(key: &str) -> Vec<String> {
    env::var(key)
        .map(|v| {
            v.split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect()
        })
        .unwrap_or_default()
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub environment: String,
    pub service_name: String,
}

/// Fee schedule for one provider: `fees = fixed + min(amount * pct, max_fee)`.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct FeeSchedule {
    pub fixed: i64,
    pub percentage: f64,
    pub max_fee: i64,
}

#[derive(Debug, Clone)]
pub struct ProviderSettings {
    pub enabled: bool,
    pub min_amount: i64,
    pub max_amount: i64,
    pub fees: FeeSchedule,
}

/// Credentials and tuning for the MTN Mobile Money API.
#[derive(Debug, Clone)]
pub struct MtnApiConfig {
    pub base_url: String,
    pub api_user_id: String,
    pub api_key: String,
    pub collection_subscription_key: String,
    pub disbursement_subscription_key: String,
    pub callback_url: String,
    pub webhook_secret: String,
    pub timeout_secs: u64,
    pub retry_attempts: u32,
    pub retry_delay_ms: u64,
}

/// Credentials and tuning for the Orange Money Web Payment API.
#[derive(Debug, Clone)]
pub struct OrangeApiConfig {
    pub base_url: String,
    pub merchant_key: String,
    pub client_id: String,
    pub client_secret: String,
    pub return_url: String,
    pub cancel_url: String,
    pub notif_url: String,
    pub webhook_secret: String,
    pub timeout_secs: u64,
    pub retry_attempts: u32,
    pub retry_delay_ms: u64,
}

#[derive(Debug, Clone)]
pub struct FraudConfig {
    pub enabled: bool,
    pub max_single_transaction_amount: i64,
    pub suspicious_velocity_threshold: u32,
    pub risk_score_threshold: u32,
    pub ip_whitelist: Vec<String>,
    pub blacklisted_phones: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct TaxationConfig {
    /// VAT applied on fees (Cameroon: 19.25%).
    pub vat_rate: f64,
    /// Merchant commission as a fraction of the amount.
    pub commission_rate: f64,
}

/// CEMAC regional ceilings. Violations are validation errors, not fraud
/// signals.
#[derive(Debug, Clone)]
pub struct CemacConfig {
    pub enabled: bool,
    pub transaction_limit: i64,
    pub daily_limit: i64,
}

#[derive(Debug, Clone)]
pub struct UssdConfig {
    pub session_timeout_secs: u64,
    pub sweep_interval_secs: u64,
    pub mtn_code: String,
    pub orange_code: String,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub mtn: ProviderSettings,
    pub orange: ProviderSettings,
    pub cash: ProviderSettings,
    pub mtn_api: MtnApiConfig,
    pub orange_api: OrangeApiConfig,
    pub cash_webhook_secret: String,
    pub fraud: FraudConfig,
    pub taxation: TaxationConfig,
    pub cemac: CemacConfig,
    pub ussd: UssdConfig,
    pub max_retries: u32,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 3005,
                environment: "development".to_string(),
                service_name: "payment-service".to_string(),
            },
            mtn: ProviderSettings {
                enabled: true,
                min_amount: 500,
                max_amount: 1_000_000,
                fees: FeeSchedule {
                    fixed: 0,
                    percentage: 1.5,
                    max_fee: 5_000,
                },
            },
            orange: ProviderSettings {
                enabled: true,
                min_amount: 500,
                max_amount: 1_000_000,
                fees: FeeSchedule {
                    fixed: 0,
                    percentage: 1.5,
                    max_fee: 5_000,
                },
            },
            cash: ProviderSettings {
                enabled: true,
                min_amount: 500,
                max_amount: 500_000,
                fees: FeeSchedule {
                    fixed: 100,
                    percentage: 0.0,
                    max_fee: 100,
                },
            },
            mtn_api: MtnApiConfig {
                base_url: "https://sandbox.momodeveloper.mtn.com".to_string(),
                api_user_id: String::new(),
                api_key: String::new(),
                collection_subscription_key: String::new(),
                disbursement_subscription_key: String::new(),
                callback_url: String::new(),
                webhook_secret: "mtn-webhook-secret".to_string(),
                timeout_secs: 30,
                retry_attempts: 3,
                retry_delay_ms: 2000,
            },
            orange_api: OrangeApiConfig {
                base_url: "https://api.orange.com/orange-money-webpay/cm/v1".to_string(),
                merchant_key: String::new(),
                client_id: String::new(),
                client_secret: String::new(),
                return_url: String::new(),
                cancel_url: String::new(),
                notif_url: String::new(),
                webhook_secret: "orange-webhook-secret".to_string(),
                timeout_secs: 30,
                retry_attempts: 3,
                retry_delay_ms: 2000,
            },
            cash_webhook_secret: "cash-webhook-secret".to_string(),
            fraud: FraudConfig {
                enabled: true,
                max_single_transaction_amount: 1_000_000,
                suspicious_velocity_threshold: 10,
                risk_score_threshold: 75,
                ip_whitelist: Vec::new(),
                blacklisted_phones: Vec::new(),
            },
            taxation: TaxationConfig {
                vat_rate: 0.1925,
                commission_rate: 0.025,
            },
            cemac: CemacConfig {
                enabled: true,
                transaction_limit: 5_000_000,
                daily_limit: 2_000_000,
            },
            ussd: UssdConfig {
                session_timeout_secs: 180,
                sweep_interval_secs: 60,
                mtn_code: "*126#".to_string(),
                orange_code: "*150#".to_string(),
            },
            max_retries: 3,
        }
    }
}

impl AppConfig {
    /// Load configuration from the environment on top of the defaults.
    pub fn from_env() -> Self {
        let mut config = AppConfig::default();

        config.server = ServerConfig {
            host: env_or("HOST", "0.0.0.0"),
            port: env_parse("PORT", 3005),
            environment: env_or("APP_ENV", "development"),
            service_name: env_or("SERVICE_NAME", "payment-service"),
        };

        config.mtn_api = MtnApiConfig {
            base_url: env_or("MTN_API_BASE_URL", &config.mtn_api.base_url),
            api_user_id: env_or("MTN_API_USER_ID", ""),
            api_key: env_or("MTN_API_KEY", ""),
            collection_subscription_key: env_or("MTN_COLLECTION_SUBSCRIPTION_KEY", ""),
            disbursement_subscription_key: env_or("MTN_DISBURSEMENT_SUBSCRIPTION_KEY", ""),
            callback_url: env_or("MTN_CALLBACK_URL", ""),
            webhook_secret: env_or("MTN_WEBHOOK_SECRET", &config.mtn_api.webhook_secret),
            timeout_secs: env_parse("MTN_TIMEOUT_SECS", 30),
            retry_attempts: env_parse("MTN_RETRY_ATTEMPTS", 3),
            retry_delay_ms: env_parse("MTN_RETRY_DELAY_MS", 2000),
        };

        config.orange_api = OrangeApiConfig {
            base_url: env_or("ORANGE_API_BASE_URL", &config.orange_api.base_url),
            merchant_key: env_or("ORANGE_MERCHANT_KEY", ""),
            client_id: env_or("ORANGE_CLIENT_ID", ""),
            client_secret: env_or("ORANGE_CLIENT_SECRET", ""),
            return_url: env_or("ORANGE_RETURN_URL", ""),
            cancel_url: env_or("ORANGE_CANCEL_URL", ""),
            notif_url: env_or("ORANGE_NOTIF_URL", ""),
            webhook_secret: env_or("ORANGE_WEBHOOK_SECRET", &config.orange_api.webhook_secret),
            timeout_secs: env_parse("ORANGE_TIMEOUT_SECS", 30),
            retry_attempts: env_parse("ORANGE_RETRY_ATTEMPTS", 3),
            retry_delay_ms: env_parse("ORANGE_RETRY_DELAY_MS", 2000),
        };

        config.cash_webhook_secret = env_or("CASH_WEBHOOK_SECRET", &config.cash_webhook_secret);

        config.fraud = FraudConfig {
            enabled: env_parse("FRAUD_DETECTION_ENABLED", true),
            max_single_transaction_amount: env_parse("MAX_SINGLE_TRANSACTION_AMOUNT", 1_000_000),
            suspicious_velocity_threshold: env_parse("SUSPICIOUS_VELOCITY_THRESHOLD", 10),
            risk_score_threshold: env_parse("RISK_SCORE_THRESHOLD", 75),
            ip_whitelist: env_list("FRAUD_IP_WHITELIST"),
            blacklisted_phones: env_list("FRAUD_BLACKLISTED_PHONES"),
        };

        config.taxation = TaxationConfig {
            vat_rate: env_parse("TAX_RATE_PERCENT", 19.25) / 100.0,
            commission_rate: env_parse("COMMISSION_RATE_PERCENT", 2.5) / 100.0,
        };

        config.cemac = CemacConfig {
            enabled: env_parse("CEMAC_COMPLIANCE_ENABLED", true),
            transaction_limit: env_parse("CEMAC_TRANSACTION_LIMIT", 5_000_000),
            daily_limit: env_parse("CEMAC_DAILY_LIMIT", 2_000_000),
        };

        config.ussd = UssdConfig {
            session_timeout_secs: env_parse("USSD_SESSION_TIMEOUT_SECS", 180),
            sweep_interval_secs: env_parse("USSD_SWEEP_INTERVAL_SECS", 60),
            mtn_code: env_or("USSD_MTN_CODE", "*126#"),
            orange_code: env_or("USSD_ORANGE_CODE", "*150#"),
        };

        config.max_retries = env_parse("MAX_RETRY_ATTEMPTS", 3);

        config
    }

    pub fn provider_settings(&self, provider: PaymentProvider) -> &ProviderSettings {
        match provider {
            PaymentProvider::MtnMobileMoney => &self.mtn,
            PaymentProvider::OrangeMoney => &self.orange,
            PaymentProvider::Cash => &self.cash,
        }
    }

    pub fn webhook_secret(&self, provider: PaymentProvider) -> &str {
        match provider {
            PaymentProvider::MtnMobileMoney => &self.mtn_api.webhook_secret,
            PaymentProvider::OrangeMoney => &self.orange_api.webhook_secret,
            PaymentProvider::Cash => &self.cash_webhook_secret,
        }
    }

    pub fn ussd_code(&self, provider: PaymentProvider) -> Option<&str> {
        match provider {
            PaymentProvider::MtnMobileMoney => Some(&self.ussd.mtn_code),
            PaymentProvider::OrangeMoney => Some(&self.ussd.orange_code),
            PaymentProvider::Cash => None,
        }
    }

    pub fn is_production(&self) -> bool {
        self.server.environment == "production"
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}
