// src/state.rs
use std::sync::Arc;

use crate::config::AppConfig;
use crate::services::{FraudDetectionService, PaymentGateway, TransactionManager, UssdService};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub gateway: Arc<PaymentGateway>,
    pub fraud: Arc<FraudDetectionService>,
    pub transactions: Arc<TransactionManager>,
    pub ussd: Arc<UssdService>,
}

impl AppState {
    pub fn new(config: AppConfig) -> Self {
        let config = Arc::new(config);
        AppState {
            gateway: Arc::new(PaymentGateway::new(config.clone())),
            fraud: Arc::new(FraudDetectionService::new(config.clone())),
            transactions: Arc::new(TransactionManager::new(config.clone())),
            ussd: Arc::new(UssdService::new(config.clone())),
            config,
        }
    }

    /// Replace the gateway, keeping everything else. Lets tests stub
    /// provider clients without rebuilding the whole state.
    pub fn with_gateway(mut self, gateway: PaymentGateway) -> Self {
        self.gateway = Arc::new(gateway);
        self
    }
}
