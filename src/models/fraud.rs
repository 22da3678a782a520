// models/fraud.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::PaymentProvider;

/// Coarse risk bucket derived from the numeric score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    pub fn from_score(score: u32) -> Self {
        match score {
            s if s >= 80 => RiskLevel::Critical,
            s if s >= 60 => RiskLevel::High,
            s if s >= 30 => RiskLevel::Medium,
            _ => RiskLevel::Low,
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
            RiskLevel::Critical => "critical",
        };
        f.write_str(s)
    }
}

/// Result of a single fraud screening run. Computed fresh per request and
/// only attached to the transaction as an audit annotation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FraudDetectionResult {
    pub score: u32,
    pub risk_level: RiskLevel,
    pub reasons: Vec<String>,
    pub recommendations: Vec<String>,
    pub blocked: bool,
}

/// Request-side context the caller can supply for screening.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ClientContext {
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub device_fingerprint: Option<String>,
}

#[derive(Debug, Clone)]
pub struct DeviceInfo {
    pub fingerprint: Option<String>,
    pub user_agent: Option<String>,
    pub ip_address: Option<String>,
    pub device: &'static str,
    pub platform: &'static str,
}

#[derive(Debug, Clone)]
pub struct CustomerHistory {
    pub total_transactions: u64,
    pub total_amount: i64,
    pub failed_transactions: u64,
    pub first_transaction_at: Option<DateTime<Utc>>,
    pub last_transaction_at: Option<DateTime<Utc>>,
    pub average_amount: i64,
    pub frequent_providers: Vec<PaymentProvider>,
}

#[derive(Debug, Clone)]
pub struct RecentActivity {
    pub transactions_last_24h: u32,
    pub amount_last_24h: i64,
    pub transactions_last_hour: u32,
    pub failed_attempts_last_24h: u32,
}
