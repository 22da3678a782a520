// models/payment.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// External payment rails supported in the Cameroon deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentProvider {
    MtnMobileMoney,
    OrangeMoney,
    Cash,
}

impl PaymentProvider {
    /// Short prefix embedded in transaction references.
    pub fn reference_prefix(&self) -> &'static str {
        match self {
            PaymentProvider::MtnMobileMoney => "MTN",
            PaymentProvider::OrangeMoney => "ORG",
            PaymentProvider::Cash => "CSH",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            PaymentProvider::MtnMobileMoney => "MTN Mobile Money",
            PaymentProvider::OrangeMoney => "Orange Money",
            PaymentProvider::Cash => "Cash Payment",
        }
    }

    pub fn all() -> [PaymentProvider; 3] {
        [
            PaymentProvider::MtnMobileMoney,
            PaymentProvider::OrangeMoney,
            PaymentProvider::Cash,
        ]
    }
}

impl fmt::Display for PaymentProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PaymentProvider::MtnMobileMoney => "mtn_mobile_money",
            PaymentProvider::OrangeMoney => "orange_money",
            PaymentProvider::Cash => "cash",
        };
        f.write_str(s)
    }
}

impl std::str::FromStr for PaymentProvider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "mtn" | "mtn_mobile_money" => Ok(PaymentProvider::MtnMobileMoney),
            "orange" | "orange_money" => Ok(PaymentProvider::OrangeMoney),
            "cash" => Ok(PaymentProvider::Cash),
            other => Err(format!("unknown payment provider: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    MobileMoney,
    CashOnDelivery,
    CashPickup,
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PaymentMethod::MobileMoney => "mobile_money",
            PaymentMethod::CashOnDelivery => "cash_on_delivery",
            PaymentMethod::CashPickup => "cash_pickup",
        };
        f.write_str(s)
    }
}

/// XAF is the only supported currency; it has no minor units, so all
/// amounts are whole integers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum Currency {
    #[default]
    XAF,
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("XAF")
    }
}

/// Inbound payment request. Immutable once submitted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentRequest {
    pub order_id: String,
    pub customer_id: String,
    #[serde(default)]
    pub merchant_id: Option<String>,
    /// Integer amount in XAF.
    pub amount: i64,
    #[serde(default)]
    pub currency: Currency,
    pub provider: PaymentProvider,
    pub method: PaymentMethod,
    #[serde(default)]
    pub phone_number: Option<String>,
    pub description: String,
    #[serde(default)]
    pub callback_url: Option<String>,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
}

/// What a provider client reports back after accepting a payment.
#[derive(Debug, Clone, Serialize)]
pub struct ProviderPayment {
    pub transaction_id: String,
    pub external_transaction_id: Option<String>,
    pub status: super::TransactionStatus,
    pub ussd_code: Option<String>,
    pub payment_url: Option<String>,
    pub reference: Option<String>,
    pub message: String,
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RefundRequest {
    pub transaction_id: uuid::Uuid,
    /// Omitted means full refund.
    #[serde(default)]
    pub amount: Option<i64>,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProviderRefund {
    pub refund_id: String,
    pub status: super::TransactionStatus,
    pub amount: i64,
    pub currency: Currency,
    pub reference: String,
}

/// Entry in the method-selection list returned to clients.
#[derive(Debug, Clone, Serialize)]
pub struct AvailablePaymentMethod {
    pub provider: PaymentProvider,
    pub method: PaymentMethod,
    pub available: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub fees: crate::config::FeeSchedule,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    Healthy,
    Unhealthy,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProviderHealth {
    pub status: HealthStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ProviderHealth {
    pub fn healthy() -> Self {
        ProviderHealth {
            status: HealthStatus::Healthy,
            details: None,
        }
    }

    pub fn unhealthy(details: serde_json::Value) -> Self {
        ProviderHealth {
            status: HealthStatus::Unhealthy,
            details: Some(details),
        }
    }
}
