// models/ussd.rs
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use super::{Currency, PaymentProvider, TransactionStatus};

/// Step identifiers of the USSD menu graph. The same graph shape is used
/// for both mobile-money providers, only the language differs.
pub mod steps {
    pub const WELCOME: &str = "welcome";
    pub const MAIN_MENU: &str = "main_menu";
    pub const CONFIRM_AMOUNT: &str = "confirm_amount";
    pub const ENTER_PIN: &str = "enter_pin";
    pub const HELP: &str = "help";
}

/// Fields accumulated while a USSD payment session walks the menu.
#[derive(Debug, Clone)]
pub struct UssdSessionData {
    pub order_id: String,
    pub customer_id: String,
    pub merchant_id: Option<String>,
    pub amount: i64,
    pub currency: Currency,
    pub description: String,
}

/// Short-lived session state. Lives only in the in-memory session table and
/// is destroyed on completion, cancellation or expiry.
#[derive(Debug, Clone)]
pub struct UssdSession {
    pub session_id: String,
    pub phone_number: String,
    pub provider: PaymentProvider,
    pub transaction_id: Uuid,
    pub current_step: String,
    pub data: UssdSessionData,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// Response returned when a USSD payment session is opened.
#[derive(Debug, Clone, Serialize)]
pub struct UssdInitiation {
    pub transaction_id: Uuid,
    pub session_id: String,
    pub status: TransactionStatus,
    pub provider: PaymentProvider,
    pub ussd_code: String,
    pub reference: String,
    pub message: String,
    pub expires_at: DateTime<Utc>,
}

/// Reply to a single step input.
#[derive(Debug, Clone, Serialize)]
pub struct UssdReply {
    pub message: String,
    pub end_session: bool,
}

/// Events the USSD service publishes for downstream consumers (the
/// transaction manager wiring subscribes to these).
#[derive(Debug, Clone)]
pub enum UssdEvent {
    PaymentCompleted {
        session_id: String,
        transaction_id: Uuid,
        provider: PaymentProvider,
    },
    PaymentFailed {
        session_id: String,
        transaction_id: Uuid,
        reason: String,
    },
}

#[derive(Debug, Clone, Serialize)]
pub struct UssdStatistics {
    pub active_sessions: usize,
    pub mtn_sessions: usize,
    pub orange_sessions: usize,
}
