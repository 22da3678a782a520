// services/ussd_service.rs
//
// Simulated USSD menu flow for MTN and Orange payments. Sessions are held
// in memory with a three minute lifetime and swept periodically. MTN menus
// render in English, Orange in French, over the same step graph.

use chrono::{Duration, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};
use uuid::Uuid;

use crate::config::AppConfig;
use crate::errors::PaymentError;
use crate::models::{
    steps, PaymentProvider, Transaction, TransactionStatus, UssdEvent, UssdInitiation, UssdReply,
    UssdSession, UssdSessionData, UssdStatistics,
};
use crate::utils::money::format_currency;
use crate::utils::phone;
use crate::utils::reference::generate_session_id;

const EVENT_CHANNEL_CAPACITY: usize = 64;

pub struct UssdService {
    config: Arc<AppConfig>,
    sessions: Arc<RwLock<HashMap<String, UssdSession>>>,
    events: broadcast::Sender<UssdEvent>,
}

impl UssdService {
    pub fn new(config: Arc<AppConfig>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        UssdService {
            config,
            sessions: Arc::new(RwLock::new(HashMap::new())),
            events,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<UssdEvent> {
        self.events.subscribe()
    }

    /// Open a session for a created transaction and return dial-in
    /// instructions. Cash transactions have no USSD flow.
    pub async fn initiate(&self, transaction: &Transaction) -> Result<UssdInitiation, PaymentError> {
        let Some(ussd_code) = self.config.ussd_code(transaction.provider) else {
            return Err(PaymentError::validation(
                "provider",
                "USSD payments are only available for mobile money providers",
            ));
        };

        let Some(phone_number) = transaction.phone_number.clone() else {
            return Err(PaymentError::validation(
                "phone_number",
                "phone_number is required for USSD payments",
            ));
        };
        if !phone::is_compatible_with(&phone_number, transaction.provider) {
            return Err(PaymentError::validation(
                "phone_number",
                "phone number carrier does not match the selected provider",
            ));
        }

        let now = Utc::now();
        let session = UssdSession {
            session_id: generate_session_id(),
            phone_number,
            provider: transaction.provider,
            transaction_id: transaction.id,
            current_step: steps::WELCOME.to_string(),
            data: UssdSessionData {
                order_id: transaction.order_id.clone(),
                customer_id: transaction.customer_id.clone(),
                merchant_id: transaction.merchant_id.clone(),
                amount: transaction.amount,
                currency: transaction.currency,
                description: transaction.description.clone(),
            },
            created_at: now,
            updated_at: now,
            expires_at: now + Duration::seconds(self.config.ussd.session_timeout_secs as i64),
        };

        let initiation = UssdInitiation {
            transaction_id: transaction.id,
            session_id: session.session_id.clone(),
            status: TransactionStatus::Pending,
            provider: transaction.provider,
            ussd_code: ussd_code.to_string(),
            reference: transaction.reference.clone(),
            message: self.instructions(&session, ussd_code),
            expires_at: session.expires_at,
        };

        tracing::info!(
            session_id = %session.session_id,
            transaction_id = %transaction.id,
            provider = %transaction.provider,
            "USSD session opened"
        );

        self.sessions
            .write()
            .await
            .insert(session.session_id.clone(), session);

        Ok(initiation)
    }

    fn instructions(&self, session: &UssdSession, ussd_code: &str) -> String {
        let amount = format_currency(session.data.amount, session.data.currency);
        match session.provider {
            PaymentProvider::OrangeMoney => format!(
                "Composez {ussd_code} sur votre telephone Orange pour payer {amount}. \
                 Reference: {}. La session expire dans 3 minutes.",
                session.data.order_id
            ),
            _ => format!(
                "Dial {ussd_code} on your MTN phone to pay {amount}. \
                 Reference: {}. Session expires in 3 minutes.",
                session.data.order_id
            ),
        }
    }

    /// Feed one customer input into the menu. Expired sessions are evicted
    /// and answered with a terminal message.
    pub async fn process_input(
        &self,
        session_id: &str,
        input: &str,
    ) -> Result<UssdReply, PaymentError> {
        let mut sessions = self.sessions.write().await;

        let Some(session) = sessions.get_mut(session_id) else {
            return Ok(self.expired_reply(None));
        };

        if session.expires_at <= Utc::now() {
            let provider = session.provider;
            sessions.remove(session_id);
            return Ok(self.expired_reply(Some(provider)));
        }

        let reply = Self::dispatch(session, input.trim(), &self.events);
        session.updated_at = Utc::now();

        if reply.end_session {
            sessions.remove(session_id);
        }

        Ok(reply)
    }

    fn expired_reply(&self, provider: Option<PaymentProvider>) -> UssdReply {
        let message = match provider {
            Some(PaymentProvider::OrangeMoney) => {
                "Session expiree. Veuillez recommencer votre paiement.".to_string()
            }
            _ => "Session expired. Please restart your payment.".to_string(),
        };
        UssdReply {
            message,
            end_session: true,
        }
    }

    fn dispatch(
        session: &mut UssdSession,
        input: &str,
        events: &broadcast::Sender<UssdEvent>,
    ) -> UssdReply {
        let french = session.provider == PaymentProvider::OrangeMoney;
        let amount = format_currency(session.data.amount, session.data.currency);

        match session.current_step.as_str() {
            steps::WELCOME => {
                session.current_step = steps::MAIN_MENU.to_string();
                UssdReply {
                    message: Self::main_menu_text(french, &amount, &session.data.description),
                    end_session: false,
                }
            }
            steps::MAIN_MENU => match input {
                "1" => {
                    session.current_step = steps::CONFIRM_AMOUNT.to_string();
                    let message = if french {
                        format!(
                            "Confirmer le paiement de {amount} ?\n1. Oui\n2. Non"
                        )
                    } else {
                        format!("Confirm payment of {amount}?\n1. Yes\n2. No")
                    };
                    UssdReply {
                        message,
                        end_session: false,
                    }
                }
                "2" => {
                    session.current_step = steps::HELP.to_string();
                    UssdReply {
                        message: Self::help_text(french),
                        end_session: false,
                    }
                }
                "3" => Self::cancelled_reply(session, events, french),
                _ => UssdReply {
                    message: Self::main_menu_text(french, &amount, &session.data.description),
                    end_session: false,
                },
            },
            steps::CONFIRM_AMOUNT => match input {
                "1" => {
                    session.current_step = steps::ENTER_PIN.to_string();
                    let message = if french {
                        "Entrez votre code PIN a 4 chiffres:".to_string()
                    } else {
                        "Enter your 4-digit PIN:".to_string()
                    };
                    UssdReply {
                        message,
                        end_session: false,
                    }
                }
                _ => Self::cancelled_reply(session, events, french),
            },
            steps::ENTER_PIN => {
                if input.len() == 4 && input.chars().all(|c| c.is_ascii_digit()) {
                    let _ = events.send(UssdEvent::PaymentCompleted {
                        session_id: session.session_id.clone(),
                        transaction_id: session.transaction_id,
                        provider: session.provider,
                    });
                    let message = if french {
                        format!(
                            "Paiement de {amount} confirme. Merci d'utiliser Orange Money."
                        )
                    } else {
                        format!("Payment of {amount} confirmed. Thank you for using MTN Mobile Money.")
                    };
                    UssdReply {
                        message,
                        end_session: true,
                    }
                } else {
                    let message = if french {
                        "Code PIN invalide. Entrez votre code PIN a 4 chiffres:".to_string()
                    } else {
                        "Invalid PIN. Enter your 4-digit PIN:".to_string()
                    };
                    UssdReply {
                        message,
                        end_session: false,
                    }
                }
            }
            steps::HELP => match input {
                "0" => {
                    session.current_step = steps::MAIN_MENU.to_string();
                    UssdReply {
                        message: Self::main_menu_text(french, &amount, &session.data.description),
                        end_session: false,
                    }
                }
                _ => UssdReply {
                    message: Self::help_text(french),
                    end_session: false,
                },
            },
            _ => Self::cancelled_reply(session, events, french),
        }
    }

    fn main_menu_text(french: bool, amount: &str, description: &str) -> String {
        if french {
            format!(
                "Paiement: {description}\nMontant: {amount}\n1. Payer\n2. Aide\n3. Annuler"
            )
        } else {
            format!(
                "Payment: {description}\nAmount: {amount}\n1. Pay\n2. Help\n3. Cancel"
            )
        }
    }

    fn help_text(french: bool) -> String {
        if french {
            "Aide: suivez les instructions pour confirmer votre paiement avec votre code PIN. \
             0. Retour"
                .to_string()
        } else {
            "Help: follow the prompts and confirm your payment with your PIN. \
             0. Back"
                .to_string()
        }
    }

    fn cancelled_reply(
        session: &UssdSession,
        events: &broadcast::Sender<UssdEvent>,
        french: bool,
    ) -> UssdReply {
        let _ = events.send(UssdEvent::PaymentFailed {
            session_id: session.session_id.clone(),
            transaction_id: session.transaction_id,
            reason: "cancelled by customer".to_string(),
        });
        let message = if french {
            "Paiement annule.".to_string()
        } else {
            "Payment cancelled.".to_string()
        };
        UssdReply {
            message,
            end_session: true,
        }
    }

    /// Explicit cancellation from the API rather than the phone menu.
    pub async fn cancel_session(&self, session_id: &str) -> Result<UssdReply, PaymentError> {
        let mut sessions = self.sessions.write().await;
        let Some(session) = sessions.remove(session_id) else {
            return Err(PaymentError::validation(
                "session_id",
                "USSD session not found or already closed",
            ));
        };

        let french = session.provider == PaymentProvider::OrangeMoney;
        let reply = Self::cancelled_reply(&session, &self.events, french);

        tracing::info!(
            session_id,
            transaction_id = %session.transaction_id,
            "USSD session cancelled"
        );

        Ok(reply)
    }

    pub async fn session_for_transaction(&self, transaction_id: Uuid) -> Option<UssdSession> {
        self.sessions
            .read()
            .await
            .values()
            .find(|s| s.transaction_id == transaction_id)
            .cloned()
    }

    pub async fn statistics(&self) -> UssdStatistics {
        let sessions = self.sessions.read().await;
        UssdStatistics {
            active_sessions: sessions.len(),
            mtn_sessions: sessions
                .values()
                .filter(|s| s.provider == PaymentProvider::MtnMobileMoney)
                .count(),
            orange_sessions: sessions
                .values()
                .filter(|s| s.provider == PaymentProvider::OrangeMoney)
                .count(),
        }
    }

    /// Background task that evicts expired sessions on a fixed interval.
    pub fn spawn_sweeper(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let service = Arc::clone(self);
        let interval = std::time::Duration::from_secs(service.config.ussd.sweep_interval_secs);

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let now = Utc::now();
                let mut sessions = service.sessions.write().await;
                let before = sessions.len();
                sessions.retain(|_, session| session.expires_at > now);
                let evicted = before - sessions.len();
                drop(sessions);
                if evicted > 0 {
                    tracing::info!(evicted, "swept expired USSD sessions");
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{PaymentMethod, PaymentRequest};
    use crate::services::transaction_manager::TransactionManager;
    use std::collections::HashMap as StdHashMap;

    async fn transaction(provider: PaymentProvider, phone: &str) -> Transaction {
        let manager = TransactionManager::new(Arc::new(AppConfig::default()));
        manager
            .create_transaction(&PaymentRequest {
                order_id: "order-1".to_string(),
                customer_id: "customer-1".to_string(),
                merchant_id: None,
                amount: 25_000,
                currency: Default::default(),
                provider,
                method: PaymentMethod::MobileMoney,
                phone_number: Some(phone.to_string()),
                description: "airtime bundle".to_string(),
                callback_url: None,
                expires_at: None,
                metadata: StdHashMap::new(),
            })
            .await
            .unwrap()
    }

    fn service() -> UssdService {
        UssdService::new(Arc::new(AppConfig::default()))
    }

    #[tokio::test]
    async fn initiate_returns_dial_instructions() {
        let service = service();
        let txn = transaction(PaymentProvider::MtnMobileMoney, "+237650000000").await;

        let initiation = service.initiate(&txn).await.unwrap();

        assert_eq!(initiation.ussd_code, "*126#");
        assert!(initiation.session_id.starts_with("USSD-"));
        assert!(initiation.message.contains("*126#"));
        assert!(initiation.message.contains("25 000 XAF"));
    }

    #[tokio::test]
    async fn initiate_rejects_cash() {
        let service = service();
        let manager = TransactionManager::new(Arc::new(AppConfig::default()));
        let txn = manager
            .create_transaction(&PaymentRequest {
                order_id: "order-1".to_string(),
                customer_id: "customer-1".to_string(),
                merchant_id: None,
                amount: 25_000,
                currency: Default::default(),
                provider: PaymentProvider::Cash,
                method: PaymentMethod::CashPickup,
                phone_number: None,
                description: "test".to_string(),
                callback_url: None,
                expires_at: None,
                metadata: StdHashMap::new(),
            })
            .await
            .unwrap();

        assert!(service.initiate(&txn).await.is_err());
    }

    #[tokio::test]
    async fn happy_path_walks_menu_and_emits_completion() {
        let service = service();
        let mut events = service.subscribe();
        let txn = transaction(PaymentProvider::MtnMobileMoney, "+237650000000").await;
        let session = service.initiate(&txn).await.unwrap();

        let menu = service.process_input(&session.session_id, "").await.unwrap();
        assert!(menu.message.contains("1. Pay"));

        let confirm = service.process_input(&session.session_id, "1").await.unwrap();
        assert!(confirm.message.contains("Confirm payment"));

        let pin_prompt = service.process_input(&session.session_id, "1").await.unwrap();
        assert!(pin_prompt.message.contains("PIN"));

        let done = service
            .process_input(&session.session_id, "1234")
            .await
            .unwrap();
        assert!(done.end_session);
        assert!(done.message.contains("confirmed"));

        let UssdEvent::PaymentCompleted { transaction_id, .. } = events.recv().await.unwrap()
        else {
            panic!("expected completion event");
        };
        assert_eq!(transaction_id, txn.id);

        // session is gone once finished
        let after = service
            .process_input(&session.session_id, "1")
            .await
            .unwrap();
        assert!(after.end_session);
        assert!(after.message.contains("expired"));
    }

    #[tokio::test]
    async fn bad_pin_reprompts_without_ending_session() {
        let service = service();
        let txn = transaction(PaymentProvider::MtnMobileMoney, "+237650000000").await;
        let session = service.initiate(&txn).await.unwrap();

        service.process_input(&session.session_id, "").await.unwrap();
        service.process_input(&session.session_id, "1").await.unwrap();
        service.process_input(&session.session_id, "1").await.unwrap();

        let reply = service.process_input(&session.session_id, "12").await.unwrap();
        assert!(!reply.end_session);
        assert!(reply.message.contains("Invalid PIN"));

        let retry = service
            .process_input(&session.session_id, "5678")
            .await
            .unwrap();
        assert!(retry.end_session);
        assert!(retry.message.contains("confirmed"));
    }

    #[tokio::test]
    async fn orange_menu_renders_in_french() {
        let service = service();
        let txn = transaction(PaymentProvider::OrangeMoney, "+237699999999").await;
        let session = service.initiate(&txn).await.unwrap();

        assert!(session.message.contains("Composez"));

        let menu = service.process_input(&session.session_id, "").await.unwrap();
        assert!(menu.message.contains("1. Payer"));
    }

    #[tokio::test]
    async fn cancel_from_menu_emits_failure_event() {
        let service = service();
        let mut events = service.subscribe();
        let txn = transaction(PaymentProvider::MtnMobileMoney, "+237650000000").await;
        let session = service.initiate(&txn).await.unwrap();

        service.process_input(&session.session_id, "").await.unwrap();
        let reply = service.process_input(&session.session_id, "3").await.unwrap();

        assert!(reply.end_session);
        assert!(matches!(
            events.recv().await.unwrap(),
            UssdEvent::PaymentFailed { .. }
        ));
    }

    #[tokio::test]
    async fn expired_session_is_evicted_on_input() {
        let mut config = AppConfig::default();
        config.ussd.session_timeout_secs = 0;
        let service = UssdService::new(Arc::new(config));
        let txn = transaction(PaymentProvider::MtnMobileMoney, "+237650000000").await;
        let session = service.initiate(&txn).await.unwrap();

        let reply = service.process_input(&session.session_id, "").await.unwrap();
        assert!(reply.end_session);
        assert!(reply.message.contains("expired"));
        assert_eq!(service.statistics().await.active_sessions, 0);
    }

    #[tokio::test]
    async fn api_cancel_removes_session() {
        let service = service();
        let txn = transaction(PaymentProvider::MtnMobileMoney, "+237650000000").await;
        let session = service.initiate(&txn).await.unwrap();

        let reply = service.cancel_session(&session.session_id).await.unwrap();
        assert!(reply.end_session);
        assert!(service.cancel_session(&session.session_id).await.is_err());
    }

    #[tokio::test]
    async fn statistics_count_sessions_per_provider() {
        let service = service();
        let mtn = transaction(PaymentProvider::MtnMobileMoney, "+237650000000").await;
        let orange = transaction(PaymentProvider::OrangeMoney, "+237699999999").await;
        service.initiate(&mtn).await.unwrap();
        service.initiate(&orange).await.unwrap();

        let stats = service.statistics().await;
        assert_eq!(stats.active_sessions, 2);
        assert_eq!(stats.mtn_sessions, 1);
        assert_eq!(stats.orange_sessions, 1);
    }
}
