pub mod fraud_detection;
pub mod payment_gateway;
pub mod transaction_manager;
pub mod ussd_service;

pub use fraud_detection::{FraudDataSource, FraudDetectionService, InMemoryFraudData};
pub use payment_gateway::PaymentGateway;
pub use transaction_manager::TransactionManager;
pub use ussd_service::UssdService;
