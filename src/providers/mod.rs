// providers/mod.rs
pub mod cash;
pub mod mtn;
pub mod orange;

use async_trait::async_trait;

use crate::errors::PaymentError;
use crate::models::{
    PaymentProvider, PaymentRequest, ProviderHealth, ProviderPayment, ProviderRefund,
    RefundRequest, Transaction, TransactionStatus,
};

pub use cash::CashProcessor;
pub use mtn::MtnClient;
pub use orange::OrangeClient;

/// Common surface for every payment rail. The gateway dispatches on
/// `PaymentProvider`, so clients never see requests for another rail.
#[async_trait]
pub trait ProviderClient: Send + Sync {
    fn provider(&self) -> PaymentProvider;

    /// Acquire or refresh whatever credentials the rail needs. Clients cache
    /// tokens internally; callers may invoke this freely.
    async fn authenticate(&self) -> Result<(), PaymentError>;

    async fn pay(&self, request: &PaymentRequest) -> Result<ProviderPayment, PaymentError>;

    /// Map the provider's own status vocabulary onto the internal lifecycle.
    async fn get_status(&self, external_ref: &str) -> Result<TransactionStatus, PaymentError>;

    async fn refund(
        &self,
        request: &RefundRequest,
        original: &Transaction,
    ) -> Result<ProviderRefund, PaymentError>;

    fn validate_webhook_signature(&self, payload: &[u8], signature: &str) -> bool;

    async fn health_check(&self) -> ProviderHealth;
}
