// End-to-end payment flow against a stubbed provider client. No network
// calls: the stub stands in for the MTN rail.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use payment_service::config::AppConfig;
use payment_service::errors::PaymentError;
use payment_service::models::{
    ClientContext, PaymentMethod, PaymentProvider, PaymentRequest, ProviderHealth,
    ProviderPayment, ProviderRefund, RefundRequest, RiskLevel, Transaction, TransactionStatus,
    TransactionUpdate,
};
use payment_service::providers::ProviderClient;
use payment_service::services::{FraudDetectionService, PaymentGateway, TransactionManager};

struct StubMtn {
    pay_calls: AtomicU32,
    refund_calls: AtomicU32,
}

impl StubMtn {
    fn new() -> Arc<Self> {
        Arc::new(StubMtn {
            pay_calls: AtomicU32::new(0),
            refund_calls: AtomicU32::new(0),
        })
    }
}

#[async_trait]
impl ProviderClient for StubMtn {
    fn provider(&self) -> PaymentProvider {
        PaymentProvider::MtnMobileMoney
    }

    async fn authenticate(&self) -> Result<(), PaymentError> {
        Ok(())
    }

    async fn pay(&self, request: &PaymentRequest) -> Result<ProviderPayment, PaymentError> {
        self.pay_calls.fetch_add(1, Ordering::SeqCst);
        Ok(ProviderPayment {
            transaction_id: "stub-ref".to_string(),
            external_transaction_id: Some(format!("EXT-{}", request.order_id)),
            status: TransactionStatus::Pending,
            ussd_code: Some("*126#".to_string()),
            payment_url: None,
            reference: None,
            message: "approve the payment on your phone".to_string(),
            expires_at: None,
        })
    }

    async fn get_status(&self, _external_ref: &str) -> Result<TransactionStatus, PaymentError> {
        Ok(TransactionStatus::Completed)
    }

    async fn refund(
        &self,
        request: &RefundRequest,
        original: &Transaction,
    ) -> Result<ProviderRefund, PaymentError> {
        self.refund_calls.fetch_add(1, Ordering::SeqCst);
        Ok(ProviderRefund {
            refund_id: "stub-refund".to_string(),
            status: TransactionStatus::Processing,
            amount: request.amount.unwrap_or(original.amount),
            currency: original.currency,
            reference: original.reference.clone(),
        })
    }

    fn validate_webhook_signature(&self, _payload: &[u8], _signature: &str) -> bool {
        true
    }

    async fn health_check(&self) -> ProviderHealth {
        ProviderHealth::healthy()
    }
}

fn mtn_request() -> PaymentRequest {
    PaymentRequest {
        order_id: "order-77".to_string(),
        customer_id: "customer-3".to_string(),
        merchant_id: Some("merchant-9".to_string()),
        amount: 50_000,
        currency: Default::default(),
        provider: PaymentProvider::MtnMobileMoney,
        method: PaymentMethod::MobileMoney,
        phone_number: Some("+237650000000".to_string()),
        description: "two concert tickets".to_string(),
        callback_url: None,
        expires_at: None,
        metadata: HashMap::new(),
    }
}

#[tokio::test]
async fn full_payment_lifecycle_with_stubbed_provider() {
    let config = Arc::new(AppConfig::default());
    let stub = StubMtn::new();
    let gateway = PaymentGateway::new(config.clone()).with_client(stub.clone());
    let fraud = FraudDetectionService::new(config.clone());
    let manager = TransactionManager::new(config.clone());

    let request = mtn_request();
    let context = ClientContext {
        ip_address: Some("154.72.160.10".to_string()),
        user_agent: Some("Mozilla/5.0 (Linux; Android 13) Mobile".to_string()),
        device_fingerprint: None,
    };

    // screening passes for an ordinary request
    let fraud_result = fraud.analyze_payment_risk(&request, &context).await.unwrap();
    assert_eq!(fraud_result.risk_level, RiskLevel::Low);
    assert!(!fraud_result.blocked);

    // transaction is created pending with fees frozen
    let transaction = manager.create_transaction(&request).await.unwrap();
    assert_eq!(transaction.status, TransactionStatus::Pending);
    assert_eq!(transaction.fees, 750);
    assert_eq!(
        transaction.net_amount,
        transaction.amount + transaction.fees + transaction.taxes
    );

    // provider accepts and hands back an external reference
    let payment = gateway.process_payment(&request, None).await.unwrap();
    assert_eq!(payment.status, TransactionStatus::Pending);
    assert_eq!(stub.pay_calls.load(Ordering::SeqCst), 1);

    manager
        .update_transaction_status(
            transaction.id,
            TransactionUpdate {
                external_transaction_id: payment.external_transaction_id.clone(),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    // provider reports success, transaction settles
    let status = gateway
        .get_status(
            PaymentProvider::MtnMobileMoney,
            payment.external_transaction_id.as_deref().unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(status, TransactionStatus::Completed);

    manager
        .confirm_transaction(transaction.id, None)
        .await
        .unwrap();
    let completed = manager.complete_transaction(transaction.id).await.unwrap();
    assert_eq!(completed.status, TransactionStatus::Completed);
    assert!(completed.completed_at.is_some());

    // and a full refund lands in Refunded
    let refund_request = RefundRequest {
        transaction_id: transaction.id,
        amount: None,
        reason: "order cancelled".to_string(),
    };
    let refund = gateway
        .process_refund(&refund_request, &completed)
        .await
        .unwrap();
    assert_eq!(refund.amount, 50_000);

    let refunded = manager
        .process_refund(transaction.id, None, &refund_request.reason)
        .await
        .unwrap();
    assert_eq!(refunded.status, TransactionStatus::Refunded);
}

#[tokio::test]
async fn wrong_carrier_is_rejected_before_the_provider_is_called() {
    let config = Arc::new(AppConfig::default());
    let stub = StubMtn::new();
    let gateway = PaymentGateway::new(config).with_client(stub.clone());

    let mut request = mtn_request();
    request.phone_number = Some("+237699999999".to_string());

    let err = gateway.process_payment(&request, None).await.unwrap_err();
    assert!(matches!(err, PaymentError::Validation { .. }));
    assert_eq!(stub.pay_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn over_amount_refund_never_reaches_the_provider() {
    let config = Arc::new(AppConfig::default());
    let stub = StubMtn::new();
    let gateway = PaymentGateway::new(config.clone()).with_client(stub.clone());
    let manager = TransactionManager::new(config);

    let transaction = manager.create_transaction(&mtn_request()).await.unwrap();
    manager
        .confirm_transaction(transaction.id, None)
        .await
        .unwrap();
    let completed = manager.complete_transaction(transaction.id).await.unwrap();

    // ten times the original amount, checked before any provider call
    let refund_request = RefundRequest {
        transaction_id: transaction.id,
        amount: Some(500_000),
        reason: "customer request".to_string(),
    };

    let refund = async {
        TransactionManager::validate_refund(&completed, refund_request.amount)?;
        gateway.process_refund(&refund_request, &completed).await
    }
    .await;

    assert!(matches!(refund, Err(PaymentError::Validation { .. })));
    assert_eq!(stub.refund_calls.load(Ordering::SeqCst), 0);

    let stored = manager.get_transaction(transaction.id).await.unwrap();
    assert_eq!(stored.status, TransactionStatus::Completed);
}

#[tokio::test]
async fn refund_of_failed_transaction_is_rejected() {
    let config = Arc::new(AppConfig::default());
    let manager = TransactionManager::new(config);

    let transaction = manager.create_transaction(&mtn_request()).await.unwrap();
    manager
        .mark_as_failed(transaction.id, "declined", false)
        .await
        .unwrap();

    let err = manager
        .process_refund(transaction.id, None, "customer request")
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        PaymentError::RefundNotAllowed(TransactionStatus::Failed)
    ));
}

#[tokio::test]
async fn failed_provider_call_records_retryable_failure() {
    struct FlakyMtn;

    #[async_trait]
    impl ProviderClient for FlakyMtn {
        fn provider(&self) -> PaymentProvider {
            PaymentProvider::MtnMobileMoney
        }

        async fn authenticate(&self) -> Result<(), PaymentError> {
            Ok(())
        }

        async fn pay(&self, _request: &PaymentRequest) -> Result<ProviderPayment, PaymentError> {
            Err(PaymentError::Timeout("provider timed out".to_string()))
        }

        async fn get_status(
            &self,
            _external_ref: &str,
        ) -> Result<TransactionStatus, PaymentError> {
            Ok(TransactionStatus::Pending)
        }

        async fn refund(
            &self,
            _request: &RefundRequest,
            _original: &Transaction,
        ) -> Result<ProviderRefund, PaymentError> {
            Err(PaymentError::Internal("not supported".to_string()))
        }

        fn validate_webhook_signature(&self, _payload: &[u8], _signature: &str) -> bool {
            false
        }

        async fn health_check(&self) -> ProviderHealth {
            ProviderHealth::healthy()
        }
    }

    let config = Arc::new(AppConfig::default());
    let gateway = PaymentGateway::new(config.clone()).with_client(Arc::new(FlakyMtn));
    let manager = TransactionManager::new(config);

    let request = mtn_request();
    let transaction = manager.create_transaction(&request).await.unwrap();

    let err = gateway.process_payment(&request, None).await.unwrap_err();
    assert!(err.is_retryable());

    let after = manager
        .mark_as_failed(transaction.id, err.to_string(), err.is_retryable())
        .await
        .unwrap();
    assert_eq!(after.status, TransactionStatus::Pending);
    assert_eq!(after.retry_count, 1);
}
