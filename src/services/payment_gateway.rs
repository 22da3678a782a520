// services/payment_gateway.rs
//
// Provider-agnostic entry point. Validates requests against configuration
// and regional limits, then dispatches to the registered client for the
// requested rail.

use std::collections::HashMap;
use std::sync::Arc;

use crate::config::AppConfig;
use crate::errors::PaymentError;
use crate::models::{
    AvailablePaymentMethod, PaymentMethod, PaymentProvider, PaymentRequest, ProviderHealth,
    ProviderPayment, ProviderRefund, RefundRequest, Transaction, TransactionStatus,
};
use crate::providers::{CashProcessor, MtnClient, OrangeClient, ProviderClient};
use crate::utils::money::format_currency;
use crate::utils::phone;

pub struct PaymentGateway {
    config: Arc<AppConfig>,
    clients: HashMap<PaymentProvider, Arc<dyn ProviderClient>>,
}

impl PaymentGateway {
    pub fn new(config: Arc<AppConfig>) -> Self {
        let mut clients: HashMap<PaymentProvider, Arc<dyn ProviderClient>> = HashMap::new();
        clients.insert(
            PaymentProvider::MtnMobileMoney,
            Arc::new(MtnClient::new(config.clone())),
        );
        clients.insert(
            PaymentProvider::OrangeMoney,
            Arc::new(OrangeClient::new(config.clone())),
        );
        clients.insert(
            PaymentProvider::Cash,
            Arc::new(CashProcessor::new(config.clone())),
        );

        PaymentGateway { config, clients }
    }

    /// Swap in a different client for one rail. Used by tests to stub out
    /// network calls.
    pub fn with_client(mut self, client: Arc<dyn ProviderClient>) -> Self {
        self.clients.insert(client.provider(), client);
        self
    }

    fn client(&self, provider: PaymentProvider) -> Result<&Arc<dyn ProviderClient>, PaymentError> {
        self.clients.get(&provider).ok_or_else(|| {
            PaymentError::Internal(format!("no client registered for provider {provider}"))
        })
    }

    /// Validate a payment request. Checks run in a fixed order so callers
    /// always see the most fundamental problem first: required fields,
    /// provider availability, amount limits, then phone compatibility.
    pub fn validate_payment_request(
        &self,
        request: &PaymentRequest,
        daily_total: Option<i64>,
    ) -> Result<(), PaymentError> {
        if request.order_id.trim().is_empty() {
            return Err(PaymentError::validation("order_id", "order_id is required"));
        }
        if request.customer_id.trim().is_empty() {
            return Err(PaymentError::validation(
                "customer_id",
                "customer_id is required",
            ));
        }
        if request.amount <= 0 {
            return Err(PaymentError::validation(
                "amount",
                "amount must be a positive integer",
            ));
        }

        let settings = self.config.provider_settings(request.provider);
        if !settings.enabled {
            return Err(PaymentError::validation(
                "provider",
                format!("{} is currently unavailable", request.provider.display_name()),
            ));
        }

        if request.amount < settings.min_amount {
            return Err(PaymentError::validation(
                "amount",
                format!(
                    "minimum amount for {} is {}",
                    request.provider.display_name(),
                    format_currency(settings.min_amount, request.currency)
                ),
            ));
        }
        if request.amount > settings.max_amount {
            return Err(PaymentError::validation(
                "amount",
                format!(
                    "maximum amount for {} is {}",
                    request.provider.display_name(),
                    format_currency(settings.max_amount, request.currency)
                ),
            ));
        }

        if self.config.cemac.enabled {
            if request.amount > self.config.cemac.transaction_limit {
                return Err(PaymentError::validation(
                    "amount",
                    format!(
                        "amount exceeds the CEMAC transaction limit of {}",
                        format_currency(self.config.cemac.transaction_limit, request.currency)
                    ),
                ));
            }
            if let Some(total) = daily_total {
                if total + request.amount > self.config.cemac.daily_limit {
                    return Err(PaymentError::validation(
                        "amount",
                        format!(
                            "daily CEMAC limit of {} would be exceeded",
                            format_currency(self.config.cemac.daily_limit, request.currency)
                        ),
                    ));
                }
            }
        }

        match request.provider {
            PaymentProvider::MtnMobileMoney | PaymentProvider::OrangeMoney => {
                let Some(number) = request.phone_number.as_deref() else {
                    return Err(PaymentError::validation(
                        "phone_number",
                        "phone_number is required for mobile money payments",
                    ));
                };
                if phone::parse_phone_number(number).is_none() {
                    return Err(PaymentError::validation(
                        "phone_number",
                        "phone_number is not a valid Cameroon number",
                    ));
                }
                if !phone::is_compatible_with(number, request.provider) {
                    return Err(PaymentError::validation(
                        "phone_number",
                        format!(
                            "phone number carrier does not match {}",
                            request.provider.display_name()
                        ),
                    ));
                }
                if request.method != PaymentMethod::MobileMoney {
                    return Err(PaymentError::validation(
                        "method",
                        "mobile money providers only support the mobile_money method",
                    ));
                }
            }
            PaymentProvider::Cash => {
                if request.method == PaymentMethod::MobileMoney {
                    return Err(PaymentError::validation(
                        "method",
                        "cash payments require cash_on_delivery or cash_pickup",
                    ));
                }
            }
        }

        Ok(())
    }

    pub async fn process_payment(
        &self,
        request: &PaymentRequest,
        daily_total: Option<i64>,
    ) -> Result<ProviderPayment, PaymentError> {
        self.validate_payment_request(request, daily_total)?;

        tracing::info!(
            order_id = %request.order_id,
            provider = %request.provider,
            method = %request.method,
            amount = request.amount,
            phone = %request
                .phone_number
                .as_deref()
                .map(phone::mask_phone_number)
                .unwrap_or_default(),
            "dispatching payment to provider"
        );

        let client = self.client(request.provider)?;
        let mut payment = client.pay(request).await?;

        if payment.reference.is_none() {
            payment.reference = Some(crate::utils::reference::generate_transaction_reference(
                request.provider,
                &request.order_id,
            ));
        }

        Ok(payment)
    }

    /// Refund against the provider recorded on the original transaction.
    pub async fn process_refund(
        &self,
        request: &RefundRequest,
        original: &Transaction,
    ) -> Result<ProviderRefund, PaymentError> {
        let client = self.client(original.provider)?;
        client.refund(request, original).await
    }

    pub async fn get_status(
        &self,
        provider: PaymentProvider,
        external_ref: &str,
    ) -> Result<TransactionStatus, PaymentError> {
        self.client(provider)?.get_status(external_ref).await
    }

    /// The method-selection list for a checkout page. A phone number
    /// restricts mobile money to the matching carrier; an amount filters
    /// out rails whose limits it violates.
    pub fn available_payment_methods(
        &self,
        phone_number: Option<&str>,
        amount: Option<i64>,
    ) -> Vec<AvailablePaymentMethod> {
        let mut methods = Vec::new();

        for provider in PaymentProvider::all() {
            let settings = self.config.provider_settings(provider);
            let provider_methods: &[PaymentMethod] = match provider {
                PaymentProvider::Cash => {
                    &[PaymentMethod::CashOnDelivery, PaymentMethod::CashPickup]
                }
                _ => &[PaymentMethod::MobileMoney],
            };

            for &method in provider_methods {
                let mut available = settings.enabled;
                let mut reason = (!settings.enabled)
                    .then(|| format!("{} is currently unavailable", provider.display_name()));

                if available {
                    if let Some(amount) = amount {
                        if amount < settings.min_amount || amount > settings.max_amount {
                            available = false;
                            reason = Some(format!(
                                "amount outside {} limits",
                                provider.display_name()
                            ));
                        }
                    }
                }

                if available && provider != PaymentProvider::Cash {
                    if let Some(number) = phone_number {
                        if !phone::is_compatible_with(number, provider) {
                            available = false;
                            reason = Some("phone number carrier does not match".to_string());
                        }
                    }
                }

                methods.push(AvailablePaymentMethod {
                    provider,
                    method,
                    available,
                    reason,
                    fees: settings.fees,
                });
            }
        }

        methods
    }

    pub async fn provider_health(&self) -> HashMap<PaymentProvider, ProviderHealth> {
        let mut report = HashMap::new();
        for (provider, client) in &self.clients {
            report.insert(*provider, client.health_check().await);
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap as StdHashMap;

    fn gateway() -> PaymentGateway {
        PaymentGateway::new(Arc::new(AppConfig::default()))
    }

    fn request() -> PaymentRequest {
        PaymentRequest {
            order_id: "order-1".to_string(),
            customer_id: "customer-1".to_string(),
            merchant_id: None,
            amount: 50_000,
            currency: Default::default(),
            provider: PaymentProvider::MtnMobileMoney,
            method: PaymentMethod::MobileMoney,
            phone_number: Some("+237650000000".to_string()),
            description: "test order".to_string(),
            callback_url: None,
            expires_at: None,
            metadata: StdHashMap::new(),
        }
    }

    #[test]
    fn accepts_valid_mtn_request() {
        assert!(gateway().validate_payment_request(&request(), None).is_ok());
    }

    #[test]
    fn missing_order_id_reported_before_anything_else() {
        let mut bad = request();
        bad.order_id = String::new();
        bad.amount = -5;

        let err = gateway().validate_payment_request(&bad, None).unwrap_err();
        let PaymentError::Validation { field, .. } = err else {
            panic!("expected validation error");
        };
        assert_eq!(field, "order_id");
    }

    #[test]
    fn rejects_amount_below_provider_minimum() {
        let mut bad = request();
        bad.amount = 100;

        let err = gateway().validate_payment_request(&bad, None).unwrap_err();
        let PaymentError::Validation { field, .. } = err else {
            panic!("expected validation error");
        };
        assert_eq!(field, "amount");
    }

    #[test]
    fn rejects_carrier_mismatch() {
        let mut bad = request();
        bad.phone_number = Some("+237699999999".to_string());

        let err = gateway().validate_payment_request(&bad, None).unwrap_err();
        let PaymentError::Validation { field, message } = err else {
            panic!("expected validation error");
        };
        assert_eq!(field, "phone_number");
        assert!(message.contains("carrier"));
    }

    #[test]
    fn rejects_mobile_money_method_on_cash() {
        let mut bad = request();
        bad.provider = PaymentProvider::Cash;
        bad.method = PaymentMethod::MobileMoney;
        bad.phone_number = None;

        let err = gateway().validate_payment_request(&bad, None).unwrap_err();
        let PaymentError::Validation { field, .. } = err else {
            panic!("expected validation error");
        };
        assert_eq!(field, "method");
    }

    #[test]
    fn enforces_daily_cemac_ceiling() {
        let mut req = request();
        req.amount = 600_000;

        let err = gateway()
            .validate_payment_request(&req, Some(1_500_000))
            .unwrap_err();
        let PaymentError::Validation { message, .. } = err else {
            panic!("expected validation error");
        };
        assert!(message.contains("daily"));
    }

    #[test]
    fn rejects_over_cemac_transaction_limit() {
        let mut config = AppConfig::default();
        config.mtn.max_amount = 10_000_000;
        let gateway = PaymentGateway::new(Arc::new(config));

        let mut req = request();
        req.amount = 6_000_000;

        let err = gateway.validate_payment_request(&req, None).unwrap_err();
        let PaymentError::Validation { message, .. } = err else {
            panic!("expected validation error");
        };
        assert!(message.contains("CEMAC"));
    }

    #[test]
    fn available_methods_follow_phone_and_amount() {
        let methods = gateway().available_payment_methods(Some("+237650000000"), Some(50_000));

        let mtn = methods
            .iter()
            .find(|m| m.provider == PaymentProvider::MtnMobileMoney)
            .unwrap();
        let orange = methods
            .iter()
            .find(|m| m.provider == PaymentProvider::OrangeMoney)
            .unwrap();
        let cash: Vec<_> = methods
            .iter()
            .filter(|m| m.provider == PaymentProvider::Cash)
            .collect();

        assert!(mtn.available);
        assert!(!orange.available);
        assert_eq!(cash.len(), 2);
        assert!(cash.iter().all(|m| m.available));
    }

    #[test]
    fn available_methods_filter_by_amount_limits() {
        let methods = gateway().available_payment_methods(None, Some(800_000));

        let cash = methods
            .iter()
            .find(|m| m.provider == PaymentProvider::Cash)
            .unwrap();
        assert!(!cash.available);

        let mtn = methods
            .iter()
            .find(|m| m.provider == PaymentProvider::MtnMobileMoney)
            .unwrap();
        assert!(mtn.available);
    }
}
