// services/fraud_detection.rs
//
// Rule-based fraud scoring. Each rule is a pure function over the request
// context contributing a weighted score; the sum is clamped to 0..=100 and
// bucketed into a risk level. A failure inside the engine must never block
// legitimate payments, so data-source errors degrade to a fixed medium
// score instead of propagating.

use async_trait::async_trait;
use chrono::{DateTime, Datelike, Timelike, Utc, Weekday};
use std::collections::HashSet;
use std::sync::{Arc, RwLock};

use crate::config::AppConfig;
use crate::errors::PaymentError;
use crate::models::{
    ClientContext, CustomerHistory, DeviceInfo, FraudDetectionResult, PaymentProvider,
    PaymentRequest, RecentActivity, RiskLevel,
};
use crate::utils::phone;

const DEGRADED_SCORE: u32 = 50;

/// Where customer history and velocity data come from. Production wires a
/// store-backed implementation; tests substitute fixtures.
#[async_trait]
pub trait FraudDataSource: Send + Sync {
    async fn customer_history(
        &self,
        customer_id: &str,
    ) -> Result<Option<CustomerHistory>, PaymentError>;

    async fn recent_activity(
        &self,
        customer_id: &str,
    ) -> Result<Option<RecentActivity>, PaymentError>;
}

/// Default data source for deployments without a history store. Treats
/// every customer as unknown.
pub struct InMemoryFraudData;

#[async_trait]
impl FraudDataSource for InMemoryFraudData {
    async fn customer_history(
        &self,
        _customer_id: &str,
    ) -> Result<Option<CustomerHistory>, PaymentError> {
        Ok(None)
    }

    async fn recent_activity(
        &self,
        _customer_id: &str,
    ) -> Result<Option<RecentActivity>, PaymentError> {
        Ok(None)
    }
}

/// Everything a rule may look at. Assembled once per screening run.
pub struct FraudContext<'a> {
    pub request: &'a PaymentRequest,
    pub device: DeviceInfo,
    pub customer_history: Option<CustomerHistory>,
    pub recent_activity: Option<RecentActivity>,
    pub phone_blacklisted: bool,
    pub now: DateTime<Utc>,
    pub config: &'a AppConfig,
}

#[derive(Debug, Default)]
pub struct RuleOutcome {
    pub score: u32,
    pub reasons: Vec<String>,
    /// Set only for automation signatures; feeds the blocking policy
    /// directly instead of being inferred back out of the reason text.
    pub bot_detected: bool,
}

impl RuleOutcome {
    fn clean() -> Self {
        RuleOutcome::default()
    }

    fn flag(score: u32, reason: impl Into<String>) -> Self {
        RuleOutcome {
            score,
            reasons: vec![reason.into()],
            bot_detected: false,
        }
    }

    fn add(&mut self, score: u32, reason: impl Into<String>) {
        self.score += score;
        self.reasons.push(reason.into());
    }
}

/// A named rule with a fixed evaluation function. Value-typed so the rule
/// set is data, not trait objects.
pub struct FraudRule {
    pub name: &'static str,
    pub check: fn(&FraudContext) -> RuleOutcome,
}

fn rule_amount(ctx: &FraudContext) -> RuleOutcome {
    let limit = ctx.config.fraud.max_single_transaction_amount;
    if ctx.request.amount > limit {
        return RuleOutcome::flag(
            30,
            format!("amount {} exceeds single-transaction limit", ctx.request.amount),
        );
    }

    let ratio = ctx.request.amount as f64 / limit as f64;
    let score = (ratio * 20.0) as u32;
    if score > 10 {
        return RuleOutcome::flag(score.min(20), "unusually large amount for this market");
    }
    RuleOutcome::clean()
}

fn rule_velocity(ctx: &FraudContext) -> RuleOutcome {
    let Some(activity) = &ctx.recent_activity else {
        return RuleOutcome::clean();
    };

    let mut outcome = RuleOutcome::clean();
    if activity.transactions_last_24h > ctx.config.fraud.suspicious_velocity_threshold {
        outcome.add(
            25,
            format!(
                "{} transactions in the last 24 hours",
                activity.transactions_last_24h
            ),
        );
    }
    if activity.transactions_last_hour > 5 {
        outcome.add(
            20,
            format!(
                "{} transactions in the last hour",
                activity.transactions_last_hour
            ),
        );
    }
    if activity.failed_attempts_last_24h > 3 {
        outcome.add(
            15,
            format!(
                "{} failed attempts in the last 24 hours",
                activity.failed_attempts_last_24h
            ),
        );
    }
    outcome
}

fn rule_phone(ctx: &FraudContext) -> RuleOutcome {
    let Some(number) = ctx.request.phone_number.as_deref() else {
        return RuleOutcome::clean();
    };

    if ctx.phone_blacklisted {
        return RuleOutcome::flag(50, "phone number is blacklisted");
    }

    if ctx.request.provider != PaymentProvider::Cash
        && !phone::is_compatible_with(number, ctx.request.provider)
    {
        return RuleOutcome::flag(30, "phone carrier does not match selected provider");
    }

    RuleOutcome::clean()
}

fn rule_device(ctx: &FraudContext) -> RuleOutcome {
    let mut outcome = RuleOutcome::clean();

    if let Some(agent) = &ctx.device.user_agent {
        let lowered = agent.to_lowercase();
        if ["bot", "crawler", "spider", "scraper"]
            .iter()
            .any(|marker| lowered.contains(marker))
        {
            outcome.add(25, "automated user agent detected");
            outcome.bot_detected = true;
        }
    }

    if ctx.device.fingerprint.is_some() && ctx.device.user_agent.is_none() {
        outcome.add(15, "device fingerprint present without user agent");
    }

    outcome
}

fn rule_behavior(ctx: &FraudContext) -> RuleOutcome {
    let Some(history) = &ctx.customer_history else {
        return RuleOutcome::clean();
    };

    let mut outcome = RuleOutcome::clean();

    if history.total_transactions < 3 && ctx.request.amount > 100_000 {
        outcome.add(20, "large amount for a new customer");
    }

    if history.total_transactions > 0 {
        let failure_rate = history.failed_transactions as f64 / history.total_transactions as f64;
        if failure_rate > 0.3 {
            outcome.add(15, "elevated historical failure rate");
        }
    }

    if history.average_amount > 0 && ctx.request.amount > history.average_amount * 3 {
        outcome.add(10, "amount deviates sharply from customer average");
    }

    outcome
}

fn rule_ip(ctx: &FraudContext) -> RuleOutcome {
    let Some(ip) = ctx.device.ip_address.as_deref() else {
        return RuleOutcome::clean();
    };

    let whitelist = &ctx.config.fraud.ip_whitelist;
    let production = ctx.config.is_production();

    if production && (ip == "127.0.0.1" || ip == "::1" || ip == "localhost") {
        return RuleOutcome::flag(30, "loopback address in production traffic");
    }

    if !whitelist.is_empty() && !whitelist.iter().any(|w| w == ip) {
        return RuleOutcome::flag(10, "IP address outside the known range");
    }

    RuleOutcome::clean()
}

fn rule_time(ctx: &FraudContext) -> RuleOutcome {
    let mut outcome = RuleOutcome::clean();
    let hour = ctx.now.hour();

    if hour < 6 {
        outcome.add(10, "transaction during overnight hours");
    }

    let weekend = matches!(ctx.now.weekday(), Weekday::Sat | Weekday::Sun);
    if weekend && ctx.request.amount > 500_000 {
        outcome.add(5, "large weekend transaction");
    }

    outcome
}

const RULES: &[FraudRule] = &[
    FraudRule {
        name: "amount",
        check: rule_amount,
    },
    FraudRule {
        name: "velocity",
        check: rule_velocity,
    },
    FraudRule {
        name: "phone",
        check: rule_phone,
    },
    FraudRule {
        name: "device",
        check: rule_device,
    },
    FraudRule {
        name: "behavior",
        check: rule_behavior,
    },
    FraudRule {
        name: "ip",
        check: rule_ip,
    },
    FraudRule {
        name: "time",
        check: rule_time,
    },
];

pub struct FraudDetectionService {
    config: Arc<AppConfig>,
    data: Arc<dyn FraudDataSource>,
    blacklist: RwLock<HashSet<String>>,
}

impl FraudDetectionService {
    pub fn new(config: Arc<AppConfig>) -> Self {
        Self::with_data_source(config, Arc::new(InMemoryFraudData))
    }

    pub fn with_data_source(config: Arc<AppConfig>, data: Arc<dyn FraudDataSource>) -> Self {
        let blacklist = config
            .fraud
            .blacklisted_phones
            .iter()
            .map(|n| Self::normalize_phone(n))
            .collect();
        FraudDetectionService {
            config,
            data,
            blacklist: RwLock::new(blacklist),
        }
    }

    fn normalize_phone(number: &str) -> String {
        phone::parse_phone_number(number)
            .map(|p| p.formatted)
            .unwrap_or_else(|| number.to_string())
    }

    pub fn blacklist_phone(&self, number: &str) {
        let normalized = Self::normalize_phone(number);
        tracing::info!(phone = %phone::mask_phone_number(&normalized), "phone blacklisted");
        self.blacklist.write().unwrap().insert(normalized);
    }

    pub fn remove_blacklisted_phone(&self, number: &str) -> bool {
        self.blacklist
            .write()
            .unwrap()
            .remove(&Self::normalize_phone(number))
    }

    pub fn is_blacklisted(&self, number: &str) -> bool {
        self.blacklist
            .read()
            .unwrap()
            .contains(&Self::normalize_phone(number))
    }

    fn device_info(context: &ClientContext) -> DeviceInfo {
        let (device, platform) = match context.user_agent.as_deref() {
            Some(agent) => {
                let lowered = agent.to_lowercase();
                let device = if lowered.contains("mobile") { "mobile" } else { "desktop" };
                let platform = if lowered.contains("android") {
                    "android"
                } else if lowered.contains("iphone") || lowered.contains("ios") {
                    "ios"
                } else if lowered.contains("windows") {
                    "windows"
                } else if lowered.contains("mac") {
                    "macos"
                } else if lowered.contains("linux") {
                    "linux"
                } else {
                    "unknown"
                };
                (device, platform)
            }
            None => ("unknown", "unknown"),
        };

        DeviceInfo {
            fingerprint: context.device_fingerprint.clone(),
            user_agent: context.user_agent.clone(),
            ip_address: context.ip_address.clone(),
            device,
            platform,
        }
    }

    fn recommendations(level: RiskLevel) -> Vec<String> {
        match level {
            RiskLevel::Low => vec!["proceed normally".to_string()],
            RiskLevel::Medium => vec![
                "proceed with standard verification".to_string(),
                "monitor for follow-up activity".to_string(),
            ],
            RiskLevel::High => vec![
                "require additional verification".to_string(),
                "flag for manual review".to_string(),
            ],
            RiskLevel::Critical => vec![
                "block the transaction".to_string(),
                "escalate to the fraud team".to_string(),
            ],
        }
    }

    fn should_block(
        &self,
        score: u32,
        level: RiskLevel,
        phone_blacklisted: bool,
        bot_detected: bool,
    ) -> bool {
        score >= self.config.fraud.risk_score_threshold
            || level == RiskLevel::Critical
            || phone_blacklisted
            || bot_detected
    }

    fn degraded_result(reason: &str) -> FraudDetectionResult {
        FraudDetectionResult {
            score: DEGRADED_SCORE,
            risk_level: RiskLevel::from_score(DEGRADED_SCORE),
            reasons: vec![format!("fraud screening temporarily unavailable: {reason}")],
            recommendations: Self::recommendations(RiskLevel::Medium),
            blocked: false,
        }
    }

    /// Score a payment request. Returns `Err(PaymentError::Fraud)` only when
    /// the request must be blocked; a degraded engine yields a non-blocking
    /// medium result.
    pub async fn analyze_payment_risk(
        &self,
        request: &PaymentRequest,
        context: &ClientContext,
    ) -> Result<FraudDetectionResult, PaymentError> {
        if !self.config.fraud.enabled {
            return Ok(FraudDetectionResult {
                score: 0,
                risk_level: RiskLevel::Low,
                reasons: Vec::new(),
                recommendations: Self::recommendations(RiskLevel::Low),
                blocked: false,
            });
        }

        let (customer_history, recent_activity) = match tokio::try_join!(
            self.data.customer_history(&request.customer_id),
            self.data.recent_activity(&request.customer_id),
        ) {
            Ok(data) => data,
            Err(err) => {
                tracing::error!(
                    customer_id = %request.customer_id,
                    error = %err,
                    "fraud data source failed, degrading to medium risk"
                );
                return Ok(Self::degraded_result(&err.to_string()));
            }
        };

        let phone_blacklisted = request
            .phone_number
            .as_deref()
            .is_some_and(|n| self.is_blacklisted(n));

        let ctx = FraudContext {
            request,
            device: Self::device_info(context),
            customer_history,
            recent_activity,
            phone_blacklisted,
            now: Utc::now(),
            config: &self.config,
        };

        let mut score: u32 = 0;
        let mut reasons = Vec::new();
        let mut bot_detected = false;
        for rule in RULES {
            let outcome = (rule.check)(&ctx);
            if outcome.score > 0 {
                tracing::debug!(
                    rule = rule.name,
                    score = outcome.score,
                    reasons = ?outcome.reasons,
                    "fraud rule triggered"
                );
            }
            score += outcome.score;
            reasons.extend(outcome.reasons);
            bot_detected |= outcome.bot_detected;
        }

        let score = score.min(100);
        let risk_level = RiskLevel::from_score(score);
        let blocked = self.should_block(score, risk_level, phone_blacklisted, bot_detected);

        let result = FraudDetectionResult {
            score,
            risk_level,
            reasons,
            recommendations: Self::recommendations(risk_level),
            blocked,
        };

        if blocked {
            tracing::warn!(
                customer_id = %request.customer_id,
                score,
                risk_level = %risk_level,
                reasons = ?result.reasons,
                "payment blocked by fraud screening"
            );
            return Err(PaymentError::Fraud { result });
        }

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PaymentMethod;
    use std::collections::HashMap;

    struct FailingData;

    #[async_trait]
    impl FraudDataSource for FailingData {
        async fn customer_history(
            &self,
            _customer_id: &str,
        ) -> Result<Option<CustomerHistory>, PaymentError> {
            Err(PaymentError::Internal("history store unavailable".into()))
        }

        async fn recent_activity(
            &self,
            _customer_id: &str,
        ) -> Result<Option<RecentActivity>, PaymentError> {
            Err(PaymentError::Internal("history store unavailable".into()))
        }
    }

    fn request(amount: i64) -> PaymentRequest {
        PaymentRequest {
            order_id: "order-1".to_string(),
            customer_id: "customer-1".to_string(),
            merchant_id: None,
            amount,
            currency: Default::default(),
            provider: PaymentProvider::MtnMobileMoney,
            method: PaymentMethod::MobileMoney,
            phone_number: Some("+237650000000".to_string()),
            description: "test".to_string(),
            callback_url: None,
            expires_at: None,
            metadata: HashMap::new(),
        }
    }

    fn browser_context() -> ClientContext {
        ClientContext {
            ip_address: Some("154.72.160.10".to_string()),
            user_agent: Some("Mozilla/5.0 (Linux; Android 13) Mobile".to_string()),
            device_fingerprint: None,
        }
    }

    #[tokio::test]
    async fn ordinary_payment_scores_low_and_passes() {
        let service = FraudDetectionService::new(Arc::new(AppConfig::default()));
        let result = service
            .analyze_payment_risk(&request(50_000), &browser_context())
            .await
            .unwrap();

        assert_eq!(result.risk_level, RiskLevel::Low);
        assert!(!result.blocked);
    }

    #[tokio::test]
    async fn blacklisted_phone_is_blocked() {
        let mut config = AppConfig::default();
        config
            .fraud
            .blacklisted_phones
            .push("+237650000000".to_string());
        let service = FraudDetectionService::new(Arc::new(config));

        let err = service
            .analyze_payment_risk(&request(50_000), &browser_context())
            .await
            .unwrap_err();

        let PaymentError::Fraud { result } = err else {
            panic!("expected fraud block");
        };
        assert!(result.blocked);
        assert!(result.reasons.iter().any(|r| r.contains("blacklisted")));
    }

    #[tokio::test]
    async fn fingerprint_without_user_agent_is_flagged_but_not_blocked() {
        let service = FraudDetectionService::new(Arc::new(AppConfig::default()));
        let context = ClientContext {
            ip_address: None,
            user_agent: None,
            device_fingerprint: Some("fp-3a91".to_string()),
        };

        let result = service
            .analyze_payment_risk(&request(50_000), &context)
            .await
            .unwrap();

        assert!(!result.blocked);
        assert!(result.score < 75);
        assert!(result
            .reasons
            .iter()
            .any(|r| r.contains("device fingerprint")));
    }

    #[tokio::test]
    async fn runtime_blacklist_takes_effect_immediately() {
        let service = FraudDetectionService::new(Arc::new(AppConfig::default()));

        assert!(service
            .analyze_payment_risk(&request(50_000), &browser_context())
            .await
            .is_ok());

        service.blacklist_phone("650000000");
        assert!(service.is_blacklisted("+237650000000"));
        assert!(service
            .analyze_payment_risk(&request(50_000), &browser_context())
            .await
            .is_err());

        assert!(service.remove_blacklisted_phone("+237650000000"));
        assert!(service
            .analyze_payment_risk(&request(50_000), &browser_context())
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn bot_user_agent_is_blocked() {
        let service = FraudDetectionService::new(Arc::new(AppConfig::default()));
        let context = ClientContext {
            user_agent: Some("python-requests crawler/2.0".to_string()),
            ..Default::default()
        };

        let err = service
            .analyze_payment_risk(&request(50_000), &context)
            .await
            .unwrap_err();

        assert!(matches!(err, PaymentError::Fraud { .. }));
    }

    #[tokio::test]
    async fn score_grows_with_amount() {
        let service = FraudDetectionService::new(Arc::new(AppConfig::default()));

        let small = service
            .analyze_payment_risk(&request(10_000), &browser_context())
            .await
            .unwrap();
        let large = service
            .analyze_payment_risk(&request(900_000), &browser_context())
            .await
            .unwrap();

        assert!(large.score >= small.score);
    }

    #[tokio::test]
    async fn over_limit_amount_raises_risk() {
        let service = FraudDetectionService::new(Arc::new(AppConfig::default()));

        let result = service
            .analyze_payment_risk(&request(1_500_000), &browser_context())
            .await
            .unwrap();

        assert!(result.score >= 30);
        assert!(result.risk_level >= RiskLevel::Medium);
    }

    #[tokio::test]
    async fn data_source_failure_degrades_without_blocking() {
        let service = FraudDetectionService::with_data_source(
            Arc::new(AppConfig::default()),
            Arc::new(FailingData),
        );

        let result = service
            .analyze_payment_risk(&request(50_000), &browser_context())
            .await
            .unwrap();

        assert_eq!(result.score, 50);
        assert_eq!(result.risk_level, RiskLevel::Medium);
        assert!(!result.blocked);
        assert!(result
            .reasons
            .iter()
            .any(|r| r.contains("temporarily unavailable")));
    }

    #[tokio::test]
    async fn disabled_engine_returns_clean_result() {
        let mut config = AppConfig::default();
        config.fraud.enabled = false;
        let service = FraudDetectionService::new(Arc::new(config));

        let context = ClientContext {
            user_agent: Some("malicious-bot/1.0".to_string()),
            ..Default::default()
        };
        let result = service
            .analyze_payment_risk(&request(2_000_000), &context)
            .await
            .unwrap();

        assert_eq!(result.score, 0);
        assert!(!result.blocked);
    }
}
