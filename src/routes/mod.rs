pub mod payments;
pub mod ussd;
pub mod webhooks;
