pub mod fraud;
pub mod payment;
pub mod transaction;
pub mod ussd;
pub mod webhook;

pub use fraud::*;
pub use payment::*;
pub use transaction::*;
pub use ussd::*;
pub use webhook::*;
