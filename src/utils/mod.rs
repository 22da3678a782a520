pub mod crypto;
pub mod money;
pub mod phone;
pub mod reference;
pub mod retry;
