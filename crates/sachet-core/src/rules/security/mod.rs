//! Security rules

mod direct_db;
mod output_escaping;
mod setting_sanitization;
mod verify_nonce;

pub use direct_db::DirectDbRule;
pub use output_escaping::OutputEscapingRule;
pub use setting_sanitization::SettingSanitizationRule;
pub use verify_nonce::VerifyNonceRule;
