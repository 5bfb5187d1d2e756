//! Taint-flow escaping analysis
//!
//! One engine, two configurations: the same expression walk checks SQL
//! flowing into `$wpdb` calls and markup flowing into output statements,
//! parameterized by an [`EscapingRuleSet`] that says which functions escape,
//! which only look like they do, and which calls are sinks.

mod check;
mod ruleset;

pub use check::{EscapingCheck, Finding};
pub use ruleset::EscapingRuleSet;
