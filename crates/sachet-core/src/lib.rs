//! Core analysis engine for sachet, a static analyzer for
//! WordPress-flavored PHP.
//!
//! The engine works directly on the token stream: [`lexer::tokenize`]
//! turns source text into a [`token::TokenStream`], [`parser::ParsedFile`]
//! adds suppression comments, and [`analysis::AnalysisEngine`] runs the
//! registered rules over the result.

pub mod analysis;
pub mod config;
pub mod diagnostic;
pub mod escaping;
pub mod lexer;
pub mod navigator;
pub mod parser;
pub mod rules;
pub mod taint;
pub mod token;
pub mod variables;

pub use analysis::AnalysisEngine;
pub use config::{Config, ConfigError, load_config_or_default, load_config_or_default_with_warnings};
pub use diagnostic::{Confidence, Diagnostic, Severity};
pub use parser::ParsedFile;
