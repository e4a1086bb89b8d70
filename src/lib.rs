pub mod config;
pub mod config_validator;
pub mod error;
pub mod handlers;
pub mod health;
pub mod logging;
pub mod middleware;
pub mod response;
pub mod rules;
pub mod server;
pub mod sliding_window;
pub mod store;
pub mod timestamp;
pub mod validation;

pub use config::Config;
pub use error::{RateLimitError, Result};
pub use rules::{ResolvedRule, Rule, RuleKey, RuleRegistry, RuleSource};
pub use server::create_app;
pub use sliding_window::{Decision, WindowLimiter};
