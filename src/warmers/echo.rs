//! # EchoWarmer
//!
//! Sample warmer that logs the `text` parameter on every iteration.
//!
//! ## Example output
//! ```text
//! INFO warmvisor::warmers::echo: echo warmer initialized text="hello"
//! INFO warmvisor::warmers::echo: echo warmer next text="hello"
//! ```

use async_trait::async_trait;
use tracing::info;

use crate::{error::TaskError, policies::Params, warmers::Warmer};

/// Logs `params["text"]` on every `next`.
#[derive(Debug, Default)]
pub struct EchoWarmer {
    text: String,
}

impl EchoWarmer {
    /// Text captured by the last successful `init`.
    pub fn text(&self) -> &str {
        &self.text
    }
}

#[async_trait]
impl Warmer for EchoWarmer {
    async fn init(&mut self, params: &Params) -> Result<(), TaskError> {
        self.text = match params.get("text") {
            Some(serde_json::Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
            None => "null".to_string(),
        };
        info!(text = %self.text, "echo warmer initialized");
        Ok(())
    }

    async fn next(&mut self) -> Result<(), TaskError> {
        info!(text = %self.text, "echo warmer next");
        Ok(())
    }
}
