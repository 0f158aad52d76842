//! Delivery destinations for stored submissions.
//!
//! A deliverer publishes a batch of submissions to an external board. Each
//! one is also a consumer of the ledger: the cursor-protocol driver in
//! `services::deliver` tracks how far each deliverer has gotten through a
//! per-consumer watermark.

mod trello;

pub use trello::TrelloDeliverer;

use std::collections::HashMap;

use async_trait::async_trait;
use thiserror::Error;

use crate::config::ConsumerConfig;
use crate::models::Submission;

/// Errors from delivering submissions to an external board.
#[derive(Debug, Error)]
pub enum DeliveryError {
    /// Some prefix of the batch went through before the failure. The
    /// driver records that prefix, then surfaces this error.
    #[error("delivered {delivered} item(s), then failed: {source}")]
    Partial {
        delivered: usize,
        source: Box<DeliveryError>,
    },

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),

    #[error("'{0}' not found on the destination")]
    TargetNotFound(String),

    #[error("no API token configured for '{0}'")]
    MissingToken(String),

    #[error("missing '{0}' in consumer configuration")]
    MissingOption(&'static str),

    #[error("unexpected response payload: {0}")]
    Payload(String),

    #[error("unknown deliverer kind '{0}'")]
    UnknownKind(String),
}

/// A destination that publishes submissions.
#[async_trait]
pub trait Deliverer: Send + Sync {
    /// Consumer name used for the watermark cursor.
    fn name(&self) -> &str;

    /// Deliver the batch in order. Implementations must report a partially
    /// delivered prefix with [`DeliveryError::Partial`] rather than
    /// swallowing the failure.
    async fn deliver(&self, submissions: &[Submission]) -> Result<(), DeliveryError>;
}

/// Context shared by deliverer constructors.
pub struct DeliveryContext {
    /// Tokens resolved from the credential store, keyed by deliverer kind.
    pub tokens: HashMap<String, String>,
    /// Fallback submit-time display format.
    pub submit_time_format: String,
}

/// Constructor for a deliverer kind.
pub type DelivererCtor =
    fn(&ConsumerConfig, &DeliveryContext) -> Result<Box<dyn Deliverer>, DeliveryError>;

/// Explicit kind → constructor mapping, resolved once at startup.
pub fn registry() -> HashMap<&'static str, DelivererCtor> {
    let mut map: HashMap<&'static str, DelivererCtor> = HashMap::new();
    map.insert("trello", |config, context| {
        Ok(Box::new(TrelloDeliverer::from_config(config, context)?))
    });
    map
}

/// Build every configured deliverer, in configuration order.
pub fn build_deliverers(
    configs: &[ConsumerConfig],
    context: &DeliveryContext,
) -> Result<Vec<Box<dyn Deliverer>>, DeliveryError> {
    let registry = registry();
    configs
        .iter()
        .map(|config| {
            let ctor = registry
                .get(config.kind.as_str())
                .ok_or_else(|| DeliveryError::UnknownKind(config.kind.clone()))?;
            ctor(config, context)
        })
        .collect()
}
