//! Delivery driver for the consumer cursor protocol.
//!
//! Each consumer's cursor is an append-only watermark on the ledger. The
//! driver loads everything past the cursor, hands the batch to the
//! deliverer in sequence order, and advances the watermark to the last
//! submission the deliverer confirmed. A partially delivered prefix is
//! recorded before the failure propagates, so a retry resumes after it.

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::delivery::{Deliverer, DeliveryError};
use crate::repository::{LedgerError, LedgerRepository};

#[derive(Debug, Error)]
pub enum DeliveryRunError {
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error("delivery to '{consumer}' failed: {source}")]
    Failed {
        consumer: String,
        #[source]
        source: DeliveryError,
    },
}

/// One sequential delivery pass over every configured consumer.
pub async fn run_delivery_pass(
    ledger: &LedgerRepository,
    deliverers: &[Box<dyn Deliverer>],
) -> Result<(), DeliveryRunError> {
    for deliverer in deliverers {
        let consumer = deliverer.name();
        let pending = ledger.submissions_since(consumer).await?;
        let Some(last) = pending.last() else {
            debug!(consumer, "nothing new to deliver");
            continue;
        };
        let last_id = last.sequence_id;
        info!(consumer, count = pending.len(), "delivering new submissions");

        match deliverer.deliver(&pending).await {
            Ok(()) => {
                ledger.advance_watermark(consumer, last_id).await?;
                info!(consumer, watermark = last_id, "delivery complete");
            }
            Err(DeliveryError::Partial { delivered, source }) => {
                if delivered > 0 {
                    let confirmed = pending[delivered - 1].sequence_id;
                    ledger.advance_watermark(consumer, confirmed).await?;
                    warn!(
                        consumer,
                        delivered,
                        watermark = confirmed,
                        "partial delivery recorded before failure"
                    );
                }
                return Err(DeliveryRunError::Failed {
                    consumer: consumer.to_string(),
                    source: DeliveryError::Partial { delivered, source },
                });
            }
            Err(source) => {
                return Err(DeliveryRunError::Failed {
                    consumer: consumer.to_string(),
                    source,
                });
            }
        }
    }
    Ok(())
}
