//! A single message handed to a consumer.

use std::borrow::Cow;
use std::fmt;

use crate::memory::MemoryAck;
use crate::TransportError;

/// A message pulled from a subscription, awaiting settlement.
///
/// Dropping a delivery without settling it leaves the decision to the
/// transport: AMQP brokers redeliver it once the channel closes, the
/// in-memory queue forgets it.
pub struct Delivery {
    payload: Vec<u8>,
    redelivered: bool,
    ack: Acknowledger,
}

pub(crate) enum Acknowledger {
    Memory(MemoryAck),
    #[cfg(feature = "amqp")]
    Amqp(lapin::acker::Acker),
}

impl Delivery {
    pub(crate) fn new(payload: Vec<u8>, redelivered: bool, ack: Acknowledger) -> Self {
        Self {
            payload,
            redelivered,
            ack,
        }
    }

    /// Raw message body.
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Message body as text. Invalid UTF-8 sequences are replaced.
    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.payload)
    }

    /// Whether the transport has delivered this message before.
    pub fn redelivered(&self) -> bool {
        self.redelivered
    }

    /// Mark the message as consumed. It will not be delivered again.
    pub async fn ack(self) -> Result<(), TransportError> {
        match self.ack {
            Acknowledger::Memory(_) => Ok(()),
            #[cfg(feature = "amqp")]
            Acknowledger::Amqp(acker) => acker
                .ack(lapin::options::BasicAckOptions::default())
                .await
                .map_err(|e| TransportError::Ack(e.to_string())),
        }
    }

    /// Hand the message back to the transport for redelivery.
    pub async fn requeue(self) -> Result<(), TransportError> {
        match self.ack {
            Acknowledger::Memory(ack) => {
                ack.requeue(self.payload);
                Ok(())
            }
            #[cfg(feature = "amqp")]
            Acknowledger::Amqp(acker) => acker
                .nack(lapin::options::BasicNackOptions {
                    requeue: true,
                    ..Default::default()
                })
                .await
                .map_err(|e| TransportError::Ack(e.to_string())),
        }
    }
}

impl fmt::Debug for Delivery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Delivery")
            .field("bytes", &self.payload.len())
            .field("redelivered", &self.redelivered)
            .finish()
    }
}
