//! Messages sent from background tasks to the consumer.

use log::trace;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use crate::api::models::{DeviceRecord, OperationId, Outcome, Subsystem};

/// A result ready for the consumer.
///
/// Deliveries arrive on a single channel and are drained on the consumer's
/// own loop, so consumer state is never touched from a background task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    /// A subsystem's device list was replaced.
    DevicesUpdated {
        /// Subsystem of the list
        subsystem: Subsystem,
        /// The new list, possibly empty
        devices: Vec<DeviceRecord>,
    },
    /// A subsystem's radio flag was set.
    RadioStateChanged {
        /// Subsystem of the radio
        subsystem: Subsystem,
        /// Whether the radio is on
        enabled: bool,
    },
    /// An operation reached its terminal phase.
    OperationComplete {
        /// Id returned when the operation was scheduled
        id: OperationId,
        /// What happened
        outcome: Outcome,
    },
}

/// Sending half of the delivery channel.
#[derive(Debug, Clone)]
pub(crate) struct DeliverySender {
    tx: UnboundedSender<Delivery>,
}

impl DeliverySender {
    /// Creates the channel.
    pub(crate) fn channel() -> (Self, UnboundedReceiver<Delivery>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Queues `delivery`. A consumer that has gone away is not an error.
    pub(crate) fn send(&self, delivery: Delivery) {
        if let Err(e) = self.tx.send(delivery) {
            trace!("Consumer gone, dropping {:?}", e.0);
        }
    }
}
