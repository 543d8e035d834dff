//! Committed-block stream with explicit acknowledgment.

use brvs_transactions::Block;
use tokio::sync::{mpsc, oneshot};

/// One committed block plus the handle that acknowledges it.
///
/// Dropping a delivery without calling [`BlockDelivery::ack`] leaves the block
/// unacknowledged; the ledger redelivers it on the next subscription.
#[derive(Debug)]
pub struct BlockDelivery {
    pub block: Block,
    ack: oneshot::Sender<()>,
}

impl BlockDelivery {
    pub fn new(block: Block) -> (Self, oneshot::Receiver<()>) {
        let (ack, acked) = oneshot::channel();
        (Self { block, ack }, acked)
    }

    /// Acknowledge the block. The ledger may then advance past it.
    pub fn ack(self) -> Block {
        // The producer may have gone away; nothing is left to acknowledge to.
        let _ = self.ack.send(());
        self.block
    }
}

/// A single subscriber's view of the committed-block stream.
///
/// Blocks arrive strictly in height order, one at a time.
#[derive(Debug)]
pub struct BlockSubscription {
    rx: mpsc::Receiver<BlockDelivery>,
}

impl BlockSubscription {
    pub fn new(rx: mpsc::Receiver<BlockDelivery>) -> Self {
        Self { rx }
    }

    /// Next delivery, or `None` once the ledger closed the stream.
    pub async fn recv(&mut self) -> Option<BlockDelivery> {
        self.rx.recv().await
    }

    /// Stop receiving. Deliveries already buffered are dropped unacknowledged.
    pub fn close(&mut self) {
        self.rx.close();
    }
}
