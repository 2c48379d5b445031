//! Per-board "board changed" signals.
//!
//! The signal carries no payload: subscribers re-read the board snapshot, so
//! duplicated or coalesced signals are harmless.

use parking_lot::Mutex;
use std::collections::HashMap;
use tokio::sync::broadcast;
use tracing::debug;

const CHANNEL_CAPACITY: usize = 16;

/// A committed change on the subscribed board.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoardChanged;

#[derive(Debug, Default)]
pub struct UpdateNotifier {
    channels: Mutex<HashMap<String, broadcast::Sender<BoardChanged>>>,
}

impl UpdateNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, board_id: &str) -> BoardSubscription {
        let mut channels = self.channels.lock();
        let sender = channels
            .entry(board_id.to_string())
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0);
        BoardSubscription {
            receiver: sender.subscribe(),
        }
    }

    /// Fire-and-forget; nothing happens when nobody listens.
    pub fn publish(&self, board_id: &str) {
        let channels = self.channels.lock();
        if let Some(sender) = channels.get(board_id) {
            if sender.send(BoardChanged).is_err() {
                debug!("no live subscribers for board {board_id}");
            }
        }
    }

    /// Drop the board's channel; current subscribers see it close.
    pub fn close(&self, board_id: &str) {
        self.channels.lock().remove(board_id);
    }

    pub fn subscriber_count(&self, board_id: &str) -> usize {
        self.channels
            .lock()
            .get(board_id)
            .map(|sender| sender.receiver_count())
            .unwrap_or(0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("board channel closed")]
pub struct SubscriptionClosed;

pub struct BoardSubscription {
    receiver: broadcast::Receiver<BoardChanged>,
}

impl BoardSubscription {
    /// Wait for the next change. Signals missed while lagging collapse into one.
    pub async fn changed(&mut self) -> Result<(), SubscriptionClosed> {
        match self.receiver.recv().await {
            Ok(BoardChanged) | Err(broadcast::error::RecvError::Lagged(_)) => Ok(()),
            Err(broadcast::error::RecvError::Closed) => Err(SubscriptionClosed),
        }
    }

    /// Non-blocking check: `Ok(true)` when at least one change is queued.
    pub fn try_changed(&mut self) -> Result<bool, SubscriptionClosed> {
        use broadcast::error::TryRecvError;
        match self.receiver.try_recv() {
            Ok(BoardChanged) | Err(TryRecvError::Lagged(_)) => Ok(true),
            Err(TryRecvError::Empty) => Ok(false),
            Err(TryRecvError::Closed) => Err(SubscriptionClosed),
        }
    }
}
