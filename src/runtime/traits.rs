//! Trait abstractions for runtime output
//!
//! The renderer seam lets tests record every transcript the session produces.

use super::SseEvent;
use crate::transcript::TranscriptRow;
use std::sync::Arc;
use tokio::sync::broadcast;

/// Receives the complete transcript after every log mutation
pub trait TranscriptRenderer: Send + Sync {
    /// Replace whatever is displayed with `rows`. Never a diff.
    fn render(&self, rows: &[TranscriptRow]);
}

impl<T: TranscriptRenderer + ?Sized> TranscriptRenderer for Arc<T> {
    fn render(&self, rows: &[TranscriptRow]) {
        (**self).render(rows);
    }
}

// ============================================================================
// Production Adapter
// ============================================================================

/// Pushes each transcript to the session's SSE subscribers
pub struct BroadcastRenderer {
    broadcast_tx: broadcast::Sender<SseEvent>,
}

impl BroadcastRenderer {
    pub fn new(broadcast_tx: broadcast::Sender<SseEvent>) -> Self {
        Self { broadcast_tx }
    }
}

impl TranscriptRenderer for BroadcastRenderer {
    fn render(&self, rows: &[TranscriptRow]) {
        // No subscribers is fine: a page that connects later gets the init view
        let _ = self.broadcast_tx.send(SseEvent::Transcript {
            rows: rows.to_vec(),
        });
    }
}
