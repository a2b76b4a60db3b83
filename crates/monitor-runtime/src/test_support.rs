//! Test doubles shared by the runtime tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::notifier::ChatSender;

// ── RecordingSender ───────────────────────────────────────────────────────────

/// Records every message; the first `fail_first` deliveries report failure.
#[derive(Default)]
pub struct RecordingSender {
    sent: Arc<Mutex<Vec<String>>>,
    fail_first: usize,
    calls: AtomicUsize,
}

impl RecordingSender {
    pub fn failing_first(fail_first: usize) -> Self {
        Self {
            fail_first,
            ..Self::default()
        }
    }

    /// Handle to the recorded messages, usable after the sender is boxed.
    pub fn sent(&self) -> Arc<Mutex<Vec<String>>> {
        Arc::clone(&self.sent)
    }
}

#[async_trait]
impl ChatSender for RecordingSender {
    async fn send_message(&self, text: &str) -> bool {
        self.sent.lock().unwrap().push(text.to_string());
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        call >= self.fail_first
    }
}
