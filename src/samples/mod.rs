//! The vocal sample behind the sampled choir.
//!
//! A `SampleSlot` starts empty and is filled at most once, from whatever
//! thread finished the download. Voices read it without blocking: until the
//! slot is loaded they are simply not started.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

use serde::{Deserialize, Serialize};

use crate::dsp::sampler::SampleBuffer;

#[cfg(feature = "remote-samples")]
pub mod decode;
#[cfg(feature = "remote-samples")]
pub mod fetch;

/// Where the vocal sample comes from. `url` may also be a base64 `data:` URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SampleSource {
    pub url: String,
    /// Lowercase hex digest the payload must match.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha256: Option<String>,
}

#[derive(Debug, Default)]
struct Slot {
    buffer: OnceLock<Arc<SampleBuffer>>,
    failed: AtomicBool,
}

/// Shared, fill-once holder for a decoded sample.
#[derive(Debug, Clone, Default)]
pub struct SampleSlot {
    inner: Arc<Slot>,
}

impl SampleSlot {
    pub fn new() -> Self {
        SampleSlot::default()
    }

    /// A slot that is already loaded.
    pub fn loaded(buffer: SampleBuffer) -> Self {
        let slot = SampleSlot::new();
        slot.fill(buffer);
        slot
    }

    pub fn is_loaded(&self) -> bool {
        self.inner.buffer.get().is_some()
    }

    /// Loading failed; the slot stays empty for the rest of the session.
    pub fn has_failed(&self) -> bool {
        self.inner.failed.load(Ordering::Acquire)
    }

    pub fn get(&self) -> Option<Arc<SampleBuffer>> {
        self.inner.buffer.get().cloned()
    }

    /// Store the decoded sample. Returns false if the slot was already filled
    /// or has been marked failed.
    pub fn fill(&self, buffer: SampleBuffer) -> bool {
        if self.has_failed() {
            return false;
        }
        self.inner.buffer.set(Arc::new(buffer)).is_ok()
    }

    pub fn mark_failed(&self) {
        self.inner.failed.store(true, Ordering::Release);
    }
}
