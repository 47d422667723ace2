//! Fetching the vocal sample.
//!
//! One attempt per session: a failed fetch, a digest mismatch or an
//! undecodable payload marks the slot failed and nothing retries it.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use log::{info, warn};
use sha2::{Digest, Sha256};

use crate::dsp::sampler::SampleBuffer;
use crate::error::SampleError;

use super::{SampleSlot, SampleSource, decode};

/// Payload of a base64 `data:` URL, or `None` for any other URL.
pub fn data_url_payload(url: &str) -> Option<Result<Vec<u8>, SampleError>> {
    let rest = url.strip_prefix("data:")?;
    let Some((_, encoded)) = rest.split_once(";base64,") else {
        return Some(Err(SampleError::Fetch(
            "only base64 data URLs are supported".to_string(),
        )));
    };
    Some(
        STANDARD
            .decode(encoded)
            .map_err(|e| SampleError::Fetch(e.to_string())),
    )
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    Sha256::digest(bytes)
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
}

pub fn verify(bytes: &[u8], expected: Option<&str>) -> Result<(), SampleError> {
    let Some(expected) = expected else {
        return Ok(());
    };
    let actual = sha256_hex(bytes);
    if actual.eq_ignore_ascii_case(expected) {
        Ok(())
    } else {
        Err(SampleError::Integrity {
            expected: expected.to_string(),
            actual,
        })
    }
}

pub async fn fetch_bytes(url: &str) -> Result<Vec<u8>, SampleError> {
    if let Some(payload) = data_url_payload(url) {
        return payload;
    }
    let response = reqwest::get(url)
        .await
        .and_then(|r| r.error_for_status())
        .map_err(|e| SampleError::Fetch(e.to_string()))?;
    let bytes = response
        .bytes()
        .await
        .map_err(|e| SampleError::Fetch(e.to_string()))?;
    Ok(bytes.to_vec())
}

pub async fn load(source: &SampleSource) -> Result<SampleBuffer, SampleError> {
    let bytes = fetch_bytes(&source.url).await?;
    verify(&bytes, source.sha256.as_deref())?;
    decode::decode(&bytes)
}

/// Fill `slot` from `source`. Never fails: errors are logged and leave the
/// slot marked failed.
pub async fn load_into(source: &SampleSource, slot: &SampleSlot) {
    match load(source).await {
        Ok(buffer) => {
            info!(
                target: "audio",
                "vocal sample loaded: {:.2}s at {} Hz",
                buffer.duration(),
                buffer.sample_rate
            );
            slot.fill(buffer);
        }
        Err(e) => {
            warn!(target: "audio", "vocal sample unavailable: {e}");
            slot.mark_failed();
        }
    }
}

/// Load on a background thread so gesture handling never waits on the
/// network.
#[cfg(not(target_arch = "wasm32"))]
pub fn spawn_load(source: SampleSource, slot: SampleSlot) -> std::thread::JoinHandle<()> {
    std::thread::spawn(move || {
        let runtime = match tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
        {
            Ok(rt) => rt,
            Err(e) => {
                warn!(target: "audio", "no runtime for sample fetch: {e}");
                slot.mark_failed();
                return;
            }
        };
        runtime.block_on(load_into(&source, &slot));
    })
}
