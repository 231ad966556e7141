use crate::error::{CallError, Result};
use crate::peer::types::Envelope;

/// Ограничение размера входящего сообщения: 256 KiB
pub const MAX_BLOB_SIZE: usize = 256 * 1024;

/// Исходящее сообщение не больше того, что примет другая сторона
pub fn encode(envelope: &Envelope) -> Result<String> {
    let blob = serde_json::to_string(envelope)?;
    check_size(&blob)?;
    Ok(blob)
}

pub fn decode(blob: &str) -> Result<Envelope> {
    check_size(blob)?;
    Ok(serde_json::from_str(blob)?)
}

fn check_size(blob: &str) -> Result<()> {
    if blob.len() > MAX_BLOB_SIZE {
        return Err(CallError::MalformedBlob(format!(
            "payload of {} bytes exceeds {} byte limit",
            blob.len(),
            MAX_BLOB_SIZE
        )));
    }
    Ok(())
}
