//! Audio payload preparation.

use crate::error::VoiceError;

const WAV_HEADER_LEN: usize = 44;

/// Converts an uploaded clip to the raw PCM a streaming recognizer expects.
///
/// `pcm` passes through, `wav` has its `data` chunk extracted. Other
/// formats are passed through untouched with a warning; the recognizer
/// will usually reject them.
pub fn prepare_pcm(audio: &[u8], format: &str) -> Result<Vec<u8>, VoiceError> {
    match format.to_ascii_lowercase().as_str() {
        "pcm" => Ok(audio.to_vec()),
        "wav" => extract_pcm_from_wav(audio).map(<[u8]>::to_vec),
        other => {
            tracing::warn!(format = other, "no PCM conversion for format, sending audio as-is");
            Ok(audio.to_vec())
        }
    }
}

/// Returns the samples of the `data` chunk of a RIFF/WAVE file.
pub fn extract_pcm_from_wav(wav: &[u8]) -> Result<&[u8], VoiceError> {
    if wav.len() < WAV_HEADER_LEN {
        return Err(VoiceError::Audio("invalid WAV file: too small".to_string()));
    }
    if &wav[0..4] != b"RIFF" || &wav[8..12] != b"WAVE" {
        return Err(VoiceError::Audio(
            "invalid WAV file: missing RIFF/WAVE header".to_string(),
        ));
    }

    let mut pos = 12;
    while pos + 8 <= wav.len() {
        let id = &wav[pos..pos + 4];
        let size = u32::from_le_bytes([wav[pos + 4], wav[pos + 5], wav[pos + 6], wav[pos + 7]])
            as usize;
        let body = pos + 8;

        if id == b"data" {
            // Streaming encoders often write a bogus size; clamp to what we have.
            let end = body.saturating_add(size).min(wav.len());
            tracing::debug!(offset = body, bytes = end - body, "extracted PCM from WAV");
            return Ok(&wav[body..end]);
        }

        // Chunks are word-aligned.
        pos = body.saturating_add(size).saturating_add(size & 1);
    }

    Err(VoiceError::Audio(
        "invalid WAV file: missing data chunk".to_string(),
    ))
}

#[cfg(test)]
pub(crate) fn wav_from_pcm(pcm: &[u8]) -> Vec<u8> {
    let mut wav = Vec::with_capacity(WAV_HEADER_LEN + pcm.len());
    wav.extend_from_slice(b"RIFF");
    wav.extend_from_slice(&(36 + pcm.len() as u32).to_le_bytes());
    wav.extend_from_slice(b"WAVE");
    wav.extend_from_slice(b"fmt ");
    wav.extend_from_slice(&16u32.to_le_bytes());
    wav.extend_from_slice(&1u16.to_le_bytes()); // PCM
    wav.extend_from_slice(&1u16.to_le_bytes()); // mono
    wav.extend_from_slice(&16_000u32.to_le_bytes());
    wav.extend_from_slice(&32_000u32.to_le_bytes());
    wav.extend_from_slice(&2u16.to_le_bytes());
    wav.extend_from_slice(&16u16.to_le_bytes());
    wav.extend_from_slice(b"data");
    wav.extend_from_slice(&(pcm.len() as u32).to_le_bytes());
    wav.extend_from_slice(pcm);
    wav
}
