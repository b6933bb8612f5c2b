//! Delta codec for revision bodies.
//!
//! A delta is a zstd frame compressed with the reference body loaded as a
//! dictionary, so shared runs between the two bodies cost almost nothing.
//! The frame records its decompressed content size and carries no internal
//! checksum: both bodies come out of the same document, and the enclosing
//! store already checksums whole documents.

use crate::error::{Error, Result};

// Revision bodies are small JSON; higher levels buy nothing measurable.
const DELTA_LEVEL: i32 = 3;

// Bodies travel in raw records whose size field is a u32, so any content
// size claim beyond that is garbage (or one of zstd's error sentinels).
const MAX_EXPANDED_LEN: u64 = u32::MAX as u64;

/// Compute a delta that turns `reference` into `target`.
pub fn create_delta(reference: &[u8], target: &[u8]) -> Result<Vec<u8>> {
    let cdict = zstd_safe::create_cdict(reference, DELTA_LEVEL);
    let mut ctx = zstd_safe::create_cctx();
    let max_len = zstd_safe::compress_bound(target.len());
    let mut dest = Vec::with_capacity(max_len);
    // Safety: space for max_len was just reserved, and the compressor
    // overwrites the buffer and returns the valid length. On failure the
    // vec is freed without being read.
    unsafe {
        dest.set_len(max_len);
        let len = ctx
            .compress_using_cdict(&mut dest[..], target, &cdict)
            .map_err(|e| Error::DeltaFailure(format!("zstd compression failed, error = {}", e)))?;
        dest.truncate(len);
    }
    Ok(dest)
}

/// Apply a delta produced by [`create_delta`] against the same `reference`,
/// recovering the target body.
pub fn apply_delta(reference: &[u8], delta: &[u8]) -> Result<Vec<u8>> {
    let expected_len = zstd_safe::get_frame_content_size(delta);
    if expected_len > MAX_EXPANDED_LEN {
        return Err(Error::DeltaFailure(
            "delta frame carries no valid content size".into(),
        ));
    }
    let expected_len = expected_len as usize;
    let ddict = zstd_safe::create_ddict(reference);
    let mut dctx = zstd_safe::create_dctx();
    let mut dest = Vec::with_capacity(expected_len);
    // Safety: space for expected_len was just reserved, and the decompressor
    // overwrites the buffer and returns the valid length. On failure the
    // vec is freed without being read.
    unsafe {
        dest.set_len(expected_len);
        let len = dctx
            .decompress_using_ddict(&mut dest[..], delta, &ddict)
            .map_err(|e| {
                Error::DeltaFailure(format!("zstd decompression failed, error = {}", e))
            })?;
        dest.truncate(len);
    }
    Ok(dest)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip() {
        let reference = br#"{"name":"alpha","count":1,"tags":["a","b"]}"#;
        let target = br#"{"name":"alpha","count":2,"tags":["a","b","c"]}"#;
        let delta = create_delta(reference, target).unwrap();
        let expanded = apply_delta(reference, &delta).unwrap();
        assert_eq!(expanded, target);
    }

    #[test]
    fn roundtrip_empty_reference() {
        let target = b"first revision body";
        let delta = create_delta(b"", target).unwrap();
        assert_eq!(apply_delta(b"", &delta).unwrap(), target);
    }

    #[test]
    fn garbage_delta_rejected() {
        let err = apply_delta(b"reference", b"not a zstd frame").unwrap_err();
        assert!(matches!(err, Error::DeltaFailure(_)));
    }

    #[test]
    fn truncated_delta_rejected() {
        let reference = b"the quick brown fox jumps over the lazy dog";
        let target = b"the quick brown fox jumps over the lazy cat";
        let delta = create_delta(reference, target).unwrap();
        let err = apply_delta(reference, &delta[..delta.len() / 2]).unwrap_err();
        assert!(matches!(err, Error::DeltaFailure(_)));
    }
}
