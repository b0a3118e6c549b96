// This software is provided for non-commercial use only.
// Commercial use is strictly prohibited.
// If you use, modify, or redistribute this software, you must provide proper attribution to the original author.
// (c) 2026 Onur Tuna. All rights reserved.

//! Wire-format primitives shared by every blob layout in the crate:
//! NUL-terminated variable-width decimal integers, fixed 12-byte
//! zero-padded decimal integers, and NUL-terminated strings.
//!
//! Per spec §9, these are deliberately ASCII decimal rather than native
//! binary integers: it sidesteps endianness and lets a recording be
//! inspected with a text viewer. Do not "optimize" this into a binary
//! encoding — playback blobs produced by earlier code must stay readable.

use crate::blob::{BlobStore, ReadHandle, WriteHandle};
use crate::error::{CoreError, Result};

/// Width in bytes of every padded position/length field in the wire
/// formats (`StartPos`, `IndexLength`). Keep this in sync with any reader
/// that scans backward by subtracting a fixed width — see spec §9.
pub const PADDED_WIDTH: usize = 12;

pub const MAGIC_FOOTER: &str = "MX_RECORDING";

/// Write a signed integer as decimal ASCII terminated by a NUL byte.
pub fn write_int<S: BlobStore>(store: &mut S, h: &mut WriteHandle, v: i64) -> Result<()> {
    let mut s = v.to_string().into_bytes();
    s.push(0);
    store.write(h, &s)
}

/// Read a NUL-terminated decimal integer. Fails if the terminator is
/// never found within `max_digits` bytes (corrupt/truncated stream).
pub fn read_int<S: BlobStore>(store: &mut S, h: &mut ReadHandle) -> Result<i64> {
    let mut digits = Vec::new();
    let mut byte = [0u8; 1];
    loop {
        let n = store.read(h, 1, &mut byte)?;
        if n == 0 {
            return Err(CoreError::Integrity("unterminated integer".into()));
        }
        if byte[0] == 0 {
            break;
        }
        digits.push(byte[0]);
        if digits.len() > 32 {
            return Err(CoreError::Integrity("integer field too long".into()));
        }
    }
    std::str::from_utf8(&digits)
        .ok()
        .and_then(|s| s.parse::<i64>().ok())
        .ok_or_else(|| CoreError::Integrity("malformed integer".into()))
}

/// Write a value as a fixed [`PADDED_WIDTH`]-byte decimal field, zero
/// (NUL) padded on the right. The fixed width is what lets backward scans
/// land on a frame's footer by subtracting `PADDED_WIDTH` from the cursor.
pub fn write_padded<S: BlobStore>(store: &mut S, h: &mut WriteHandle, v: u64) -> Result<()> {
    let digits = v.to_string();
    if digits.len() >= PADDED_WIDTH {
        return Err(CoreError::Integrity(format!(
            "value {v} does not fit in {PADDED_WIDTH}-byte padded field"
        )));
    }
    let mut buf = [0u8; PADDED_WIDTH];
    buf[..digits.len()].copy_from_slice(digits.as_bytes());
    store.write(h, &buf)
}

/// Read a fixed [`PADDED_WIDTH`]-byte decimal field.
pub fn read_padded<S: BlobStore>(store: &mut S, h: &mut ReadHandle) -> Result<u64> {
    let mut buf = [0u8; PADDED_WIDTH];
    let n = store.read(h, PADDED_WIDTH, &mut buf)?;
    if n != PADDED_WIDTH {
        return Err(CoreError::Integrity("truncated padded field".into()));
    }
    decode_padded(&buf)
}

/// Decode an already-read [`PADDED_WIDTH`]-byte buffer in place, without
/// going through the blob store — used by backward scans that read the
/// footer bytes directly.
pub fn decode_padded(buf: &[u8; PADDED_WIDTH]) -> Result<u64> {
    let end = buf.iter().position(|&b| b == 0).unwrap_or(PADDED_WIDTH);
    std::str::from_utf8(&buf[..end])
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .ok_or_else(|| CoreError::Integrity("malformed padded field".into()))
}

pub fn encode_padded(v: u64) -> Result<[u8; PADDED_WIDTH]> {
    let digits = v.to_string();
    if digits.len() >= PADDED_WIDTH {
        return Err(CoreError::Integrity(format!(
            "value {v} does not fit in {PADDED_WIDTH}-byte padded field"
        )));
    }
    let mut buf = [0u8; PADDED_WIDTH];
    buf[..digits.len()].copy_from_slice(digits.as_bytes());
    Ok(buf)
}

/// Write a NUL-terminated UTF-8 string.
pub fn write_str<S: BlobStore>(store: &mut S, h: &mut WriteHandle, s: &str) -> Result<()> {
    store.write(h, s.as_bytes())?;
    store.write(h, &[0u8])
}

/// Read a NUL-terminated UTF-8 string.
pub fn read_str<S: BlobStore>(store: &mut S, h: &mut ReadHandle) -> Result<String> {
    let mut bytes = Vec::new();
    let mut byte = [0u8; 1];
    loop {
        let n = store.read(h, 1, &mut byte)?;
        if n == 0 {
            return Err(CoreError::Integrity("unterminated string".into()));
        }
        if byte[0] == 0 {
            break;
        }
        bytes.push(byte[0]);
    }
    String::from_utf8(bytes).map_err(|_| CoreError::Integrity("non-UTF-8 string field".into()))
}

/// Write exactly `bytes.len()` raw bytes with no framing, used for region
/// payloads where the length is already known from the region table.
pub fn write_raw<S: BlobStore>(store: &mut S, h: &mut WriteHandle, bytes: &[u8]) -> Result<()> {
    store.write(h, bytes)
}

/// Read exactly `n` raw bytes, failing if fewer are available.
pub fn read_raw<S: BlobStore>(store: &mut S, h: &mut ReadHandle, n: usize) -> Result<Vec<u8>> {
    let mut buf = vec![0u8; n];
    let got = store.read(h, n, &mut buf)?;
    if got != n {
        return Err(CoreError::Integrity(format!(
            "truncated raw field: wanted {n} bytes, got {got}"
        )));
    }
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blob::FileBlobStore;
    use tempfile::tempdir;

    #[test]
    fn roundtrip_int_and_padded_and_str() {
        let dir = tempdir().unwrap();
        let mut store = FileBlobStore::new(dir.path()).unwrap();
        let mut w = store.open_write("t").unwrap();
        write_int(&mut store, &mut w, -42).unwrap();
        write_padded(&mut store, &mut w, 12345).unwrap();
        write_str(&mut store, &mut w, "hp").unwrap();
        write_raw(&mut store, &mut w, &[1, 2, 3]).unwrap();
        store.close_write(w).unwrap();

        let mut r = store.open_read("t").unwrap();
        assert_eq!(read_int(&mut store, &mut r).unwrap(), -42);
        assert_eq!(read_padded(&mut store, &mut r).unwrap(), 12345);
        assert_eq!(read_str(&mut store, &mut r).unwrap(), "hp");
        assert_eq!(read_raw(&mut store, &mut r, 3).unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn padded_field_is_fixed_width() {
        let buf = encode_padded(7).unwrap();
        assert_eq!(buf.len(), PADDED_WIDTH);
        assert_eq!(decode_padded(&buf).unwrap(), 7);
    }

    #[test]
    fn padded_overflow_rejected() {
        assert!(encode_padded(999_999_999_999).is_err());
    }
}
