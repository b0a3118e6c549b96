// This software is provided for non-commercial use only.
// Commercial use is strictly prohibited.
// If you use, modify, or redistribute this software, you must provide proper attribution to the original author.
// (c) 2026 Onur Tuna. All rights reserved.

//! Blob store — the core's only I/O dependency.
//!
//! A named, byte-addressable sequential store: writers append, readers
//! seek freely. This is deliberately the *only* interface the rest of the
//! crate talks to the filesystem through, so a host embedding this core
//! can swap in an in-memory or platform-specific store by implementing
//! [`BlobStore`] without touching recorder/playback logic at all.

use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::error::{CoreError, Result};

/// Opaque handle to an open-for-write blob.
pub struct WriteHandle {
    name: String,
    file: BufWriter<File>,
}

/// Opaque handle to an open-for-read blob.
pub struct ReadHandle {
    name: String,
    file: BufReader<File>,
    len: u64,
}

/// The blob store contract described in the spec: open-for-write,
/// open-for-read (returns length), append, read, seek, tell, close,
/// delete. Every operation may fail individually; none of them panic.
pub trait BlobStore {
    fn open_write(&mut self, name: &str) -> Result<WriteHandle>;
    fn open_read(&mut self, name: &str) -> Result<ReadHandle>;
    fn write(&mut self, handle: &mut WriteHandle, bytes: &[u8]) -> Result<()>;
    fn read(&mut self, handle: &mut ReadHandle, n: usize, buf: &mut [u8]) -> Result<usize>;
    fn seek(&mut self, handle: &mut ReadHandle, absolute_pos: u64) -> Result<()>;
    fn tell_write(&mut self, handle: &mut WriteHandle) -> Result<u64>;
    fn tell_read(&mut self, handle: &mut ReadHandle) -> Result<u64>;
    fn close_write(&mut self, handle: WriteHandle) -> Result<()>;
    fn close_read(&mut self, handle: ReadHandle) -> Result<()>;
    fn delete(&mut self, name: &str) -> Result<()>;
    fn exists(&self, name: &str) -> bool;
}

/// Flat-file backed [`BlobStore`]: one file per blob name under a base
/// directory. Names are flat (no nested paths); append-only for writers,
/// random-access for readers, exactly as the spec requires.
pub struct FileBlobStore {
    base: PathBuf,
    open_writers: HashMap<String, ()>,
}

impl FileBlobStore {
    pub fn new(base: impl Into<PathBuf>) -> Result<Self> {
        let base = base.into();
        std::fs::create_dir_all(&base)
            .map_err(|e| CoreError::Blob(format!("cannot create base dir {base:?}: {e}")))?;
        Ok(Self { base, open_writers: HashMap::new() })
    }

    fn path_for(&self, name: &str) -> PathBuf {
        self.base.join(name)
    }
}

impl BlobStore for FileBlobStore {
    fn open_write(&mut self, name: &str) -> Result<WriteHandle> {
        let path = self.path_for(name);
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| CoreError::Blob(format!("open_write {name}: {e}")))?;
        self.open_writers.insert(name.to_string(), ());
        Ok(WriteHandle { name: name.to_string(), file: BufWriter::new(file) })
    }

    fn open_read(&mut self, name: &str) -> Result<ReadHandle> {
        let path = self.path_for(name);
        let file = File::open(&path)
            .map_err(|e| CoreError::Blob(format!("open_read {name}: {e}")))?;
        let len = file
            .metadata()
            .map_err(|e| CoreError::Blob(format!("stat {name}: {e}")))?
            .len();
        Ok(ReadHandle { name: name.to_string(), file: BufReader::new(file), len })
    }

    fn write(&mut self, handle: &mut WriteHandle, bytes: &[u8]) -> Result<()> {
        handle
            .file
            .write_all(bytes)
            .map_err(|e| CoreError::Blob(format!("write {}: {e}", handle.name)))
    }

    fn read(&mut self, handle: &mut ReadHandle, n: usize, buf: &mut [u8]) -> Result<usize> {
        debug_assert!(buf.len() >= n);
        let mut read_total = 0usize;
        while read_total < n {
            match handle.file.read(&mut buf[read_total..n]) {
                Ok(0) => break,
                Ok(k) => read_total += k,
                Err(e) => return Err(CoreError::Blob(format!("read {}: {e}", handle.name))),
            }
        }
        Ok(read_total)
    }

    fn seek(&mut self, handle: &mut ReadHandle, absolute_pos: u64) -> Result<()> {
        handle
            .file
            .seek(SeekFrom::Start(absolute_pos))
            .map(|_| ())
            .map_err(|e| CoreError::Blob(format!("seek {}: {e}", handle.name)))
    }

    fn tell_write(&mut self, handle: &mut WriteHandle) -> Result<u64> {
        handle
            .file
            .stream_position()
            .map_err(|e| CoreError::Blob(format!("tell {}: {e}", handle.name)))
    }

    fn tell_read(&mut self, handle: &mut ReadHandle) -> Result<u64> {
        handle
            .file
            .stream_position()
            .map_err(|e| CoreError::Blob(format!("tell {}: {e}", handle.name)))
    }

    fn close_write(&mut self, mut handle: WriteHandle) -> Result<()> {
        handle
            .file
            .flush()
            .map_err(|e| CoreError::Blob(format!("close_write {}: {e}", handle.name)))?;
        self.open_writers.remove(&handle.name);
        Ok(())
    }

    fn close_read(&mut self, _handle: ReadHandle) -> Result<()> {
        Ok(())
    }

    fn delete(&mut self, name: &str) -> Result<()> {
        let path = self.path_for(name);
        if path.exists() {
            std::fs::remove_file(&path)
                .map_err(|e| CoreError::Blob(format!("delete {name}: {e}")))?;
        }
        Ok(())
    }

    fn exists(&self, name: &str) -> bool {
        self.path_for(name).exists()
    }
}

impl ReadHandle {
    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl WriteHandle {
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Append the raw bytes of one blob onto the tail of another, used by
/// crash recovery and recording finalization to splice the index onto
/// the recording without holding both entirely in memory.
pub fn copy_blob<S: BlobStore>(store: &mut S, src: &str, dst: &mut WriteHandle) -> Result<u64> {
    let mut reader = store.open_read(src)?;
    let mut total = 0u64;
    let mut buf = [0u8; 8192];
    loop {
        let n = store.read(&mut reader, buf.len(), &mut buf)?;
        if n == 0 {
            break;
        }
        store.write(dst, &buf[..n])?;
        total += n as u64;
    }
    store.close_read(reader)?;
    Ok(total)
}

/// Convenience used by tests/demos that want the store's base directory.
pub fn base_dir(store: &FileBlobStore) -> &Path {
    &store.base
}
