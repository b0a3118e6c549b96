// This software is provided for non-commercial use only.
// Commercial use is strictly prohibited.
// If you use, modify, or redistribute this software, you must provide proper attribution to the original author.
// (c) 2026 Onur Tuna. All rights reserved.

use thiserror::Error;

/// Error taxonomy for the core: a bug in how the core is being driven, a
/// resource limit, an I/O failure surfaced by the host's blob store, or a
/// recording/layout that does not match what is live in memory.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Blob store error: {0}")]
    Blob(String),

    #[error("Capacity exceeded: {0}")]
    Capacity(String),

    #[error("Precondition violated: {0}")]
    Precondition(String),

    #[error("Integrity check failed: {0}")]
    Integrity(String),
}

pub type Result<T> = std::result::Result<T, CoreError>;
