/*
 * SPDX-FileCopyrightText: 2023 Inria
 * SPDX-FileCopyrightText: 2023 Sebastiano Vigna
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

//! Error kinds surfaced by the codec suite and the tiered tree/trie
//! structures.
//!
//! The library hand-rolls this enum rather than pulling in a derive-macro
//! error crate: the variant set is small and stable, and a plain enum
//! keeps the library's only error surface free of an extra dependency.

use core::fmt;

/// A library-level failure.
///
/// `Display` messages are written to be useful standalone (they show up
/// verbatim in the CLI's `✗` failure lines).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Malformed pattern, empty name, zero value where one was required,
    /// an out-of-range index on read, or a corrupt persisted header.
    InvalidInput(String),
    /// A group exceeding 64 fields, a pattern exceeding its segment/length
    /// cap, or a subscriber list exceeding its cap.
    CapacityExceeded(String),
    /// Attempted to combine incompatible cell variants where promotion is
    /// not defined.
    TypeMismatch(String),
    /// An allocation failed; for everything but tree promotion the
    /// receiver is left in its prior valid state.
    AllocationFailed(String),
    /// A file I/O failure during trie save/load.
    IoFailure(String),
}

impl Error {
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Error::InvalidInput(msg.into())
    }

    pub fn capacity_exceeded(msg: impl Into<String>) -> Self {
        Error::CapacityExceeded(msg.into())
    }

    pub fn type_mismatch(msg: impl Into<String>) -> Self {
        Error::TypeMismatch(msg.into())
    }

    pub fn allocation_failed(msg: impl Into<String>) -> Self {
        Error::AllocationFailed(msg.into())
    }

    pub fn io_failure(msg: impl Into<String>) -> Self {
        Error::IoFailure(msg.into())
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::InvalidInput(m) => write!(f, "invalid input: {m}"),
            Error::CapacityExceeded(m) => write!(f, "capacity exceeded: {m}"),
            Error::TypeMismatch(m) => write!(f, "type mismatch: {m}"),
            Error::AllocationFailed(m) => write!(f, "allocation failed: {m}"),
            Error::IoFailure(m) => write!(f, "I/O failure: {m}"),
        }
    }
}

impl std::error::Error for Error {}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::IoFailure(e.to_string())
    }
}

/// Convenience alias used across the crate.
pub type Result<T> = core::result::Result<T, Error>;
