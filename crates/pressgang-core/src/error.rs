// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for Pressgang.
//
// Four families: encoding (one bad attribute value), decoding (bad wire data),
// connection (anything between us and the spooler, circuit-open included),
// and the top-level `PressgangError` that wraps them all.

use thiserror::Error;

/// A value could not be encoded under its declared IPP syntax.
///
/// Fatal to the single attribute being encoded, never to the whole message.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EncodeError {
    #[error("malformed {syntax} value '{value}': {reason}")]
    MalformedValue {
        syntax: &'static str,
        value: String,
        reason: String,
    },

    #[error("malformed rangeOfInteger '{0}': expected '<min>:<max>'")]
    MalformedRange(String),

    #[error("{syntax} value '{value}' is not representable in {charset}")]
    Unrepresentable {
        syntax: &'static str,
        value: String,
        charset: &'static str,
    },

    #[error("value of {len} bytes exceeds the 65535-byte IPP limit")]
    ValueTooLong { len: usize },

    #[error("attribute name '{0}' exceeds the 65535-byte IPP limit")]
    NameTooLong(String),

    #[error("tag 0x{0:02x} is not an out-of-band value tag")]
    InvalidOutOfBandTag(u8),

    #[error("collection syntax has no scalar encoding")]
    CollectionValue,
}

/// Wire data could not be decoded.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("truncated message: {0}")]
    Truncated(&'static str),

    #[error("{syntax} value has {actual} bytes, expected {expected}")]
    InvalidLength {
        syntax: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("invalid {syntax} value: {reason}")]
    InvalidValue {
        syntax: &'static str,
        reason: String,
    },

    #[error("attribute '{0}' appears outside of any attribute group")]
    OutsideGroup(String),

    #[error("unexpected tag 0x{0:02x}")]
    UnexpectedTag(u8),

    #[error("unbalanced collection: {0}")]
    UnbalancedCollection(String),
}

/// Failure delivering a request to a spooler or reading its answer.
///
/// Circuit-open is part of this family so callers never special-case it.
#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("circuit open for {class} spooler; not attempting {uri}")]
    CircuitOpen { class: &'static str, uri: String },

    #[error("connect to {uri} failed: {detail}")]
    Connect { uri: String, detail: String },

    #[error("timed out after {timeout_ms} ms talking to {uri}")]
    Timeout { uri: String, timeout_ms: u64 },

    #[error("no {class} connection available within {timeout_ms} ms")]
    PoolExhausted { class: &'static str, timeout_ms: u64 },

    #[error("HTTP exchange with {uri} failed: {detail}")]
    Http { uri: String, detail: String },

    #[error("malformed IPP response from {uri}: {source}")]
    Malformed {
        uri: String,
        #[source]
        source: DecodeError,
    },

    #[error("{uri} answered with IPP status 0x{code:04x}")]
    Status { uri: String, code: u16 },

    #[error("transport is shutting down")]
    ShutDown,

    #[error("invalid endpoint '{0}'")]
    InvalidEndpoint(String),

    #[error("document I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ConnectionError {
    /// Whether this failure says something about the health of the peer.
    ///
    /// Status errors mean the spooler answered; circuit-open and shutdown are
    /// produced locally; endpoint and document problems are the caller's.
    pub fn counts_against_peer(&self) -> bool {
        matches!(
            self,
            Self::Connect { .. }
                | Self::Timeout { .. }
                | Self::Http { .. }
                | Self::Malformed { .. }
        )
    }
}

/// Top-level error type for all Pressgang operations.
#[derive(Debug, Error)]
pub enum PressgangError {
    #[error("encoding error: {0}")]
    Encode(#[from] EncodeError),

    #[error("decoding error: {0}")]
    Decode(#[from] DecodeError),

    #[error("connection error: {0}")]
    Connection(#[from] ConnectionError),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, PressgangError>;
