// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for Arkiva.

use thiserror::Error;

/// Top-level error type for all Arkiva operations.
///
/// Only a handful of situations are fatal for a conversion: unreadable
/// input, a failed external-converter run, and plain I/O trouble. Everything
/// else (a single font that cannot be embedded, an unparseable XMP packet, a
/// broken ICC asset) is logged and the pipeline carries on.
#[derive(Debug, Error)]
pub enum ArkivaError {
    // -- Input --
    #[error("unreadable or non-PDF input: {0}")]
    Input(String),

    // -- External converter bridge --
    #[error("external converter failed: {0}")]
    Bridge(String),

    #[error("external converter timed out after {0} seconds")]
    BridgeTimeout(u64),

    #[error("too many concurrent conversions, no converter slot became free")]
    BridgeBusy,

    // -- Pipeline --
    #[error("PDF/A conversion failed: {0}")]
    ConversionFailed(String),

    #[error("PDF operation failed: {0}")]
    Pdf(String),

    // -- Storage / persistence --
    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, ArkivaError>;
