// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// arkiva-core — Shared types and error definitions for the Arkiva PDF/A engine.

pub mod config;
pub mod error;
pub mod types;

pub use config::PdfaConfig;
pub use error::{ArkivaError, Result};
pub use types::*;
