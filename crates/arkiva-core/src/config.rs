// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Pipeline configuration.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Settings for the PDF/A conversion pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PdfaConfig {
    /// Executable invoked for font embedding and transparency flattening.
    pub converter_tool: String,
    /// Hard wall-clock limit for one converter invocation, in seconds.
    pub convert_timeout_secs: u64,
    /// Process-wide cap on concurrent converter invocations per tool.
    pub max_concurrent_conversions: usize,
    /// How long a request waits for a free converter slot, in seconds.
    pub admission_wait_secs: u64,
    /// Override for the temp-directory root (system default when `None`).
    pub temp_root: Option<PathBuf>,
}

impl Default for PdfaConfig {
    fn default() -> Self {
        Self {
            converter_tool: "soffice".into(),
            convert_timeout_secs: 180,
            max_concurrent_conversions: 4,
            admission_wait_secs: 120,
            temp_root: None,
        }
    }
}
