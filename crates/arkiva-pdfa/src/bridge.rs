// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Bridge to the external office converter. The converter re-renders the
// input with every font embedded and all transparency flattened; the pipeline
// then mines that rendition for replacement resources. One converter process
// per slot: office suites serialize on their profile directory, so slots are
// bounded per tool identity across the whole process.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, OnceLock};
use std::time::Duration;

use arkiva_core::{ArkivaError, PdfaConfig, PdfaPart, Result};
use tokio::process::Command;
use tokio::sync::Semaphore;
use tracing::{debug, info, instrument, warn};

static SLOT_REGISTRY: OnceLock<Mutex<HashMap<String, Arc<Semaphore>>>> = OnceLock::new();

/// Per-tool admission semaphore, shared by every bridge instance that names
/// the same converter executable.
fn conversion_slots(tool: &str, max_concurrent: usize) -> Arc<Semaphore> {
    let registry = SLOT_REGISTRY.get_or_init(|| Mutex::new(HashMap::new()));
    let mut map = registry.lock().unwrap_or_else(|e| e.into_inner());
    map.entry(tool.to_string())
        .or_insert_with(|| Arc::new(Semaphore::new(max_concurrent.max(1))))
        .clone()
}

/// The `--convert-to` filter string selecting PDF/A output of the given part.
fn pdf_export_filter(part: PdfaPart) -> String {
    format!(
        r#"pdf:writer_pdf_Export:{{"SelectPdfVersion":{{"type":"long","value":"{}"}}}}"#,
        part.number()
    )
}

/// Handle on the external converter, configured once per pipeline.
#[derive(Debug, Clone)]
pub struct FlattenBridge {
    tool: String,
    convert_timeout: Duration,
    admission_wait: Duration,
    max_concurrent: usize,
}

impl FlattenBridge {
    pub fn new(config: &PdfaConfig) -> Self {
        Self {
            tool: config.converter_tool.clone(),
            convert_timeout: Duration::from_secs(config.convert_timeout_secs),
            admission_wait: Duration::from_secs(config.admission_wait_secs),
            max_concurrent: config.max_concurrent_conversions,
        }
    }

    /// Convert `input` to a flattened PDF/A rendition inside `outdir`,
    /// returning the path of the produced file.
    ///
    /// Admission waits at most the configured period for a converter slot
    /// and fails with `BridgeBusy` if none frees up; the conversion itself is
    /// bounded by the configured timeout and the child process is killed on
    /// expiry.
    #[instrument(skip(self), fields(tool = %self.tool))]
    pub async fn flatten(&self, input: &Path, part: PdfaPart, outdir: &Path) -> Result<PathBuf> {
        let slots = conversion_slots(&self.tool, self.max_concurrent);
        let _permit = tokio::time::timeout(self.admission_wait, slots.acquire_owned())
            .await
            .map_err(|_| ArkivaError::BridgeBusy)?
            .map_err(|_| ArkivaError::Bridge("converter slot pool is closed".into()))?;

        info!(input = %input.display(), part = part.number(), "invoking external converter");
        let mut command = Command::new(&self.tool);
        command
            .arg("--headless")
            .arg("--convert-to")
            .arg(pdf_export_filter(part))
            .arg("--outdir")
            .arg(outdir)
            .arg(input)
            .kill_on_drop(true);

        let output = tokio::time::timeout(self.convert_timeout, command.output())
            .await
            .map_err(|_| ArkivaError::BridgeTimeout(self.convert_timeout.as_secs()))?
            .map_err(|e| ArkivaError::Bridge(format!("cannot run {}: {e}", self.tool)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ArkivaError::Bridge(format!(
                "{} exited with {}: {}",
                self.tool,
                output
                    .status
                    .code()
                    .map_or_else(|| "signal".to_string(), |c| c.to_string()),
                stderr.trim()
            )));
        }

        self.single_output_file(outdir)
    }

    /// The converter names its output after the input; rather than guessing
    /// the name we require the scratch directory to hold exactly one file.
    fn single_output_file(&self, outdir: &Path) -> Result<PathBuf> {
        let mut produced: Vec<PathBuf> = std::fs::read_dir(outdir)?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.is_file())
            .collect();

        match produced.len() {
            1 => {
                let path = produced.remove(0);
                debug!(output = %path.display(), "converter produced rendition");
                Ok(path)
            }
            0 => Err(ArkivaError::Bridge(format!(
                "{} reported success but produced no output",
                self.tool
            ))),
            n => {
                warn!(count = n, "converter produced multiple files");
                Err(ArkivaError::Bridge(format!(
                    "{} produced {n} files, expected one",
                    self.tool
                )))
            }
        }
    }
}

// -- Tests -------------------------------------------------------------------
