// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// The conversion pipeline. Stages run in a fixed order: admit input, repaint
// highlights for strict targets, scan for deficiencies, produce a flattened
// reference rendition through the external converter when needed, merge the
// missing resources, then sanitize the graph and stamp metadata, output
// intent and version.

use arkiva_core::{ArkivaError, ComplianceTarget, PdfaConfig, Result};
use arkiva_document::PdfGraph;
use tempfile::TempDir;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::bridge::FlattenBridge;
use crate::{fonts, highlight, images, intent, metadata, sanitize, scan};

/// Converts PDF bytes into an archival PDF/A rendition.
#[derive(Debug, Clone)]
pub struct PdfaPipeline {
    config: PdfaConfig,
    bridge: FlattenBridge,
}

/// One-shot conversion with default configuration.
pub async fn convert_to_pdfa(input: &[u8], format: &str) -> Result<Vec<u8>> {
    PdfaPipeline::new(PdfaConfig::default()).convert(input, format).await
}

impl PdfaPipeline {
    pub fn new(config: PdfaConfig) -> Self {
        let bridge = FlattenBridge::new(&config);
        Self { config, bridge }
    }

    /// Convert `input` to the PDF/A profile selected by `format`.
    ///
    /// `"pdfa"` targets the relaxed Part 2 profile; any other format
    /// identifier targets strict Part 1. Unreadable input is rejected before
    /// any temporary resources exist.
    #[instrument(skip(self, input), fields(bytes = input.len(), format))]
    pub async fn convert(&self, input: &[u8], format: &str) -> Result<Vec<u8>> {
        if !looks_like_pdf(input) {
            return Err(ArkivaError::Input("missing %PDF- header".into()));
        }
        let mut graph = PdfGraph::from_bytes(input)
            .map_err(|e| ArkivaError::Input(format!("unparseable PDF: {e}")))?;

        let target = ComplianceTarget::from_format(format);
        if target.part.forbids_transparency() {
            highlight::flatten_highlights(&mut graph)?;
        }

        let report = scan::scan(&graph, target);
        info!(
            part = target.part.number(),
            missing_fonts = report.missing_font_names.len(),
            flagged_images = report.needs_image_flattening,
            "deficiency scan complete"
        );

        if report.is_deficient() {
            let scratch = self.scratch_dir()?;
            // The converter sees the graph as it stands, so the rewritten
            // highlight strokes survive into the reference rendition.
            let current = graph.save_to_bytes(false)?;
            let reference = self.reference_rendition(&current, target, &scratch).await?;
            if reference.page_count() == graph.page_count() {
                fonts::merge_missing_fonts(&mut graph, &reference, &report)?;
                if report.needs_image_flattening {
                    images::import_flattened_images(&mut graph, &reference)?;
                }
            } else {
                warn!(
                    original = graph.page_count(),
                    reference = reference.page_count(),
                    "reference rendition page count differs, resource merge skipped"
                );
            }
        } else {
            debug!("document has no deficiencies, converter not invoked");
        }

        sanitize::sanitize(&mut graph, &target)?;
        metadata::write_metadata(&mut graph, &target)?;
        intent::ensure_output_intent(&mut graph)?;
        graph.set_version(target.part.pdf_version());

        // Strict output is kept byte-stable: streams are not recompressed.
        let compress = !target.part.forbids_transparency();
        graph.save_to_bytes(compress)
    }

    /// Run the external converter and load its rendition. Bridge failures
    /// abort the conversion; the scratch directory is removed on every path
    /// when its guard drops.
    async fn reference_rendition(
        &self,
        input: &[u8],
        target: ComplianceTarget,
        scratch: &TempDir,
    ) -> Result<PdfGraph> {
        let input_path = scratch.path().join("original.pdf");
        std::fs::write(&input_path, input)?;
        let outdir = scratch.path().join("converted");
        std::fs::create_dir(&outdir)?;

        let produced = self
            .bridge
            .flatten(&input_path, target.part, &outdir)
            .await
            .map_err(|err| match err {
                ArkivaError::Bridge(msg) => ArkivaError::ConversionFailed(msg),
                ArkivaError::BridgeTimeout(secs) => ArkivaError::ConversionFailed(format!(
                    "external converter timed out after {secs}s"
                )),
                other => other,
            })?;

        PdfGraph::open(&produced)
            .map_err(|e| ArkivaError::ConversionFailed(format!("unreadable rendition: {e}")))
    }

    fn scratch_dir(&self) -> Result<TempDir> {
        let mut builder = tempfile::Builder::new();
        let prefix = format!("arkiva-{}-", Uuid::new_v4());
        builder.prefix(&prefix);
        let scratch = match &self.config.temp_root {
            Some(root) => builder.tempdir_in(root)?,
            None => builder.tempdir()?,
        };
        debug!(path = %scratch.path().display(), "scratch directory created");
        Ok(scratch)
    }
}

fn looks_like_pdf(input: &[u8]) -> bool {
    let window = &input[..input.len().min(1024)];
    window.windows(5).any(|w| w == b"%PDF-")
}

// -- Tests -------------------------------------------------------------------
