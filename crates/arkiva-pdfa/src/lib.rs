// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// arkiva-pdfa — The PDF/A compliance conversion pipeline.
//
// Turns an arbitrary PDF into an ISO 19005 level-B archival document in one
// synchronous pass: highlight rewriting (Part 1), deficiency scanning, an
// external flatten/embed bridge when needed, asset merging from the bridge's
// reference output, recursive graph sanitization, archival metadata
// synthesis, and color output-intent attachment.

pub mod bridge;
pub mod fonts;
pub mod highlight;
pub mod images;
pub mod intent;
pub mod metadata;
pub mod pipeline;
pub mod sanitize;
pub mod scan;

#[cfg(test)]
pub(crate) mod testutil;

pub use pipeline::{PdfaPipeline, convert_to_pdfa};
pub use scan::scan;
