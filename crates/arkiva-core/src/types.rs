// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Domain types for PDF/A conversion: the compliance target requested by the
// caller and the deficiency report produced by scanning a document.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// The ISO 19005 part a conversion targets.
///
/// Part 1 (PDF/A-1) is the strict archival profile: no transparency, no
/// blending, every visual flattened. Part 2 (PDF/A-2) relaxes the
/// transparency rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PdfaPart {
    One,
    Two,
}

impl PdfaPart {
    /// Numeric part identifier as written into the XMP identification schema.
    pub fn number(self) -> u8 {
        match self {
            PdfaPart::One => 1,
            PdfaPart::Two => 2,
        }
    }

    /// PDF header version the finalized document must declare.
    pub fn pdf_version(self) -> &'static str {
        match self {
            PdfaPart::One => "1.4",
            PdfaPart::Two => "1.7",
        }
    }

    /// Whether this part forbids transparency constructs outright.
    pub fn forbids_transparency(self) -> bool {
        matches!(self, PdfaPart::One)
    }
}

/// The compliance level a single conversion request aims for.
///
/// Immutable for the lifetime of the request. Level B ("basic", visual
/// reproducibility) is the only conformance Arkiva produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComplianceTarget {
    /// ISO 19005 part.
    pub part: PdfaPart,
}

impl ComplianceTarget {
    /// Conformance level written into the identification schema.
    pub const CONFORMANCE: &'static str = "B";

    pub fn new(part: PdfaPart) -> Self {
        Self { part }
    }

    /// Map a caller-supplied output format identifier to a target.
    ///
    /// `"pdfa"` selects the relaxed Part 2 profile; every other identifier
    /// falls back to strict Part 1.
    pub fn from_format(format: &str) -> Self {
        if format.eq_ignore_ascii_case("pdfa") {
            Self::new(PdfaPart::Two)
        } else {
            Self::new(PdfaPart::One)
        }
    }
}

/// What stands between a document and its compliance target.
///
/// Computed once from the unmutated original graph; an empty report means
/// the expensive external flattening step can be skipped entirely.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeficiencyReport {
    /// Base names of fonts referenced by some page but not embedded.
    pub missing_font_names: BTreeSet<String>,
    /// Part 1 only: some page carries an image that depends on transparency.
    pub needs_image_flattening: bool,
}

impl DeficiencyReport {
    /// True when the external converter has any work to do.
    pub fn is_deficient(&self) -> bool {
        !self.missing_font_names.is_empty() || self.needs_image_flattening
    }
}
