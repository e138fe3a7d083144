// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Deficiency scanner — reports what stands between a document and its
// compliance target. Pure read-only pass, O(pages × resources).

use arkiva_core::{ComplianceTarget, DeficiencyReport};
use arkiva_document::PdfGraph;
use lopdf::{Dictionary, Object, ObjectId};
use tracing::{debug, instrument};

/// Scan the unmutated document for compliance deficiencies.
///
/// A font counts as missing when its descriptor declares no font program.
/// For Part 1 targets, any page image that depends on transparency (soft
/// mask, transparency group, or interpolation) flags the document for
/// external flattening.
#[instrument(skip_all, fields(part = target.part.number()))]
pub fn scan(graph: &PdfGraph, target: ComplianceTarget) -> DeficiencyReport {
    let mut report = DeficiencyReport::default();

    for page_id in graph.page_ids() {
        for (name, entry) in graph.resource_entries(page_id, b"Font") {
            let Some(font) = graph.resolved_dict(&entry) else {
                continue;
            };
            if !font_is_embedded(graph, &font) {
                report
                    .missing_font_names
                    .insert(font_base_name(&font).unwrap_or(name));
            }
        }

        if target.part.forbids_transparency()
            && !report.needs_image_flattening
            && !flagged_image_names(graph, page_id).is_empty()
        {
            report.needs_image_flattening = true;
        }
    }

    debug!(
        missing_fonts = report.missing_font_names.len(),
        needs_image_flattening = report.needs_image_flattening,
        "deficiency scan complete"
    );
    report
}

/// Names of image XObjects on a page that depend on transparency.
///
/// Shared with the image importer, which re-derives the flagged set from the
/// original graph rather than trusting an earlier report.
pub fn flagged_image_names(graph: &PdfGraph, page_id: ObjectId) -> Vec<String> {
    graph
        .resource_entries(page_id, b"XObject")
        .into_iter()
        .filter_map(|(name, entry)| {
            let dict = graph.resolved_dict(&entry)?;
            (is_image(&dict) && image_depends_on_transparency(&dict)).then_some(name)
        })
        .collect()
}

/// Whether a font resource carries an embedded font program.
///
/// Type3 fonts define their glyphs as content streams and have nothing to
/// embed. Composite fonts keep their descriptor on the descendant CID font.
pub(crate) fn font_is_embedded(graph: &PdfGraph, font: &Dictionary) -> bool {
    if matches!(font.get(b"Subtype"), Ok(Object::Name(n)) if n == b"Type3") {
        return true;
    }
    match font_descriptor(graph, font) {
        Some(descriptor) => {
            descriptor.has(b"FontFile")
                || descriptor.has(b"FontFile2")
                || descriptor.has(b"FontFile3")
        }
        None => false,
    }
}

/// The effective font descriptor, following the descendant chain of
/// composite (Type0) fonts.
pub(crate) fn font_descriptor(graph: &PdfGraph, font: &Dictionary) -> Option<Dictionary> {
    if let Ok(descriptor) = font.get(b"FontDescriptor") {
        return graph.resolved_dict(descriptor);
    }
    if let Ok(descendants) = font.get(b"DescendantFonts")
        && let Object::Array(items) = graph.resolve(descendants)
        && let Some(first) = items.first()
        && let Some(descendant) = graph.resolved_dict(first)
        && let Ok(descriptor) = descendant.get(b"FontDescriptor")
    {
        return graph.resolved_dict(descriptor);
    }
    None
}

/// Base font name with any subset tag stripped, for keying across the
/// original and the reference document.
pub(crate) fn font_base_name(font: &Dictionary) -> Option<String> {
    match font.get(b"BaseFont") {
        Ok(Object::Name(name)) => Some(strip_subset_tag(&String::from_utf8_lossy(name))),
        _ => None,
    }
}

/// Subset fonts carry a "ABCDEF+" prefix of six uppercase letters.
fn strip_subset_tag(name: &str) -> String {
    let bytes = name.as_bytes();
    if bytes.len() > 7 && bytes[6] == b'+' && bytes[..6].iter().all(|b| b.is_ascii_uppercase()) {
        name[7..].to_string()
    } else {
        name.to_string()
    }
}

fn is_image(dict: &Dictionary) -> bool {
    matches!(dict.get(b"Subtype"), Ok(Object::Name(n)) if n == b"Image")
}

fn image_depends_on_transparency(dict: &Dictionary) -> bool {
    let soft_mask = match dict.get(b"SMask") {
        Ok(Object::Name(n)) if n == b"None" => false,
        Ok(Object::Null) | Err(_) => false,
        Ok(_) => true,
    };
    let grouped = dict.has(b"Group");
    let interpolated = matches!(dict.get(b"Interpolate"), Ok(Object::Boolean(true)));
    soft_mask || grouped || interpolated
}
