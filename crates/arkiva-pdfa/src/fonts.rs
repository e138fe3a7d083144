// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Font repair. The external converter produces a reference rendition with
// every font embedded; this pass copies the embedded font subtrees for the
// fonts the original document only names, page by page.

use std::collections::HashMap;

use arkiva_core::{DeficiencyReport, Result};
use arkiva_document::{PdfGraph, import_object};
use lopdf::{Dictionary, Object, ObjectId};
use tracing::{debug, instrument, warn};

use crate::scan::{font_base_name, font_descriptor, font_is_embedded};

type ProgramStrategy = fn(&PdfGraph, &Dictionary) -> Option<ObjectId>;

/// Ordered extraction strategies for locating an embedded font program.
/// Composite (Type0) fonts carry their program on the descendant font and are
/// tried first; plain TrueType next; finally any descriptor stream at all.
/// The first strategy that yields a non-empty program wins.
const FONT_PROGRAM_STRATEGIES: &[(&str, ProgramStrategy)] = &[
    ("composite", composite_program),
    ("truetype", truetype_program),
    ("any", any_font_file),
];

/// Copy embedded fonts from `reference` into `original` for every font the
/// deficiency report lists as unembedded. Pages are paired positionally.
/// Returns the number of fonts replaced.
#[instrument(skip_all)]
pub fn merge_missing_fonts(
    original: &mut PdfGraph,
    reference: &PdfGraph,
    report: &DeficiencyReport,
) -> Result<usize> {
    if report.missing_font_names.is_empty() {
        return Ok(0);
    }

    let original_pages = original.page_ids();
    let reference_pages = reference.page_ids();
    let mut memo: HashMap<ObjectId, ObjectId> = HashMap::new();
    let mut merged = 0usize;

    for (&page_id, &ref_page_id) in original_pages.iter().zip(reference_pages.iter()) {
        merged += merge_page(original, reference, report, page_id, ref_page_id, &mut memo)?;
    }

    debug!(merged, "font merge complete");
    Ok(merged)
}

fn merge_page(
    original: &mut PdfGraph,
    reference: &PdfGraph,
    report: &DeficiencyReport,
    page_id: ObjectId,
    ref_page_id: ObjectId,
    memo: &mut HashMap<ObjectId, ObjectId>,
) -> Result<usize> {
    let reference_fonts: Vec<(String, Dictionary, ObjectId)> = reference
        .resource_entries(ref_page_id, b"Font")
        .into_iter()
        .filter_map(|(key, entry)| {
            let dict = reference.resolved_dict(&entry)?;
            let Object::Reference(id) = entry else {
                return None;
            };
            Some((key, dict, id))
        })
        .collect();

    let mut merged = 0usize;
    for (key, entry) in original.resource_entries(page_id, b"Font") {
        let Some(font) = original.resolved_dict(&entry) else {
            continue;
        };
        if font_is_embedded(original, &font) {
            continue;
        }
        let Some(name) = font_base_name(&font) else {
            continue;
        };
        if !report.missing_font_names.contains(&name) {
            continue;
        }

        match find_replacement(reference, &reference_fonts, &name) {
            Some(source_id) => {
                let new_id =
                    import_object(reference.raw(), original.raw_mut(), source_id, memo)?;
                original.set_page_resource(
                    page_id,
                    b"Font",
                    &key,
                    Object::Reference(new_id),
                )?;
                debug!(font = %name, %key, "embedded font merged from reference rendition");
                merged += 1;
            }
            None => {
                warn!(font = %name, "reference rendition has no embedded replacement");
            }
        }
    }
    Ok(merged)
}

/// Pick the reference font to substitute for an unembedded font named `name`.
///
/// A font with the same subset-stripped base name is preferred; if the
/// converter substituted the face the name will differ, so any embedded font
/// is accepted as a fallback. Either way the candidate must yield an actual
/// font program through one of the extraction strategies.
fn find_replacement(
    reference: &PdfGraph,
    candidates: &[(String, Dictionary, ObjectId)],
    name: &str,
) -> Option<ObjectId> {
    for require_name_match in [true, false] {
        for (strategy_name, strategy) in FONT_PROGRAM_STRATEGIES {
            for (_, dict, id) in candidates {
                if require_name_match && font_base_name(dict).as_deref() != Some(name) {
                    continue;
                }
                if let Some(program_id) = strategy(reference, dict)
                    && program_is_plausible(reference, program_id)
                {
                    debug!(font = %name, strategy = strategy_name, "replacement found");
                    return Some(*id);
                }
            }
        }
    }
    None
}

fn program_is_plausible(graph: &PdfGraph, program_id: ObjectId) -> bool {
    match graph.raw().get_object(program_id) {
        Ok(Object::Stream(stream)) => !stream.content.is_empty(),
        _ => false,
    }
}

// -- Extraction strategies ---------------------------------------------------

fn composite_program(graph: &PdfGraph, font: &Dictionary) -> Option<ObjectId> {
    if !matches!(font.get(b"Subtype"), Ok(Object::Name(n)) if n == b"Type0") {
        return None;
    }
    let descriptor = font_descriptor(graph, font)?;
    descriptor_program(&descriptor)
}

fn truetype_program(graph: &PdfGraph, font: &Dictionary) -> Option<ObjectId> {
    if !matches!(font.get(b"Subtype"), Ok(Object::Name(n)) if n == b"TrueType") {
        return None;
    }
    let descriptor = font_descriptor(graph, font)?;
    match descriptor.get(b"FontFile2") {
        Ok(Object::Reference(id)) => Some(*id),
        _ => None,
    }
}

fn any_font_file(graph: &PdfGraph, font: &Dictionary) -> Option<ObjectId> {
    let descriptor = font_descriptor(graph, font)?;
    descriptor_program(&descriptor)
}

fn descriptor_program(descriptor: &Dictionary) -> Option<ObjectId> {
    for key in [b"FontFile2".as_slice(), b"FontFile3", b"FontFile"] {
        if let Ok(Object::Reference(id)) = descriptor.get(key) {
            return Some(*id);
        }
    }
    None
}

// -- Tests -------------------------------------------------------------------
