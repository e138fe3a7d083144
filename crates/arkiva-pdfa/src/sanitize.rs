// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Archival profiles forbid dynamic and external-dependency constructs:
// scripting, multimedia, launch/remote actions, embedded file attachments.
// Strict Part 1 additionally forbids every transparency device. This pass
// walks the whole object graph and strips all of them in place.

use arkiva_core::{ComplianceTarget, Result};
use arkiva_document::PdfGraph;
use lopdf::{Dictionary, Object, ObjectId};
use std::collections::HashSet;
use tracing::{debug, instrument, warn};

/// Dictionary keys that must not survive in any archival profile.
const FORBIDDEN_KEYS: &[&[u8]] = &[
    b"JavaScript",
    b"JS",
    b"RichMedia",
    b"Movie",
    b"Sound",
    b"Launch",
    b"URI",
    b"GoToR",
    b"EmbeddedFiles",
    b"FileSpec",
    b"AA",
];

/// Action subtypes (/S values) whose whole dictionary becomes meaningless
/// once its payload keys are gone; such dictionaries are emptied entirely so
/// no half-stripped action survives behind a still-live reference.
const FORBIDDEN_ACTIONS: &[&[u8]] = &[
    b"JavaScript",
    b"Launch",
    b"URI",
    b"GoToR",
    b"Movie",
    b"Sound",
    b"RichMediaExecute",
];

/// Keys the strict Part 1 profile additionally removes: transparency groups,
/// soft masks and constant-alpha settings.
const PART1_FORBIDDEN_KEYS: &[&[u8]] = &[b"Group", b"CA", b"ca"];

/// Guard against pathological direct (non-reference) dictionary nesting.
const MAX_DEPTH: usize = 64;

/// Strip every forbidden construct from the document graph.
///
/// The traversal covers all indirect objects including stream dictionaries,
/// so constructs reachable only through the catalog's name trees or through
/// annotation actions are caught as well.
#[instrument(skip(graph, target), fields(part = target.part.number()))]
pub fn sanitize(graph: &mut PdfGraph, target: &ComplianceTarget) -> Result<()> {
    let ids: Vec<ObjectId> = graph.raw().objects.keys().copied().collect();
    let mut visited: HashSet<ObjectId> = HashSet::new();
    let mut removed = 0usize;

    for id in ids {
        if !visited.insert(id) {
            continue;
        }
        if let Some(object) = graph.raw_mut().objects.get_mut(&id) {
            sanitize_object(object, target, 0, &mut removed);
        }
    }

    strip_script_open_action(graph)?;
    normalize_annotation_flags(graph, target)?;
    debug!(removed, "graph sanitization complete");
    Ok(())
}

/// Drop the catalog's /OpenAction when it names a forbidden action type.
/// Plain destinations (arrays) stay: jumping to a page on open is allowed.
fn strip_script_open_action(graph: &mut PdfGraph) -> Result<()> {
    let catalog_id = graph.catalog_id()?;
    let forbidden = match graph
        .resolved_dict(&Object::Reference(catalog_id))
        .and_then(|catalog| catalog.get(b"OpenAction").ok().cloned())
    {
        // The action dictionary itself was emptied by the walk above, so the
        // entry is judged by what is left of it.
        Some(action) => graph
            .resolved_dict(&action)
            .is_some_and(|dict| dict.is_empty() || is_forbidden_action(&dict)),
        None => false,
    };
    if forbidden
        && let Some(Object::Dictionary(catalog)) = graph.raw_mut().objects.get_mut(&catalog_id)
    {
        catalog.remove(b"OpenAction");
    }
    Ok(())
}

fn sanitize_object(object: &mut Object, target: &ComplianceTarget, depth: usize, removed: &mut usize) {
    if depth > MAX_DEPTH {
        warn!("dictionary nesting exceeds depth guard, subtree left untouched");
        return;
    }
    match object {
        Object::Dictionary(dict) => sanitize_dict(dict, target, depth, removed),
        Object::Stream(stream) => sanitize_dict(&mut stream.dict, target, depth, removed),
        Object::Array(items) => {
            for item in items {
                sanitize_object(item, target, depth + 1, removed);
            }
        }
        _ => {}
    }
}

fn sanitize_dict(dict: &mut Dictionary, target: &ComplianceTarget, depth: usize, removed: &mut usize) {
    if is_forbidden_action(dict) {
        *removed += dict.len();
        *dict = Dictionary::new();
        return;
    }

    for key in FORBIDDEN_KEYS {
        if dict.remove(key).is_some() {
            *removed += 1;
        }
    }

    if target.part.forbids_transparency() {
        for key in PART1_FORBIDDEN_KEYS {
            if dict.remove(key).is_some() {
                *removed += 1;
            }
        }
        // A soft mask may legitimately be the name None; anything else goes.
        match dict.get(b"SMask") {
            Ok(Object::Name(n)) if n == b"None" => {}
            Ok(_) => {
                dict.remove(b"SMask");
                *removed += 1;
            }
            Err(_) => {}
        }
        if dict.has(b"Interpolate") {
            dict.set("Interpolate", Object::Boolean(false));
        }
    }

    // Recurse into directly nested values. Referenced objects are visited as
    // top-level entries of the object table.
    let keys: Vec<Vec<u8>> = dict.iter().map(|(k, _)| k.to_vec()).collect();
    for key in keys {
        if let Ok(value) = dict.get_mut(&key) {
            sanitize_object(value, target, depth + 1, removed);
        }
    }
}

fn is_forbidden_action(dict: &Dictionary) -> bool {
    matches!(
        dict.get(b"S"),
        Ok(Object::Name(n)) if FORBIDDEN_ACTIONS.iter().any(|a| *a == n.as_slice())
    )
}

/// Strict output requires annotations to print and never hide: set the Print
/// flag, clear Invisible and Hidden.
fn normalize_annotation_flags(graph: &mut PdfGraph, target: &ComplianceTarget) -> Result<()> {
    if !target.part.forbids_transparency() {
        return Ok(());
    }
    for page_id in graph.page_ids() {
        let annotations = graph.page_annotations(page_id);
        for (entry, dict) in annotations {
            let flags = match dict.get(b"F") {
                Ok(Object::Integer(f)) => *f,
                _ => 0,
            };
            let normalized = (flags | 4) & !3;
            if normalized == flags {
                continue;
            }
            if let Object::Reference(annot_id) = entry
                && let Some(Object::Dictionary(target_dict)) =
                    graph.raw_mut().objects.get_mut(&annot_id)
            {
                target_dict.set("F", Object::Integer(normalized));
            }
        }
    }
    Ok(())
}

// -- Tests -------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{add_image, one_page_graph, part1, part2};
    use lopdf::dictionary;

    #[test]
    fn forbidden_catalog_keys_are_removed() {
        let mut graph = one_page_graph();
        let catalog_id = graph.catalog_id().unwrap();
        if let Some(Object::Dictionary(catalog)) = graph.raw_mut().objects.get_mut(&catalog_id) {
            catalog.set(
                "Names",
                Object::Dictionary(dictionary! {
                    "EmbeddedFiles" => Object::Dictionary(dictionary! {}),
                }),
            );
        }

        sanitize(&mut graph, &part2()).unwrap();

        let catalog = graph
            .resolved_dict(&Object::Reference(catalog_id))
            .unwrap();
        match catalog.get(b"Names") {
            Ok(Object::Dictionary(names)) => assert!(!names.has(b"EmbeddedFiles")),
            other => panic!("unexpected Names entry: {other:?}"),
        }
    }

    #[test]
    fn script_open_action_and_additional_actions_are_dropped() {
        let mut graph = one_page_graph();
        let action_id = graph.add_object(dictionary! {
            "S" => Object::Name(b"JavaScript".to_vec()),
            "JS" => "this.print()",
        });
        let catalog_id = graph.catalog_id().unwrap();
        if let Some(Object::Dictionary(catalog)) = graph.raw_mut().objects.get_mut(&catalog_id) {
            catalog.set("OpenAction", Object::Reference(action_id));
            catalog.set(
                "AA",
                Object::Dictionary(dictionary! { "WC" => Object::Reference(action_id) }),
            );
        }

        sanitize(&mut graph, &part2()).unwrap();

        let catalog = graph
            .resolved_dict(&Object::Reference(catalog_id))
            .unwrap();
        assert!(!catalog.has(b"OpenAction"));
        assert!(!catalog.has(b"AA"));
    }

    #[test]
    fn destination_open_action_survives() {
        let mut graph = one_page_graph();
        let page_id = graph.page_ids()[0];
        let catalog_id = graph.catalog_id().unwrap();
        if let Some(Object::Dictionary(catalog)) = graph.raw_mut().objects.get_mut(&catalog_id) {
            catalog.set(
                "OpenAction",
                Object::Array(vec![page_id.into(), Object::Name(b"Fit".to_vec())]),
            );
        }

        sanitize(&mut graph, &part1()).unwrap();

        let catalog = graph
            .resolved_dict(&Object::Reference(catalog_id))
            .unwrap();
        assert!(catalog.has(b"OpenAction"));
    }

    #[test]
    fn javascript_action_dictionary_is_emptied() {
        let mut graph = one_page_graph();
        let action_id = graph.add_object(dictionary! {
            "S" => Object::Name(b"JavaScript".to_vec()),
            "Next" => Object::String(b"app.alert('x')".to_vec(), lopdf::StringFormat::Literal),
        });

        sanitize(&mut graph, &part2()).unwrap();

        match graph.raw().objects.get(&action_id) {
            Some(Object::Dictionary(dict)) => assert_eq!(dict.len(), 0),
            other => panic!("unexpected action object: {other:?}"),
        }
    }

    #[test]
    fn part1_strips_soft_masks_and_disables_interpolation() {
        let mut graph = one_page_graph();
        add_image(&mut graph, "Im1", true, true);

        sanitize(&mut graph, &part1()).unwrap();

        let page_id = graph.page_ids()[0];
        let entries = graph.resource_entries(page_id, b"XObject");
        let (_, image) = &entries[0];
        let Object::Reference(image_id) = image else {
            panic!("image entry is not a reference");
        };
        let Some(Object::Stream(stream)) = graph.raw().objects.get(image_id) else {
            panic!("image object is not a stream");
        };
        assert!(!stream.dict.has(b"SMask"));
        assert!(matches!(
            stream.dict.get(b"Interpolate"),
            Ok(Object::Boolean(false))
        ));
    }

    #[test]
    fn part2_keeps_soft_masks() {
        let mut graph = one_page_graph();
        add_image(&mut graph, "Im1", true, false);

        sanitize(&mut graph, &part2()).unwrap();

        let page_id = graph.page_ids()[0];
        let entries = graph.resource_entries(page_id, b"XObject");
        let Object::Reference(image_id) = &entries[0].1 else {
            panic!("image entry is not a reference");
        };
        let Some(Object::Stream(stream)) = graph.raw().objects.get(image_id) else {
            panic!("image object is not a stream");
        };
        assert!(stream.dict.has(b"SMask"));
    }

    #[test]
    fn part1_forces_annotations_to_print() {
        let mut graph = one_page_graph();
        let page_id = graph.page_ids()[0];
        let annot_id = graph.add_object(dictionary! {
            "Type" => "Annot",
            "Subtype" => "Square",
            "Rect" => vec![0.into(), 0.into(), 5.into(), 5.into()],
            "F" => 2i64, // hidden
        });
        graph
            .set_page_annotations(page_id, vec![Object::Reference(annot_id)])
            .unwrap();

        sanitize(&mut graph, &part1()).unwrap();

        let annotations = graph.page_annotations(page_id);
        assert!(matches!(
            annotations[0].1.get(b"F"),
            Ok(Object::Integer(4))
        ));
    }

    #[test]
    fn cycles_terminate() {
        let mut graph = one_page_graph();
        let a = graph.raw_mut().new_object_id();
        let b = graph.add_object(dictionary! { "Prev" => a });
        graph.raw_mut().objects.insert(
            a,
            Object::Dictionary(dictionary! { "Next" => b, "JS" => "void" }),
        );

        sanitize(&mut graph, &part2()).unwrap();

        let Some(Object::Dictionary(dict)) = graph.raw().objects.get(&a) else {
            panic!("cycle node vanished");
        };
        assert!(!dict.has(b"JS"));
    }
}
