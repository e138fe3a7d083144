// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Highlight annotations rely on viewer-composited transparency, which strict
// Part 1 output forbids. This pass repaints each highlight as an opaque
// diagonal hatch drawn directly into the page content, then drops the
// annotation itself.

use arkiva_core::Result;
use arkiva_document::PdfGraph;
use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Object, ObjectId};
use tracing::{debug, instrument};

/// Distance between hatch lines, in default user-space units.
const HATCH_SPACING: f32 = 2.0;
/// Stroke width of each hatch line.
const HATCH_WIDTH: f32 = 0.6;

/// Replace every highlight annotation with an opaque hatch rendering of its
/// quadrilaterals, in the annotation's own color. Annotations of other
/// subtypes are left in place.
#[instrument(skip(graph))]
pub fn flatten_highlights(graph: &mut PdfGraph) -> Result<()> {
    let page_ids: Vec<ObjectId> = graph.page_ids();
    for page_id in page_ids {
        flatten_page(graph, page_id)?;
    }
    Ok(())
}

fn flatten_page(graph: &mut PdfGraph, page_id: ObjectId) -> Result<()> {
    let annotations = graph.page_annotations(page_id);
    if annotations.is_empty() {
        return Ok(());
    }

    let mut kept: Vec<Object> = Vec::new();
    let mut operations: Vec<Operation> = Vec::new();
    let mut flattened = 0usize;

    for (entry, dict) in annotations {
        if is_highlight(&dict) {
            operations.extend(hatch_operations(&dict));
            flattened += 1;
        } else {
            kept.push(entry);
        }
    }

    if flattened == 0 {
        return Ok(());
    }
    debug!(page = ?page_id, count = flattened, "repainting highlights as hatch fills");

    if !operations.is_empty() {
        let content = Content { operations };
        let encoded = content
            .encode()
            .map_err(|e| arkiva_core::ArkivaError::Pdf(format!("content encode: {e}")))?;
        graph.prepend_page_content(page_id, encoded)?;
    }

    // The page's transparency group serves no purpose once its highlights
    // are opaque strokes.
    if let Ok(page) = graph
        .raw_mut()
        .get_object_mut(page_id)
        .and_then(|obj| obj.as_dict_mut())
        && page.remove(b"Group").is_some()
    {
        debug!(page = ?page_id, "dropped transparency group from repainted page");
    }

    graph.set_page_annotations(page_id, kept)
}

fn is_highlight(dict: &Dictionary) -> bool {
    matches!(dict.get(b"Subtype"), Ok(Object::Name(n)) if n == b"Highlight")
}

/// Build stroke operations hatching every quadrilateral of one annotation.
fn hatch_operations(dict: &Dictionary) -> Vec<Operation> {
    let quads = quad_points(dict);
    if quads.is_empty() {
        return Vec::new();
    }
    let (r, g, b) = annotation_color(dict);

    let mut ops = vec![
        Operation::new("q", vec![]),
        Operation::new(
            "RG",
            vec![Object::Real(r), Object::Real(g), Object::Real(b)],
        ),
        Operation::new("w", vec![Object::Real(HATCH_WIDTH)]),
    ];
    for quad in &quads {
        hatch_box(*quad, &mut ops);
    }
    ops.push(Operation::new("Q", vec![]));
    ops
}

/// Diagonal lines of slope one across the quad's bounding box. Each line is
/// the locus x - y = c; endpoints are clamped to the box edges.
fn hatch_box([x0, y0, x1, y1]: [f32; 4], ops: &mut Vec<Operation>) {
    if x1 <= x0 || y1 <= y0 {
        return;
    }
    let mut c = x0 - y1;
    while c <= x1 - y0 {
        let sx = x0.max(y0 + c);
        let ex = x1.min(y1 + c);
        if ex > sx {
            ops.push(Operation::new(
                "m",
                vec![Object::Real(sx), Object::Real(sx - c)],
            ));
            ops.push(Operation::new(
                "l",
                vec![Object::Real(ex), Object::Real(ex - c)],
            ));
            ops.push(Operation::new("S", vec![]));
        }
        c += HATCH_SPACING;
    }
}

/// Bounding boxes of the annotation's quadrilaterals, one per group of eight
/// numbers in /QuadPoints. Falls back to /Rect if no quads are present.
fn quad_points(dict: &Dictionary) -> Vec<[f32; 4]> {
    let numbers = match dict.get(b"QuadPoints") {
        Ok(Object::Array(items)) => numeric_values(items),
        _ => Vec::new(),
    };
    if numbers.len() >= 8 {
        return numbers
            .chunks_exact(8)
            .map(|q| {
                let xs = [q[0], q[2], q[4], q[6]];
                let ys = [q[1], q[3], q[5], q[7]];
                [min_of(&xs), min_of(&ys), max_of(&xs), max_of(&ys)]
            })
            .collect();
    }
    if let Ok(Object::Array(items)) = dict.get(b"Rect") {
        let rect = numeric_values(items);
        if rect.len() == 4 {
            return vec![[
                rect[0].min(rect[2]),
                rect[1].min(rect[3]),
                rect[0].max(rect[2]),
                rect[1].max(rect[3]),
            ]];
        }
    }
    Vec::new()
}

/// Annotation color, defaulting to a conventional marker yellow.
fn annotation_color(dict: &Dictionary) -> (f32, f32, f32) {
    if let Ok(Object::Array(items)) = dict.get(b"C") {
        let values = numeric_values(items);
        if values.len() == 3 {
            return (values[0], values[1], values[2]);
        }
        if values.len() == 1 {
            return (values[0], values[0], values[0]);
        }
    }
    (1.0, 1.0, 0.0)
}

fn numeric_values(items: &[Object]) -> Vec<f32> {
    items
        .iter()
        .filter_map(|item| match item {
            Object::Real(v) => Some(*v),
            Object::Integer(v) => Some(*v as f32),
            _ => None,
        })
        .collect()
}

fn min_of(values: &[f32; 4]) -> f32 {
    values.iter().copied().fold(f32::INFINITY, f32::min)
}

fn max_of(values: &[f32; 4]) -> f32 {
    values.iter().copied().fold(f32::NEG_INFINITY, f32::max)
}

// -- Tests -------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{add_highlight, one_page_graph};
    use lopdf::dictionary;

    #[test]
    fn highlight_becomes_content_and_annotation_is_removed() {
        let mut graph = one_page_graph();
        add_highlight(&mut graph, [0.0, 1.0, 0.0], [10.0, 20.0, 60.0, 20.0, 10.0, 12.0, 60.0, 12.0]);
        let page_id = graph.page_ids()[0];
        assert_eq!(graph.page_annotations(page_id).len(), 1);

        flatten_highlights(&mut graph).unwrap();

        assert!(graph.page_annotations(page_id).is_empty());
        let page = graph.resolved_dict(&Object::Reference(page_id)).unwrap();
        // Contents became a two-element array with the hatch stream first.
        match page.get(b"Contents") {
            Ok(Object::Array(items)) => assert_eq!(items.len(), 2),
            other => panic!("unexpected Contents: {other:?}"),
        }
    }

    #[test]
    fn other_annotation_subtypes_survive() {
        let mut graph = one_page_graph();
        let page_id = graph.page_ids()[0];
        let link_id = graph.add_object(dictionary! {
            "Type" => "Annot",
            "Subtype" => "Link",
            "Rect" => vec![0.into(), 0.into(), 10.into(), 10.into()],
        });
        graph
            .set_page_annotations(page_id, vec![Object::Reference(link_id)])
            .unwrap();
        add_highlight(&mut graph, [1.0, 1.0, 0.0], [0.0, 10.0, 50.0, 10.0, 0.0, 2.0, 50.0, 2.0]);

        flatten_highlights(&mut graph).unwrap();

        let remaining = graph.page_annotations(page_id);
        assert_eq!(remaining.len(), 1);
        assert!(matches!(
            remaining[0].1.get(b"Subtype"),
            Ok(Object::Name(n)) if n == b"Link"
        ));
    }

    fn set_page_group(graph: &mut PdfGraph, page_id: ObjectId) {
        let group = dictionary! {
            "S" => "Transparency",
            "CS" => "DeviceRGB",
        };
        graph
            .raw_mut()
            .get_object_mut(page_id)
            .and_then(|obj| obj.as_dict_mut())
            .unwrap()
            .set("Group", Object::Dictionary(group));
    }

    #[test]
    fn repainted_page_loses_its_transparency_group() {
        let mut graph = one_page_graph();
        let page_id = graph.page_ids()[0];
        set_page_group(&mut graph, page_id);
        add_highlight(&mut graph, [1.0, 0.0, 0.0], [0.0, 10.0, 50.0, 10.0, 0.0, 2.0, 50.0, 2.0]);

        flatten_highlights(&mut graph).unwrap();

        let page = graph.resolved_dict(&Object::Reference(page_id)).unwrap();
        assert!(!page.has(b"Group"));
    }

    #[test]
    fn page_without_highlights_keeps_its_group() {
        let mut graph = one_page_graph();
        let page_id = graph.page_ids()[0];
        set_page_group(&mut graph, page_id);

        flatten_highlights(&mut graph).unwrap();

        let page = graph.resolved_dict(&Object::Reference(page_id)).unwrap();
        assert!(page.has(b"Group"));
    }

    #[test]
    fn hatch_lines_stay_inside_the_box() {
        let mut ops = Vec::new();
        hatch_box([10.0, 10.0, 30.0, 14.0], &mut ops);
        assert!(!ops.is_empty());
        for op in &ops {
            if op.operator == "m" || op.operator == "l" {
                let x = match op.operands[0] {
                    Object::Real(v) => v,
                    _ => panic!("non-real operand"),
                };
                let y = match op.operands[1] {
                    Object::Real(v) => v,
                    _ => panic!("non-real operand"),
                };
                assert!((10.0..=30.0).contains(&x));
                assert!((10.0..=14.0).contains(&y));
            }
        }
    }

    #[test]
    fn degenerate_quad_produces_no_strokes() {
        let mut ops = Vec::new();
        hatch_box([10.0, 10.0, 10.0, 10.0], &mut ops);
        assert!(ops.is_empty());
    }
}
