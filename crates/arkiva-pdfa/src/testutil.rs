// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Synthetic document fixtures shared by the pipeline's unit tests.

use arkiva_core::{ComplianceTarget, PdfaPart};
use arkiva_document::PdfGraph;
use lopdf::{Dictionary, Document, Object, Stream, dictionary};

pub(crate) fn part1() -> ComplianceTarget {
    ComplianceTarget::new(PdfaPart::One)
}

pub(crate) fn part2() -> ComplianceTarget {
    ComplianceTarget::new(PdfaPart::Two)
}

/// Minimal well-formed document: one US-Letter page with a trivial content
/// stream, no resources, no annotations.
pub(crate) fn one_page_graph() -> PdfGraph {
    n_page_graph(1)
}

pub(crate) fn n_page_graph(pages: usize) -> PdfGraph {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let mut kids: Vec<Object> = Vec::new();
    for _ in 0..pages {
        let content_id = doc.add_object(Stream::new(Dictionary::new(), b"q Q".to_vec()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
            "Contents" => content_id,
        });
        kids.push(page_id.into());
    }

    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => pages as i64,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut buf = Vec::new();
    doc.save_to(&mut buf).expect("failed to save fixture PDF");
    PdfGraph::from_bytes(&buf).expect("failed to reload fixture PDF")
}

/// Attach a simple (non-embedded) TrueType font under `key`.
pub(crate) fn add_unembedded_font(graph: &mut PdfGraph, key: &str, base_name: &str) {
    let page_id = graph.page_ids()[0];
    let font_id = graph.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "TrueType",
        "BaseFont" => Object::Name(base_name.as_bytes().to_vec()),
    });
    graph
        .set_page_resource(page_id, b"Font", key, Object::Reference(font_id))
        .expect("failed to attach font resource");
}

/// Attach a TrueType font with an embedded (dummy) font program under `key`.
pub(crate) fn add_embedded_font(graph: &mut PdfGraph, key: &str, base_name: &str) {
    let page_id = graph.page_ids()[0];
    let program_id = graph.add_object(Stream::new(
        Dictionary::new(),
        vec![0x00, 0x01, 0x00, 0x00, 0xde, 0xad, 0xbe, 0xef],
    ));
    let descriptor_id = graph.add_object(dictionary! {
        "Type" => "FontDescriptor",
        "FontName" => Object::Name(base_name.as_bytes().to_vec()),
        "FontFile2" => program_id,
    });
    let font_id = graph.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "TrueType",
        "BaseFont" => Object::Name(base_name.as_bytes().to_vec()),
        "FontDescriptor" => descriptor_id,
    });
    graph
        .set_page_resource(page_id, b"Font", key, Object::Reference(font_id))
        .expect("failed to attach font resource");
}

/// Attach a 2x2 DeviceRGB image XObject under `key`, optionally carrying a
/// soft mask and/or an interpolation flag.
pub(crate) fn add_image(graph: &mut PdfGraph, key: &str, with_soft_mask: bool, interpolate: bool) {
    let page_id = graph.page_ids()[0];

    let mut dict = dictionary! {
        "Type" => "XObject",
        "Subtype" => "Image",
        "Width" => 2i64,
        "Height" => 2i64,
        "ColorSpace" => Object::Name(b"DeviceRGB".to_vec()),
        "BitsPerComponent" => 8i64,
    };
    if with_soft_mask {
        let mask_id = graph.add_object(Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => 2i64,
                "Height" => 2i64,
                "ColorSpace" => Object::Name(b"DeviceGray".to_vec()),
                "BitsPerComponent" => 8i64,
            },
            vec![0xff, 0x80, 0x40, 0x00],
        ));
        dict.set("SMask", Object::Reference(mask_id));
    }
    if interpolate {
        dict.set("Interpolate", Object::Boolean(true));
    }

    // 2x2 RGB samples: red, green, blue, white.
    let pixels = vec![
        0xff, 0x00, 0x00, 0x00, 0xff, 0x00, 0x00, 0x00, 0xff, 0xff, 0xff, 0xff,
    ];
    let image_id = graph.add_object(Stream::new(dict, pixels));
    graph
        .set_page_resource(page_id, b"XObject", key, Object::Reference(image_id))
        .expect("failed to attach image resource");
}

/// Add a highlight annotation with one quadrilateral and the given RGB color.
pub(crate) fn add_highlight(graph: &mut PdfGraph, color: [f32; 3], quad: [f32; 8]) {
    let page_id = graph.page_ids()[0];
    let annot_id = graph.add_object(dictionary! {
        "Type" => "Annot",
        "Subtype" => "Highlight",
        "Rect" => vec![
            Object::Real(quad[4]),
            Object::Real(quad[5]),
            Object::Real(quad[2]),
            Object::Real(quad[3]),
        ],
        "C" => color.iter().map(|c| Object::Real(*c)).collect::<Vec<_>>(),
        "QuadPoints" => quad.iter().map(|q| Object::Real(*q)).collect::<Vec<_>>(),
    });

    let mut entries: Vec<Object> = graph
        .page_annotations(page_id)
        .into_iter()
        .map(|(entry, _)| entry)
        .collect();
    entries.push(Object::Reference(annot_id));
    graph
        .set_page_annotations(page_id, entries)
        .expect("failed to attach annotation");
}
