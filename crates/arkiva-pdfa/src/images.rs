// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Image repair for strict output. Images that depend on viewer-side
// transparency compositing are replaced with the converter's flattened
// rendition, decoded to plain RGB samples and re-embedded as FlateDecode
// streams with no soft mask.

use std::collections::HashMap;
use std::io::Write;

use arkiva_core::{ArkivaError, Result};
use arkiva_document::PdfGraph;
use flate2::Compression;
use flate2::write::ZlibEncoder;
use lopdf::{Dictionary, Object, ObjectId, Stream, dictionary};
use tracing::{debug, instrument, warn};

use crate::scan::flagged_image_names;

/// Replace transparency-dependent images on each page of `original` with the
/// flattened image the corresponding `reference` page holds under the same
/// resource key. Pages are paired by index. Returns the number of images
/// replaced.
#[instrument(skip_all)]
pub fn import_flattened_images(original: &mut PdfGraph, reference: &PdfGraph) -> Result<usize> {
    let original_pages = original.page_ids();
    let reference_pages = reference.page_ids();
    let mut replaced = 0usize;

    for (&page_id, &ref_page_id) in original_pages.iter().zip(reference_pages.iter()) {
        let flagged = flagged_image_names(original, page_id);
        if flagged.is_empty() {
            continue;
        }
        let candidates = page_images(reference, ref_page_id);

        for name in &flagged {
            let Some(candidate) = candidates.get(name.as_str()) else {
                warn!(image = %name, "reference rendition has no image at this key, keeping original");
                continue;
            };
            match flattened_stream(reference, *candidate) {
                Ok(stream) => {
                    let new_id = original.add_object(stream);
                    original.set_page_resource(
                        page_id,
                        b"XObject",
                        name,
                        Object::Reference(new_id),
                    )?;
                    debug!(image = %name, "flattened image merged from reference rendition");
                    replaced += 1;
                }
                Err(err) => {
                    warn!(image = %name, %err, "cannot decode reference image, keeping original");
                }
            }
        }
    }

    debug!(replaced, "image merge complete");
    Ok(replaced)
}

/// Image XObjects of a page, keyed by their resource name.
fn page_images(graph: &PdfGraph, page_id: ObjectId) -> HashMap<String, ObjectId> {
    graph
        .resource_entries(page_id, b"XObject")
        .into_iter()
        .filter_map(|(name, entry)| {
            let dict = graph.resolved_dict(&entry)?;
            if !matches!(dict.get(b"Subtype"), Ok(Object::Name(n)) if n == b"Image") {
                return None;
            }
            match entry {
                Object::Reference(id) => Some((name, id)),
                _ => None,
            }
        })
        .collect()
}

/// Decode a reference image and rebuild it as an opaque 8-bit RGB
/// FlateDecode stream.
fn flattened_stream(graph: &PdfGraph, image_id: ObjectId) -> Result<Stream> {
    let stream = match graph.raw().get_object(image_id) {
        Ok(Object::Stream(stream)) => stream,
        _ => return Err(ArkivaError::Pdf(format!("object {image_id:?} is not a stream"))),
    };

    let (width, height, pixels) = decode_samples(stream)?;

    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(&pixels)?;
    let compressed = encoder.finish()?;

    Ok(Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => width as i64,
            "Height" => height as i64,
            "ColorSpace" => Object::Name(b"DeviceRGB".to_vec()),
            "BitsPerComponent" => 8i64,
            "Filter" => Object::Name(b"FlateDecode".to_vec()),
        },
        compressed,
    ))
}

/// Pull 8-bit RGB samples out of a reference image stream. JPEG-compressed
/// images are decoded with the image codec; Flate or unfiltered streams are
/// read as raw DeviceRGB or DeviceGray samples.
fn decode_samples(stream: &Stream) -> Result<(u32, u32, Vec<u8>)> {
    if has_filter(&stream.dict, b"DCTDecode") {
        let decoded = image::load_from_memory(&stream.content)
            .map_err(|e| ArkivaError::Pdf(format!("JPEG decode: {e}")))?;
        let rgb = decoded.to_rgb8();
        let (width, height) = rgb.dimensions();
        return Ok((width, height, rgb.into_raw()));
    }

    let width = dict_u32(&stream.dict, b"Width")?;
    let height = dict_u32(&stream.dict, b"Height")?;
    // Unfiltered streams carry the samples directly.
    let raw = if stream.dict.has(b"Filter") {
        stream
            .decompressed_content()
            .map_err(|e| ArkivaError::Pdf(format!("stream decode: {e}")))?
    } else {
        stream.content.clone()
    };

    let rgb_len = (width as usize) * (height as usize) * 3;
    let gray_len = (width as usize) * (height as usize);
    if raw.len() >= rgb_len && is_color_space(&stream.dict, b"DeviceRGB") {
        Ok((width, height, raw[..rgb_len].to_vec()))
    } else if raw.len() >= gray_len && is_color_space(&stream.dict, b"DeviceGray") {
        let mut rgb = Vec::with_capacity(rgb_len);
        for sample in &raw[..gray_len] {
            rgb.extend_from_slice(&[*sample, *sample, *sample]);
        }
        Ok((width, height, rgb))
    } else {
        Err(ArkivaError::Pdf(
            "unsupported image encoding in reference rendition".into(),
        ))
    }
}

fn has_filter(dict: &Dictionary, filter: &[u8]) -> bool {
    match dict.get(b"Filter") {
        Ok(Object::Name(n)) => n == filter,
        Ok(Object::Array(items)) => items
            .iter()
            .any(|item| matches!(item, Object::Name(n) if n == filter)),
        _ => false,
    }
}

fn is_color_space(dict: &Dictionary, space: &[u8]) -> bool {
    matches!(dict.get(b"ColorSpace"), Ok(Object::Name(n)) if n == space)
}

fn dict_u32(dict: &Dictionary, key: &[u8]) -> Result<u32> {
    match dict.get(key) {
        Ok(Object::Integer(v)) if *v >= 0 => Ok(*v as u32),
        _ => Err(ArkivaError::Pdf(format!(
            "image stream lacks integer /{}",
            String::from_utf8_lossy(key)
        ))),
    }
}

// -- Tests -------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{add_image, one_page_graph};

    #[test]
    fn transparent_image_is_replaced_by_opaque_rendition() {
        let mut original = one_page_graph();
        add_image(&mut original, "Im1", true, false);

        let mut reference = one_page_graph();
        add_image(&mut reference, "Im1", false, false);

        let replaced = import_flattened_images(&mut original, &reference).unwrap();
        assert_eq!(replaced, 1);

        let page_id = original.page_ids()[0];
        assert!(flagged_image_names(&original, page_id).is_empty());

        let entries = original.resource_entries(page_id, b"XObject");
        let Object::Reference(id) = entries[0].1 else {
            panic!("image entry is not a reference");
        };
        let Some(Object::Stream(stream)) = original.raw().objects.get(&id) else {
            panic!("image is not a stream");
        };
        assert!(!stream.dict.has(b"SMask"));
        assert!(matches!(
            stream.dict.get(b"Filter"),
            Ok(Object::Name(n)) if n == b"FlateDecode"
        ));
    }

    #[test]
    fn replacement_is_looked_up_by_resource_key() {
        // Opaque image before the transparent one: the replacement must come
        // from the reference entry at the same key, not the same position.
        let mut original = one_page_graph();
        add_image(&mut original, "ImA", false, false);
        add_image(&mut original, "ImB", true, false);

        let mut reference = one_page_graph();
        let ref_page = reference.page_ids()[0];
        for (key, width) in [("ImA", 1i64), ("ImB", 2i64)] {
            let id = reference.add_object(Stream::new(
                dictionary! {
                    "Type" => "XObject",
                    "Subtype" => "Image",
                    "Width" => width,
                    "Height" => 1i64,
                    "ColorSpace" => Object::Name(b"DeviceRGB".to_vec()),
                    "BitsPerComponent" => 8i64,
                },
                vec![0x7f; (width as usize) * 3],
            ));
            reference
                .set_page_resource(ref_page, b"XObject", key, Object::Reference(id))
                .unwrap();
        }

        let replaced = import_flattened_images(&mut original, &reference).unwrap();
        assert_eq!(replaced, 1);

        let page_id = original.page_ids()[0];
        let entries: HashMap<String, Object> = original
            .resource_entries(page_id, b"XObject")
            .into_iter()
            .collect();
        let Some(Object::Reference(id)) = entries.get("ImB") else {
            panic!("ImB entry is not a reference");
        };
        let Some(Object::Stream(stream)) = original.raw().objects.get(id) else {
            panic!("ImB is not a stream");
        };
        assert!(matches!(stream.dict.get(b"Width"), Ok(Object::Integer(2))));
    }

    #[test]
    fn unfiltered_reference_stream_decodes_from_raw_content() {
        let rgb = Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => 1i64,
                "Height" => 1i64,
                "ColorSpace" => Object::Name(b"DeviceRGB".to_vec()),
                "BitsPerComponent" => 8i64,
            },
            vec![0x01, 0x02, 0x03],
        );
        let (w, h, pixels) = decode_samples(&rgb).unwrap();
        assert_eq!((w, h), (1, 1));
        assert_eq!(pixels, vec![0x01, 0x02, 0x03]);
    }

    #[test]
    fn opaque_images_are_untouched() {
        let mut original = one_page_graph();
        add_image(&mut original, "Im1", false, false);
        let before = original.resource_entries(original.page_ids()[0], b"XObject");

        let reference = one_page_graph();
        let replaced = import_flattened_images(&mut original, &reference).unwrap();
        assert_eq!(replaced, 0);
        assert_eq!(
            before,
            original.resource_entries(original.page_ids()[0], b"XObject")
        );
    }

    #[test]
    fn gray_reference_image_expands_to_rgb() {
        let gray = Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => 2i64,
                "Height" => 1i64,
                "ColorSpace" => Object::Name(b"DeviceGray".to_vec()),
                "BitsPerComponent" => 8i64,
            },
            vec![0x10, 0xf0],
        );
        let (w, h, pixels) = decode_samples(&gray).unwrap();
        assert_eq!((w, h), (2, 1));
        assert_eq!(pixels, vec![0x10, 0x10, 0x10, 0xf0, 0xf0, 0xf0]);
    }

    #[test]
    fn missing_reference_image_degrades_gracefully() {
        let mut original = one_page_graph();
        add_image(&mut original, "Im1", true, false);

        // Reference rendition with no images at all.
        let reference = one_page_graph();
        let replaced = import_flattened_images(&mut original, &reference).unwrap();
        assert_eq!(replaced, 0);
    }
}
