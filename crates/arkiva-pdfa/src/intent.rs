// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Output intent. Archival output must declare the colorimetric rendering
// target; device color spaces are interpreted against the embedded sRGB
// profile.

use arkiva_core::Result;
use arkiva_document::PdfGraph;
use lopdf::{Object, Stream, StringFormat, dictionary};
use tracing::{debug, instrument, warn};

const SRGB_PROFILE: &[u8] = include_bytes!("../assets/srgb.icc");

const CONDITION: &str = "sRGB IEC61966-2.1";
const REGISTRY: &str = "http://www.color.org";

/// Attach a GTS_PDFA1 output intent with an embedded sRGB profile, unless
/// the document already declares one.
#[instrument(skip(graph))]
pub fn ensure_output_intent(graph: &mut PdfGraph) -> Result<()> {
    if graph.has_output_intents() {
        debug!("document already declares an output intent, keeping it");
        return Ok(());
    }
    if !profile_is_valid(SRGB_PROFILE) {
        warn!("bundled sRGB profile failed validation, output intent skipped");
        return Ok(());
    }

    let profile_id = graph.add_object(Stream::new(
        dictionary! { "N" => 3i64 },
        SRGB_PROFILE.to_vec(),
    ));
    let intent = dictionary! {
        "Type" => "OutputIntent",
        "S" => Object::Name(b"GTS_PDFA1".to_vec()),
        "OutputConditionIdentifier" => literal(CONDITION),
        "Info" => literal(CONDITION),
        "RegistryName" => literal(REGISTRY),
        "DestOutputProfile" => profile_id,
    };
    graph.add_output_intent(intent)?;
    debug!("sRGB output intent attached");
    Ok(())
}

fn literal(value: &str) -> Object {
    Object::String(value.as_bytes().to_vec(), StringFormat::Literal)
}

/// Minimal ICC sanity: a full header and the profile signature at offset 36.
fn profile_is_valid(profile: &[u8]) -> bool {
    profile.len() >= 128 && &profile[36..40] == b"acsp"
}

// -- Tests -------------------------------------------------------------------
