// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// XMP metadata synthesis. Archival output must carry an XMP packet with a
// PDF/A identification schema, consistent with the document information
// dictionary. Existing metadata is harvested leniently: a malformed packet
// never fails the conversion, it just contributes nothing.

use arkiva_core::{ComplianceTarget, Result};
use arkiva_document::PdfGraph;
use chrono::{SecondsFormat, Utc};
use lopdf::{Object, StringFormat};
use quick_xml::Reader;
use quick_xml::events::Event;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

/// Descriptive fields carried into the synthesized packet.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct XmpFields {
    pub title: Option<String>,
    pub author: Option<String>,
    pub subject: Option<String>,
    pub keywords: Option<String>,
    pub creator_tool: Option<String>,
    pub producer: Option<String>,
    pub create_date: Option<String>,
}

/// Replace the document's metadata stream with a fresh XMP packet carrying
/// the PDF/A identification schema, and mirror the descriptive fields into
/// the information dictionary so that both stay consistent.
#[instrument(skip(graph), fields(part = target.part.number()))]
pub fn write_metadata(graph: &mut PdfGraph, target: &ComplianceTarget) -> Result<()> {
    let mut fields = graph
        .metadata_bytes()
        .map(|bytes| harvest_xmp(&bytes))
        .unwrap_or_default();
    merge_info_fields(graph, &mut fields);

    let now = Utc::now();
    let iso_now = now.to_rfc3339_opts(SecondsFormat::Secs, true);
    let pdf_now = now.format("D:%Y%m%d%H%M%SZ").to_string();
    let document_id = Uuid::new_v4();

    let packet = render_packet(&fields, target, &iso_now, document_id);
    graph.set_metadata(packet.into_bytes())?;

    let mut info = graph.document_info();
    if let Some(title) = &fields.title {
        info.set("Title", text_string(title));
    }
    if let Some(author) = &fields.author {
        info.set("Author", text_string(author));
    }
    if let Some(subject) = &fields.subject {
        info.set("Subject", text_string(subject));
    }
    if let Some(keywords) = &fields.keywords {
        info.set("Keywords", text_string(keywords));
    }
    info.set("Creator", text_string(fields.creator_tool.as_deref().unwrap_or("Unknown")));
    info.set("Producer", text_string(fields.producer.as_deref().unwrap_or("Unknown")));
    if !info.has(b"CreationDate") {
        info.set("CreationDate", text_string(&pdf_now));
    }
    info.set("ModDate", text_string(&pdf_now));
    graph.set_document_info(info);

    debug!("metadata packet written");
    Ok(())
}

fn text_string(value: &str) -> Object {
    Object::String(value.as_bytes().to_vec(), StringFormat::Literal)
}

/// Best-effort extraction of descriptive fields from an existing packet.
fn harvest_xmp(bytes: &[u8]) -> XmpFields {
    let Ok(text) = std::str::from_utf8(bytes) else {
        warn!("existing metadata is not UTF-8, ignoring");
        return XmpFields::default();
    };

    let mut reader = Reader::from_str(text);
    reader.trim_text(true);

    let mut fields = XmpFields::default();
    let mut stack: Vec<String> = Vec::new();
    loop {
        match reader.read_event() {
            Ok(Event::Start(start)) => {
                stack.push(local_name(start.name().as_ref()));
            }
            Ok(Event::End(_)) => {
                stack.pop();
            }
            Ok(Event::Text(text)) => {
                let Ok(text) = text.unescape() else { continue };
                let value = text.trim().to_string();
                if value.is_empty() {
                    continue;
                }
                match stack.last().map(String::as_str) {
                    Some("li") => match enclosing_property(&stack) {
                        Some("title") => fields.title.get_or_insert(value),
                        Some("creator") => fields.author.get_or_insert(value),
                        Some("description") => fields.subject.get_or_insert(value),
                        _ => continue,
                    },
                    Some("CreatorTool") => fields.creator_tool.get_or_insert(value),
                    Some("Producer") => fields.producer.get_or_insert(value),
                    Some("Keywords") => fields.keywords.get_or_insert(value),
                    Some("CreateDate") => fields.create_date.get_or_insert(value),
                    _ => continue,
                };
            }
            Ok(Event::Eof) => break,
            Err(err) => {
                warn!(%err, "malformed metadata packet, using what was read");
                break;
            }
            _ => {}
        }
    }
    fields
}

fn local_name(qualified: &[u8]) -> String {
    let name = String::from_utf8_lossy(qualified);
    match name.rsplit_once(':') {
        Some((_, local)) => local.to_string(),
        None => name.into_owned(),
    }
}

/// The dc property an rdf:li text node belongs to, skipping the intervening
/// rdf:Alt / rdf:Seq / rdf:Bag container element.
fn enclosing_property(stack: &[String]) -> Option<&str> {
    stack
        .iter()
        .rev()
        .map(String::as_str)
        .find(|name| !matches!(*name, "li" | "Alt" | "Seq" | "Bag"))
}

/// Fill gaps from the information dictionary.
fn merge_info_fields(graph: &PdfGraph, fields: &mut XmpFields) {
    let info = graph.document_info();
    for (key, slot) in [
        (b"Title".as_slice(), &mut fields.title),
        (b"Author", &mut fields.author),
        (b"Subject", &mut fields.subject),
        (b"Keywords", &mut fields.keywords),
        (b"Creator", &mut fields.creator_tool),
        (b"Producer", &mut fields.producer),
    ] {
        if slot.is_none()
            && let Ok(Object::String(bytes, _)) = info.get(key)
            && let Some(value) = decode_text_string(bytes)
            && !value.is_empty()
        {
            *slot = Some(value);
        }
    }
}

/// PDF text strings are either PDFDocEncoded (treated as Latin-1 here) or
/// UTF-16BE with a byte order mark.
fn decode_text_string(bytes: &[u8]) -> Option<String> {
    if bytes.starts_with(&[0xfe, 0xff]) {
        let units: Vec<u16> = bytes[2..]
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect();
        String::from_utf16(&units).ok()
    } else {
        Some(bytes.iter().map(|&b| b as char).collect())
    }
}

fn render_packet(
    fields: &XmpFields,
    target: &ComplianceTarget,
    iso_now: &str,
    document_id: Uuid,
) -> String {
    let title = xml_escape(fields.title.as_deref().unwrap_or(""));
    let creator_tool = xml_escape(fields.creator_tool.as_deref().unwrap_or("Unknown"));

    // The creator sequence is reset to the creating tool plus the author as
    // a second entry when the two differ.
    let mut creator_entries = vec![creator_tool.clone()];
    if let Some(author) = fields.author.as_deref().filter(|a| !a.trim().is_empty()) {
        let author = xml_escape(author);
        if author != creator_tool {
            creator_entries.push(author);
        }
    }
    let creators: String = creator_entries
        .iter()
        .map(|entry| format!("<rdf:li>{entry}</rdf:li>"))
        .collect();

    let mut optional = String::new();
    if let Some(subject) = fields.subject.as_deref().filter(|s| !s.trim().is_empty()) {
        optional.push_str(&format!(
            "   <dc:description><rdf:Alt><rdf:li xml:lang=\"x-default\">{}</rdf:li></rdf:Alt></dc:description>\n",
            xml_escape(subject)
        ));
    }
    if let Some(keywords) = fields.keywords.as_deref().filter(|s| !s.trim().is_empty()) {
        optional.push_str(&format!(
            "   <pdf:Keywords>{}</pdf:Keywords>\n",
            xml_escape(keywords)
        ));
    }
    let producer = xml_escape(fields.producer.as_deref().unwrap_or("Unknown"));
    let create_date = fields
        .create_date
        .as_deref()
        .map(xml_escape)
        .unwrap_or_else(|| iso_now.to_string());

    format!(
        r#"<?xpacket begin="{bom}" id="W5M0MpCehiHzreSzNTczkc9d"?>
<x:xmpmeta xmlns:x="adobe:ns:meta/">
 <rdf:RDF xmlns:rdf="http://www.w3.org/1999/02/22-rdf-syntax-ns#">
  <rdf:Description rdf:about=""
    xmlns:pdfaid="http://www.aiim.org/pdfa/ns/id/"
    xmlns:dc="http://purl.org/dc/elements/1.1/"
    xmlns:xmp="http://ns.adobe.com/xap/1.0/"
    xmlns:xmpMM="http://ns.adobe.com/xap/1.0/mm/"
    xmlns:pdf="http://ns.adobe.com/pdf/1.3/">
   <pdfaid:part>{part}</pdfaid:part>
   <pdfaid:conformance>{conformance}</pdfaid:conformance>
   <dc:title><rdf:Alt><rdf:li xml:lang="x-default">{title}</rdf:li></rdf:Alt></dc:title>
   <dc:creator><rdf:Seq>{creators}</rdf:Seq></dc:creator>
{optional}   <xmp:CreatorTool>{creator_tool}</xmp:CreatorTool>
   <xmp:CreateDate>{create_date}</xmp:CreateDate>
   <xmp:ModifyDate>{iso_now}</xmp:ModifyDate>
   <xmp:MetadataDate>{iso_now}</xmp:MetadataDate>
   <xmpMM:DocumentID>uuid:{document_id}</xmpMM:DocumentID>
   <pdf:Producer>{producer}</pdf:Producer>
  </rdf:Description>
 </rdf:RDF>
</x:xmpmeta>
<?xpacket end="w"?>"#,
        bom = '\u{feff}',
        part = target.part.number(),
        conformance = ComplianceTarget::CONFORMANCE,
    )
}

fn xml_escape(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

// -- Tests -------------------------------------------------------------------
