// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// PDF object-graph wrapper — open, inspect, and mutate a document with the
// `lopdf` crate. One `PdfGraph` is owned by exactly one conversion request.

use std::path::Path;

use arkiva_core::error::{ArkivaError, Result};
use lopdf::{Dictionary, Document, Object, ObjectId, Stream, dictionary};
use tracing::{debug, instrument};

/// Reference-chain hop limit when resolving indirect objects. Real documents
/// never chain references this deep; malformed ones may loop.
const MAX_RESOLVE_HOPS: usize = 16;

/// A mutable PDF document graph.
///
/// Wraps `lopdf::Document` and exposes the operations the compliance
/// pipeline performs: reading and replacing page resources, rewriting
/// annotations, prepending content streams, and maintaining the
/// document-level info, metadata, and output-intent entries.
pub struct PdfGraph {
    document: Document,
}

impl PdfGraph {
    // -- Construction ---------------------------------------------------------

    /// Parse a PDF from raw bytes already in memory.
    #[instrument(skip_all, fields(bytes_len = data.len()))]
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let document = Document::load_mem(data)
            .map_err(|err| ArkivaError::Pdf(format!("failed to load PDF from memory: {err}")))?;

        debug!(pages = document.get_pages().len(), "PDF loaded from bytes");
        Ok(Self { document })
    }

    /// Open a PDF from the filesystem.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path_ref = path.as_ref();
        let document = Document::load(path_ref).map_err(|err| {
            ArkivaError::Pdf(format!("failed to open {}: {err}", path_ref.display()))
        })?;

        debug!(pages = document.get_pages().len(), "PDF loaded");
        Ok(Self { document })
    }

    /// Serialise the document to bytes.
    ///
    /// With `compress` set, every compressible stream is deflated first;
    /// without it streams are written exactly as they stand (archival
    /// fidelity for Part 1).
    pub fn save_to_bytes(&mut self, compress: bool) -> Result<Vec<u8>> {
        if compress {
            self.document.compress();
            // The XMP metadata stream must stay unfiltered.
            self.unfilter_metadata();
        }
        let mut output = Vec::new();
        self.document
            .save_to(&mut output)
            .map_err(|err| ArkivaError::Pdf(format!("failed to serialise PDF: {err}")))?;
        Ok(output)
    }

    /// Set the PDF header version, e.g. `"1.4"`.
    pub fn set_version(&mut self, version: &str) {
        self.document.version = version.to_string();
    }

    // -- Raw access -----------------------------------------------------------

    /// The underlying `lopdf` document, read-only.
    pub fn raw(&self) -> &Document {
        &self.document
    }

    /// The underlying `lopdf` document, mutable. Used by the sanitizer and
    /// the cross-document import, which walk the graph below the level of
    /// this wrapper.
    pub fn raw_mut(&mut self) -> &mut Document {
        &mut self.document
    }

    /// Register a new object and return its id.
    pub fn add_object(&mut self, object: impl Into<Object>) -> ObjectId {
        self.document.add_object(object)
    }

    // -- Inspection -----------------------------------------------------------

    /// Page object ids in document order.
    pub fn page_ids(&self) -> Vec<ObjectId> {
        self.document.get_pages().into_values().collect()
    }

    /// Number of pages in the document.
    pub fn page_count(&self) -> usize {
        self.document.get_pages().len()
    }

    /// Object id of the document catalog.
    pub fn catalog_id(&self) -> Result<ObjectId> {
        match self.document.trailer.get(b"Root") {
            Ok(Object::Reference(id)) => Ok(*id),
            _ => Err(ArkivaError::Pdf("trailer has no /Root reference".into())),
        }
    }

    /// Follow reference chains until a concrete object is reached.
    pub fn resolve<'a>(&'a self, object: &'a Object) -> &'a Object {
        let mut current = object;
        for _ in 0..MAX_RESOLVE_HOPS {
            match current {
                Object::Reference(id) => match self.document.get_object(*id) {
                    Ok(next) => current = next,
                    Err(_) => break,
                },
                _ => break,
            }
        }
        current
    }

    /// Resolve an object and clone it as a dictionary, if it is one. Stream
    /// objects yield their dictionary.
    pub fn resolved_dict(&self, object: &Object) -> Option<Dictionary> {
        match self.resolve(object) {
            Object::Dictionary(dict) => Some(dict.clone()),
            Object::Stream(stream) => Some(stream.dict.clone()),
            _ => None,
        }
    }

    // -- Page resources -------------------------------------------------------

    /// The effective resource dictionary of a page, resolved and cloned.
    ///
    /// Walks the /Parent chain for inherited resources; returns an empty
    /// dictionary when the page declares none.
    pub fn page_resources(&self, page_id: ObjectId) -> Dictionary {
        let mut current = Some(page_id);
        for _ in 0..MAX_RESOLVE_HOPS {
            let Some(id) = current else { break };
            let Ok(dict) = self.document.get_object(id).and_then(|o| o.as_dict()) else {
                break;
            };
            if let Ok(resources) = dict.get(b"Resources")
                && let Some(resolved) = self.resolved_dict(resources)
            {
                return resolved;
            }
            current = match dict.get(b"Parent") {
                Ok(Object::Reference(parent)) => Some(*parent),
                _ => None,
            };
        }
        Dictionary::new()
    }

    /// Entries of one resource category (`b"Font"`, `b"XObject"`, ...) for a
    /// page: the resource name paired with the stored entry object, which is
    /// usually an indirect reference.
    pub fn resource_entries(&self, page_id: ObjectId, category: &[u8]) -> Vec<(String, Object)> {
        let resources = self.page_resources(page_id);
        let Ok(entry) = resources.get(category) else {
            return Vec::new();
        };
        let Some(dict) = self.resolved_dict(entry) else {
            return Vec::new();
        };
        dict.iter()
            .map(|(name, value)| (String::from_utf8_lossy(name).into_owned(), value.clone()))
            .collect()
    }

    /// Replace one entry in a page's resource category, rewriting the
    /// resolved resource dictionary directly onto the page.
    pub fn set_page_resource(
        &mut self,
        page_id: ObjectId,
        category: &[u8],
        name: &str,
        value: Object,
    ) -> Result<()> {
        let mut resources = self.page_resources(page_id);
        let mut entries = resources
            .get(category)
            .ok()
            .and_then(|o| self.resolved_dict(o))
            .unwrap_or_default();
        entries.set(name, value);
        resources.set(category.to_vec(), Object::Dictionary(entries));

        let page = self.page_dict_mut(page_id)?;
        page.set("Resources", Object::Dictionary(resources));
        Ok(())
    }

    // -- Annotations ----------------------------------------------------------

    /// Annotations of a page: the stored array entry (kept so callers can
    /// write a filtered subset back) paired with the resolved dictionary.
    pub fn page_annotations(&self, page_id: ObjectId) -> Vec<(Object, Dictionary)> {
        let Ok(page) = self.document.get_object(page_id).and_then(|o| o.as_dict()) else {
            return Vec::new();
        };
        let Ok(annots) = page.get(b"Annots") else {
            return Vec::new();
        };
        let Object::Array(items) = self.resolve(annots) else {
            return Vec::new();
        };
        items
            .iter()
            .filter_map(|entry| self.resolved_dict(entry).map(|dict| (entry.clone(), dict)))
            .collect()
    }

    /// Overwrite a page's annotation array. An empty list removes /Annots.
    pub fn set_page_annotations(&mut self, page_id: ObjectId, entries: Vec<Object>) -> Result<()> {
        let page = self.page_dict_mut(page_id)?;
        if entries.is_empty() {
            page.remove(b"Annots");
        } else {
            page.set("Annots", Object::Array(entries));
        }
        Ok(())
    }

    // -- Content streams ------------------------------------------------------

    /// Prepend encoded content-stream operations to a page. The operations
    /// land in their own stream object so existing content is untouched;
    /// PDF concatenates the streams at render time.
    pub fn prepend_page_content(&mut self, page_id: ObjectId, content: Vec<u8>) -> Result<()> {
        let existing: Vec<Object> = {
            let page = self
                .document
                .get_object(page_id)
                .and_then(|o| o.as_dict())
                .map_err(|err| ArkivaError::Pdf(format!("page {page_id:?}: {err}")))?;
            match page.get(b"Contents") {
                Ok(Object::Array(items)) => items.clone(),
                Ok(single @ (Object::Reference(_) | Object::Stream(_))) => vec![single.clone()],
                _ => Vec::new(),
            }
        };

        let stream_id = self
            .document
            .add_object(Stream::new(Dictionary::new(), content));

        let mut items = Vec::with_capacity(existing.len() + 1);
        items.push(Object::Reference(stream_id));
        items.extend(existing);

        let page = self.page_dict_mut(page_id)?;
        page.set("Contents", Object::Array(items));
        Ok(())
    }

    // -- Document info --------------------------------------------------------

    /// The document information dictionary, resolved and cloned (empty when
    /// absent).
    pub fn document_info(&self) -> Dictionary {
        self.document
            .trailer
            .get(b"Info")
            .ok()
            .and_then(|o| self.resolved_dict(o))
            .unwrap_or_default()
    }

    /// Replace the document information dictionary.
    pub fn set_document_info(&mut self, info: Dictionary) {
        if let Ok(Object::Reference(id)) = self.document.trailer.get(b"Info").cloned()
            && self.document.get_object(id).is_ok()
        {
            self.document
                .objects
                .insert(id, Object::Dictionary(info));
            return;
        }
        let info_id = self.document.add_object(Object::Dictionary(info));
        self.document.trailer.set("Info", Object::Reference(info_id));
    }

    // -- Metadata stream ------------------------------------------------------

    /// Decoded bytes of the catalog's XMP metadata stream, if present.
    pub fn metadata_bytes(&self) -> Option<Vec<u8>> {
        let catalog_id = self.catalog_id().ok()?;
        let catalog = self.document.get_object(catalog_id).and_then(|o| o.as_dict()).ok()?;
        let metadata = catalog.get(b"Metadata").ok()?;
        match self.resolve(metadata) {
            Object::Stream(stream) => stream
                .decompressed_content()
                .ok()
                .or_else(|| Some(stream.content.clone())),
            _ => None,
        }
    }

    /// Attach `xml` as the document's metadata stream, replacing any
    /// previous one.
    pub fn set_metadata(&mut self, xml: Vec<u8>) -> Result<()> {
        let stream = Stream::new(
            dictionary! {
                "Type" => Object::Name(b"Metadata".to_vec()),
                "Subtype" => Object::Name(b"XML".to_vec()),
            },
            xml,
        );
        let stream_id = self.document.add_object(stream);
        let catalog = self.catalog_mut()?;
        catalog.set("Metadata", Object::Reference(stream_id));
        Ok(())
    }

    // -- Output intents -------------------------------------------------------

    /// Whether the catalog declares at least one output intent.
    pub fn has_output_intents(&self) -> bool {
        let Ok(catalog_id) = self.catalog_id() else {
            return false;
        };
        let Ok(catalog) = self.document.get_object(catalog_id).and_then(|o| o.as_dict()) else {
            return false;
        };
        match catalog.get(b"OutputIntents").map(|o| self.resolve(o)) {
            Ok(Object::Array(items)) => !items.is_empty(),
            _ => false,
        }
    }

    /// Append an output-intent dictionary to the catalog.
    pub fn add_output_intent(&mut self, intent: Dictionary) -> Result<()> {
        let intent_id = self.document.add_object(Object::Dictionary(intent));
        let existing = {
            let catalog_id = self.catalog_id()?;
            let catalog = self
                .document
                .get_object(catalog_id)
                .and_then(|o| o.as_dict())
                .map_err(|err| ArkivaError::Pdf(format!("catalog: {err}")))?;
            match catalog.get(b"OutputIntents") {
                Ok(Object::Array(items)) => items.clone(),
                _ => Vec::new(),
            }
        };
        let mut items = existing;
        items.push(Object::Reference(intent_id));
        let catalog = self.catalog_mut()?;
        catalog.set("OutputIntents", Object::Array(items));
        Ok(())
    }

    // -- Helpers --------------------------------------------------------------

    fn unfilter_metadata(&mut self) {
        let metadata_id = self
            .catalog_id()
            .ok()
            .and_then(|catalog_id| self.document.get_object(catalog_id).ok())
            .and_then(|o| o.as_dict().ok())
            .and_then(|catalog| match catalog.get(b"Metadata") {
                Ok(Object::Reference(id)) => Some(*id),
                _ => None,
            });
        if let Some(id) = metadata_id
            && let Some(Object::Stream(stream)) = self.document.objects.get_mut(&id)
            && stream.dict.has(b"Filter")
            && let Ok(content) = stream.decompressed_content()
        {
            stream.set_content(content);
            stream.dict.remove(b"Filter");
        }
    }

    fn page_dict_mut(&mut self, page_id: ObjectId) -> Result<&mut Dictionary> {
        self.document
            .get_object_mut(page_id)
            .and_then(|o| o.as_dict_mut())
            .map_err(|err| ArkivaError::Pdf(format!("page {page_id:?}: {err}")))
    }

    fn catalog_mut(&mut self) -> Result<&mut Dictionary> {
        let catalog_id = self.catalog_id()?;
        self.document
            .get_object_mut(catalog_id)
            .and_then(|o| o.as_dict_mut())
            .map_err(|err| ArkivaError::Pdf(format!("catalog: {err}")))
    }
}
