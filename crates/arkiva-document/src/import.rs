// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Cross-document object import.
//
// Copies an object and everything it transitively references from one
// document into another, remapping indirect references as it goes. A memo of
// already-imported ids keeps shared sub-objects shared and makes the walk
// terminate on graphs with back-references.

use std::collections::HashMap;

use arkiva_core::error::{ArkivaError, Result};
use lopdf::{Dictionary, Document, Object, ObjectId, Stream};
use tracing::warn;

/// Import the object `id` from `source` into `target`, returning its new id.
///
/// The memo maps source ids to target ids across calls, so importing several
/// fonts that share one descriptor copies the descriptor once.
pub fn import_object(
    source: &Document,
    target: &mut Document,
    id: ObjectId,
    memo: &mut HashMap<ObjectId, ObjectId>,
) -> Result<ObjectId> {
    if let Some(&mapped) = memo.get(&id) {
        return Ok(mapped);
    }

    let object = source
        .get_object(id)
        .map_err(|err| ArkivaError::Pdf(format!("cannot read object {id:?}: {err}")))?
        .clone();

    // Reserve the target id before descending so cycles resolve to it.
    let new_id = target.new_object_id();
    memo.insert(id, new_id);

    let imported = import_value(source, target, &object, memo)?;
    target.objects.insert(new_id, imported);
    Ok(new_id)
}

/// Import a direct object value, rewriting any references it contains.
///
/// /Parent entries are dropped: they only occur as page-tree back-references
/// and must not drag the whole source page tree across.
pub fn import_value(
    source: &Document,
    target: &mut Document,
    object: &Object,
    memo: &mut HashMap<ObjectId, ObjectId>,
) -> Result<Object> {
    match object {
        Object::Reference(id) => {
            if source.get_object(*id).is_ok() {
                Ok(Object::Reference(import_object(source, target, *id, memo)?))
            } else {
                warn!(?id, "unresolvable reference during import, using Null");
                Ok(Object::Null)
            }
        }
        Object::Dictionary(dict) => Ok(Object::Dictionary(import_dict(
            source, target, dict, memo,
        )?)),
        Object::Array(items) => {
            let mut imported = Vec::with_capacity(items.len());
            for item in items {
                imported.push(import_value(source, target, item, memo)?);
            }
            Ok(Object::Array(imported))
        }
        Object::Stream(stream) => {
            let dict = import_dict(source, target, &stream.dict, memo)?;
            Ok(Object::Stream(Stream::new(dict, stream.content.clone())))
        }
        // Boolean, Integer, Real, String, Name, Null are self-contained.
        other => Ok(other.clone()),
    }
}

fn import_dict(
    source: &Document,
    target: &mut Document,
    dict: &Dictionary,
    memo: &mut HashMap<ObjectId, ObjectId>,
) -> Result<Dictionary> {
    let mut imported = Dictionary::new();
    for (key, value) in dict.iter() {
        if key == b"Parent" {
            continue;
        }
        imported.set(key.clone(), import_value(source, target, value, memo)?);
    }
    Ok(imported)
}
