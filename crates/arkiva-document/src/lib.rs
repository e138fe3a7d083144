// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// arkiva-document — Document-graph access for the Arkiva PDF/A engine.
//
// Wraps `lopdf` with the handful of operations the compliance pipeline needs:
// page enumeration, resource and annotation read/write, document info, the
// XMP metadata stream, output intents, and serialisation with a compression
// toggle. Cross-document object import lives in `import`.

pub mod graph;
pub mod import;

pub use graph::PdfGraph;
pub use import::{import_object, import_value};
