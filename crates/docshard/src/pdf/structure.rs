//! Structural information: object subtypes and the document outline.

use super::metadata::resolve;
use super::text::decode_text_string;
use crate::normalize::sanitize_raw;
use crate::types::OutlineEntry;
use lopdf::{Dictionary, Document, Object, ObjectId};
use std::collections::{BTreeSet, HashMap, HashSet};

/// Outlines nested deeper than this are not followed.
const MAX_OUTLINE_DEPTH: u32 = 64;

/// Distinct `/Subtype` names across all dictionaries and stream dictionaries,
/// each with its leading `/` (e.g. `/Image`, `/Link`, `/Type1`).
pub fn collect_subtypes(doc: &Document) -> BTreeSet<String> {
    doc.objects
        .values()
        .filter_map(|object| match object {
            Object::Dictionary(dict) => Some(dict),
            Object::Stream(stream) => Some(&stream.dict),
            _ => None,
        })
        .filter_map(|dict| match dict.get(b"Subtype").ok().and_then(|value| resolve(doc, value)) {
            Some(Object::Name(name)) => Some(format!("/{}", String::from_utf8_lossy(name))),
            _ => None,
        })
        .collect()
}

/// Flatten the outline tree in document order.
///
/// Levels start at 1. Destinations are resolved to 1-based page numbers for
/// explicit destinations (`/Dest` or a GoTo action's `/D`) and for named
/// destinations listed in the catalog's `/Dests` dictionary.
pub fn collect_outline(doc: &Document) -> Vec<OutlineEntry> {
    let Some(catalog) = catalog(doc) else {
        return Vec::new();
    };
    let Some(first) = catalog
        .get(b"Outlines")
        .ok()
        .and_then(|value| resolve(doc, value))
        .and_then(|value| value.as_dict().ok())
        .and_then(|outlines| outlines.get(b"First").ok())
        .and_then(|value| value.as_reference().ok())
    else {
        return Vec::new();
    };

    let walker = OutlineWalker {
        doc,
        catalog,
        page_numbers: doc.get_pages().into_iter().map(|(number, id)| (id, number)).collect(),
    };
    let mut entries = Vec::new();
    let mut visited = HashSet::new();
    walker.walk(first, 1, &mut visited, &mut entries);
    entries
}

fn catalog(doc: &Document) -> Option<&Dictionary> {
    doc.trailer
        .get(b"Root")
        .ok()
        .and_then(|value| resolve(doc, value))
        .and_then(|value| value.as_dict().ok())
}

struct OutlineWalker<'a> {
    doc: &'a Document,
    catalog: &'a Dictionary,
    page_numbers: HashMap<ObjectId, u32>,
}

impl OutlineWalker<'_> {
    fn walk(&self, first: ObjectId, level: u32, visited: &mut HashSet<ObjectId>, entries: &mut Vec<OutlineEntry>) {
        if level > MAX_OUTLINE_DEPTH {
            tracing::debug!(level, "Outline nesting too deep, truncating");
            return;
        }

        let mut current = Some(first);
        while let Some(id) = current {
            if !visited.insert(id) {
                tracing::debug!(object = ?id, "Outline cycle detected");
                break;
            }
            let Ok(item) = self.doc.get_dictionary(id) else {
                break;
            };

            entries.push(OutlineEntry {
                level,
                title: self.title(item),
                page: self.target_page(item),
            });

            if let Some(child) = item.get(b"First").ok().and_then(|value| value.as_reference().ok()) {
                self.walk(child, level + 1, visited, entries);
            }
            current = item.get(b"Next").ok().and_then(|value| value.as_reference().ok());
        }
    }

    fn title(&self, item: &Dictionary) -> String {
        match item.get(b"Title").ok().and_then(|value| resolve(self.doc, value)) {
            Some(Object::String(bytes, _)) => sanitize_raw(&decode_text_string(bytes)),
            _ => String::new(),
        }
    }

    fn target_page(&self, item: &Dictionary) -> Option<u32> {
        let destination = match item.get(b"Dest") {
            Ok(dest) => resolve(self.doc, dest)?,
            Err(_) => {
                let action = item.get(b"A").ok().and_then(|value| resolve(self.doc, value))?;
                resolve(self.doc, action.as_dict().ok()?.get(b"D").ok()?)?
            }
        };
        self.page_of(destination)
    }

    fn page_of(&self, destination: &Object) -> Option<u32> {
        match destination {
            Object::Array(parts) => match parts.first()? {
                Object::Reference(page_id) => self.page_numbers.get(page_id).copied(),
                Object::Integer(page_index) => u32::try_from(*page_index).ok().map(|index| index + 1),
                _ => None,
            },
            Object::Name(name) | Object::String(name, _) => {
                let named = self
                    .catalog
                    .get(b"Dests")
                    .ok()
                    .and_then(|value| resolve(self.doc, value))
                    .and_then(|value| value.as_dict().ok())?
                    .get(name)
                    .ok()
                    .and_then(|value| resolve(self.doc, value))?;
                match named {
                    Object::Dictionary(dict) => {
                        let inner = resolve(self.doc, dict.get(b"D").ok()?)?;
                        match inner {
                            Object::Array(_) => self.page_of(inner),
                            _ => None,
                        }
                    }
                    Object::Array(_) => self.page_of(named),
                    _ => None,
                }
            }
            Object::Dictionary(dict) => {
                let inner = resolve(self.doc, dict.get(b"D").ok()?)?;
                match inner {
                    Object::Array(_) => self.page_of(inner),
                    _ => None,
                }
            }
            _ => None,
        }
    }
}
