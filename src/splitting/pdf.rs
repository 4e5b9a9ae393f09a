use super::types::{DocumentSplitter, PageUnit, SplitError};

use lopdf::{dictionary, Dictionary, Document, Object, ObjectId};
use std::collections::{BTreeMap, HashSet};

/// Page attributes a page may inherit from its ancestors in the page tree.
const INHERITABLE: [&[u8]; 4] = [b"Resources", b"MediaBox", b"CropBox", b"Rotate"];

/// Splits a PDF into standalone single-page PDFs.
///
/// Each output is built from scratch: the page dictionary with its inherited
/// attributes resolved, plus every object it transitively references (content
/// streams, fonts, images, annotations). Other pages are never copied, so the
/// cost of a split is linear in the size of its output.
#[derive(Debug, Default, Clone, Copy)]
pub struct PdfSplitter;

impl DocumentSplitter for PdfSplitter {
    fn name(&self) -> &'static str {
        "pdf"
    }

    fn split(&self, bytes: &[u8]) -> Result<Vec<PageUnit>, SplitError> {
        let source =
            Document::load_mem(bytes).map_err(|e| SplitError::CorruptInput(e.to_string()))?;

        let pages = source.get_pages();
        if pages.is_empty() {
            return Err(SplitError::CorruptInput("document has no pages".to_string()));
        }

        tracing::debug!("Splitting PDF into {} pages", pages.len());

        let page_tree: HashSet<ObjectId> = page_tree_nodes(&source, pages.values().copied());

        pages
            .iter()
            .map(|(&page_number, &page_id)| {
                let content = extract_page(&source, page_id, &page_tree).map_err(|e| {
                    SplitError::CorruptInput(format!("page {}: {}", page_number, e))
                })?;

                Ok(PageUnit {
                    page_number,
                    content,
                })
            })
            .collect()
    }
}

/// Every page and intermediate `Pages` node reachable upwards from `pages`.
fn page_tree_nodes(source: &Document, pages: impl Iterator<Item = ObjectId>) -> HashSet<ObjectId> {
    let mut nodes = HashSet::new();
    for page_id in pages {
        let mut next = Some(page_id);
        while let Some(id) = next {
            if !nodes.insert(id) {
                break;
            }
            next = source
                .get_object(id)
                .and_then(Object::as_dict)
                .and_then(|dict| dict.get(b"Parent"))
                .and_then(Object::as_reference)
                .ok();
        }
    }
    nodes
}

/// Builds a one-page document holding `page_id` and its dependencies.
fn extract_page(
    source: &Document,
    page_id: ObjectId,
    page_tree: &HashSet<ObjectId>,
) -> lopdf::Result<Vec<u8>> {
    let mut page = source.get_object(page_id)?.as_dict()?.clone();
    inherit_attributes(source, &mut page);
    page.remove(b"Parent");

    let mut objects = BTreeMap::new();
    let mut pending: Vec<ObjectId> = Vec::new();
    collect_references(&Object::Dictionary(page.clone()), &mut pending);

    while let Some(id) = pending.pop() {
        if id == page_id || page_tree.contains(&id) || objects.contains_key(&id) {
            continue;
        }
        let Ok(object) = source.get_object(id) else {
            continue;
        };
        collect_references(object, &mut pending);
        objects.insert(id, object.clone());
    }

    // Links to other pages (annotation targets, form parents) cannot be
    // carried into a one-page document.
    for object in objects.values_mut() {
        detach_foreign(object, page_id, page_tree);
    }
    let mut page = Object::Dictionary(page);
    detach_foreign(&mut page, page_id, page_tree);

    let mut single = Document::with_version(source.version.clone());
    single.objects = objects;
    single.max_id = source.max_id;

    let pages_id = single.new_object_id();
    if let Object::Dictionary(dict) = &mut page {
        dict.set("Parent", pages_id);
    }
    single.objects.insert(page_id, page);
    single.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![Object::Reference(page_id)],
            "Count" => 1_i64,
        }),
    );
    let catalog_id = single.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    single.trailer.set("Root", catalog_id);

    let mut content = Vec::new();
    single.save_to(&mut content)?;
    Ok(content)
}

/// Copies inheritable attributes missing on `page` from its nearest ancestor.
fn inherit_attributes(source: &Document, page: &mut Dictionary) {
    let mut seen = HashSet::new();
    let mut parent = page.get(b"Parent").and_then(Object::as_reference).ok();

    while let Some(id) = parent {
        if !seen.insert(id) {
            break;
        }
        let Ok(node) = source.get_object(id).and_then(Object::as_dict) else {
            break;
        };
        for key in INHERITABLE {
            if !page.has(key) {
                if let Ok(value) = node.get(key) {
                    page.set(key.to_vec(), value.clone());
                }
            }
        }
        parent = node.get(b"Parent").and_then(Object::as_reference).ok();
    }
}

fn collect_references(object: &Object, out: &mut Vec<ObjectId>) {
    match object {
        Object::Reference(id) => out.push(*id),
        Object::Array(items) => items.iter().for_each(|item| collect_references(item, out)),
        Object::Dictionary(dict) => dict.iter().for_each(|(_, value)| collect_references(value, out)),
        Object::Stream(stream) => stream
            .dict
            .iter()
            .for_each(|(_, value)| collect_references(value, out)),
        _ => {}
    }
}

/// Replaces references into the page tree, other than to `page_id`, with null.
fn detach_foreign(object: &mut Object, page_id: ObjectId, page_tree: &HashSet<ObjectId>) {
    let foreign =
        matches!(*object, Object::Reference(id) if id != page_id && page_tree.contains(&id));
    if foreign {
        *object = Object::Null;
        return;
    }

    match object {
        Object::Array(items) => items
            .iter_mut()
            .for_each(|item| detach_foreign(item, page_id, page_tree)),
        Object::Dictionary(dict) => dict
            .iter_mut()
            .for_each(|(_, value)| detach_foreign(value, page_id, page_tree)),
        Object::Stream(stream) => stream
            .dict
            .iter_mut()
            .for_each(|(_, value)| detach_foreign(value, page_id, page_tree)),
        _ => {}
    }
}
