//! Page splitting: one multi-page PDF → one single-page PDF per page.
//!
//! Each output is a fresh document holding the kept page and only the objects
//! reachable from it. Attributes the page inherits from the page tree
//! (resources, media box, crop box, rotation) are copied onto the page
//! itself, so it renders exactly as in the source. References to the other
//! pages (link destinations, annotation parents) become `null`.
//!
//! Encrypted documents are opened with the empty user password, which covers
//! the common "owner password only" case.
//!
//! Parsing and re-serialising are CPU-bound; [`split_pages`] runs them on
//! `spawn_blocking` so the gateway's async workers never stall on a large
//! upload.

use crate::error::Pdf2MdError;
use lopdf::encryption::DecryptionError;
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId};
use std::collections::{HashMap, HashSet, VecDeque};
use tracing::{debug, info};

/// Every PDF begins with this marker.
pub const PDF_MAGIC: &[u8] = b"%PDF";

/// Readers accept leading garbage before the header up to this offset.
const MAGIC_SEARCH_WINDOW: usize = 1024;

/// Page attributes a page may inherit from its ancestors in the page tree.
const INHERITABLE: [&[u8]; 4] = [b"Resources", b"MediaBox", b"CropBox", b"Rotate"];

/// Guards the `/Parent` walk against cyclic page trees.
const MAX_TREE_DEPTH: usize = 64;

/// Reject input that does not carry the `%PDF` marker near its start.
pub fn check_pdf_magic(bytes: &[u8]) -> Result<(), Pdf2MdError> {
    let window = &bytes[..bytes.len().min(MAGIC_SEARCH_WINDOW)];
    if window.windows(PDF_MAGIC.len()).any(|w| w == PDF_MAGIC) {
        Ok(())
    } else {
        Err(Pdf2MdError::NotAPdf {
            magic: bytes.iter().take(PDF_MAGIC.len()).copied().collect(),
        })
    }
}

/// Split `bytes` into single-page PDFs, in page order.
///
/// # Errors
/// Parse errors only: [`Pdf2MdError::NotAPdf`], [`Pdf2MdError::CorruptPdf`]
/// or [`Pdf2MdError::PasswordRequired`].
pub async fn split_pages<B>(bytes: B) -> Result<Vec<Vec<u8>>, Pdf2MdError>
where
    B: AsRef<[u8]> + Send + 'static,
{
    tokio::task::spawn_blocking(move || split_pages_blocking(bytes.as_ref()))
        .await
        .map_err(|e| Pdf2MdError::Internal(format!("Split task panicked: {}", e)))?
}

/// Blocking implementation of [`split_pages`].
///
/// Cost is linear in the objects each page reaches, so a long document with
/// small pages splits in time proportional to its page count.
pub fn split_pages_blocking(bytes: &[u8]) -> Result<Vec<Vec<u8>>, Pdf2MdError> {
    let source = load_document(bytes)?;

    // `get_pages` is keyed by 1-based page number in ascending order.
    let page_ids: Vec<ObjectId> = source.get_pages().into_values().collect();
    info!("Splitting PDF: {} pages", page_ids.len());

    let extractor = PageExtractor::new(&source, &page_ids);
    let mut pages = Vec::with_capacity(page_ids.len());
    for (index, &page_id) in page_ids.iter().enumerate() {
        let mut single = extractor.extract(page_id)?;

        let mut buf = Vec::new();
        single.save_to(&mut buf).map_err(|e| {
            Pdf2MdError::Internal(format!("Failed to serialise page {}: {}", index + 1, e))
        })?;
        debug!("Page {} → {} bytes", index + 1, buf.len());
        pages.push(buf);
    }

    Ok(pages)
}

/// Number of pages in `bytes` without splitting.
pub fn page_count(bytes: &[u8]) -> Result<usize, Pdf2MdError> {
    Ok(load_document(bytes)?.get_pages().len())
}

fn load_document(bytes: &[u8]) -> Result<Document, Pdf2MdError> {
    check_pdf_magic(bytes)?;

    let mut doc = Document::load_mem(bytes).map_err(|e| {
        let detail = e.to_string();
        if detail.to_lowercase().contains("encrypt") {
            Pdf2MdError::PasswordRequired
        } else {
            Pdf2MdError::CorruptPdf { detail }
        }
    })?;

    if doc.is_encrypted() {
        doc.decrypt("").map_err(|e| match e {
            lopdf::Error::Decryption(DecryptionError::IncorrectPassword) => {
                Pdf2MdError::PasswordRequired
            }
            other => Pdf2MdError::CorruptPdf {
                detail: format!("cannot decrypt: {}", other),
            },
        })?;
        debug!("Opened encrypted PDF with the empty user password");
    }
    Ok(doc)
}

/// Copies single pages out of a loaded document.
struct PageExtractor<'a> {
    source: &'a Document,
    /// Every page and intermediate page-tree node of the source.
    page_tree: HashSet<ObjectId>,
}

impl<'a> PageExtractor<'a> {
    fn new(source: &'a Document, page_ids: &[ObjectId]) -> Self {
        let mut page_tree: HashSet<ObjectId> = HashSet::with_capacity(page_ids.len());
        for &page_id in page_ids {
            let mut next = Some(page_id);
            let mut depth = 0;
            while let Some(id) = next {
                if !page_tree.insert(id) || depth > MAX_TREE_DEPTH {
                    break;
                }
                next = source
                    .get_dictionary(id)
                    .and_then(|node| node.get(b"Parent"))
                    .and_then(Object::as_reference)
                    .ok();
                depth += 1;
            }
        }
        Self { source, page_tree }
    }

    /// A standalone document holding `page_id` and what it references.
    fn extract(&self, page_id: ObjectId) -> Result<Document, Pdf2MdError> {
        let mut out = Document::with_version(self.source.version.clone());
        let pages_id = out.new_object_id();
        let catalog_id = out.new_object_id();
        let new_page_id = out.new_object_id();

        let mut ids: HashMap<ObjectId, ObjectId> = HashMap::new();
        ids.insert(page_id, new_page_id);
        let mut queue: VecDeque<ObjectId> = VecDeque::new();

        let mut page = Object::Dictionary(self.flatten_page(page_id)?);
        self.remap(&mut page, page_id, &mut out, &mut ids, &mut queue);
        if let Object::Dictionary(dict) = &mut page {
            dict.set("Parent", pages_id);
        }
        out.objects.insert(new_page_id, page);

        while let Some(old_id) = queue.pop_front() {
            let new_id = ids[&old_id];
            let mut object = self
                .source
                .objects
                .get(&old_id)
                .cloned()
                .unwrap_or(Object::Null);
            self.remap(&mut object, page_id, &mut out, &mut ids, &mut queue);
            out.objects.insert(new_id, object);
        }

        out.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => vec![Object::Reference(new_page_id)],
                "Count" => 1,
            }),
        );
        out.objects.insert(
            catalog_id,
            Object::Dictionary(dictionary! {
                "Type" => "Catalog",
                "Pages" => pages_id,
            }),
        );
        out.trailer.set("Root", catalog_id);
        Ok(out)
    }

    /// The page dictionary with inherited attributes made explicit and its
    /// `/Parent` link removed.
    fn flatten_page(&self, page_id: ObjectId) -> Result<Dictionary, Pdf2MdError> {
        let mut page = self
            .source
            .get_dictionary(page_id)
            .map_err(|e| Pdf2MdError::CorruptPdf {
                detail: format!("page object {:?}: {}", page_id, e),
            })?
            .clone();

        let mut parent = page.get(b"Parent").and_then(Object::as_reference).ok();
        let mut depth = 0;
        while let Some(node_id) = parent {
            let Ok(node) = self.source.get_dictionary(node_id) else {
                break;
            };
            for key in INHERITABLE {
                if !page.has(key) {
                    if let Ok(value) = node.get(key) {
                        page.set(key.to_vec(), value.clone());
                    }
                }
            }
            depth += 1;
            if depth > MAX_TREE_DEPTH {
                break;
            }
            parent = node.get(b"Parent").and_then(Object::as_reference).ok();
        }

        page.remove(b"Parent");
        Ok(page)
    }

    /// Rewrite references in `object` to ids of the output document, queueing
    /// objects seen for the first time. Page-tree references other than the
    /// kept page become `null`.
    fn remap(
        &self,
        object: &mut Object,
        keep: ObjectId,
        out: &mut Document,
        ids: &mut HashMap<ObjectId, ObjectId>,
        queue: &mut VecDeque<ObjectId>,
    ) {
        match object {
            Object::Reference(id) => {
                let old_id = *id;
                if old_id != keep && self.page_tree.contains(&old_id) {
                    *object = Object::Null;
                    return;
                }
                let new_id = *ids.entry(old_id).or_insert_with(|| {
                    queue.push_back(old_id);
                    out.new_object_id()
                });
                *object = Object::Reference(new_id);
            }
            Object::Array(items) => {
                for item in items.iter_mut() {
                    self.remap(item, keep, out, ids, queue);
                }
            }
            Object::Dictionary(dict) => {
                for (_, value) in dict.iter_mut() {
                    self.remap(value, keep, out, ids, queue);
                }
            }
            Object::Stream(stream) => {
                for (_, value) in stream.dict.iter_mut() {
                    self.remap(value, keep, out, ids, queue);
                }
            }
            _ => {}
        }
    }
}
