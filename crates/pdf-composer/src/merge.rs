use crate::error::ComposerError;
use lopdf::{Document, Object, ObjectId};
use std::collections::HashMap;

/// Copies objects from one document into another, remapping references.
struct ObjectCopier<'a> {
    source_doc: &'a Document,
    target_doc: &'a mut Document,
    id_map: HashMap<ObjectId, ObjectId>,
}

impl<'a> ObjectCopier<'a> {
    fn new(source_doc: &'a Document, target_doc: &'a mut Document) -> Self {
        Self { source_doc, target_doc, id_map: HashMap::new() }
    }

    /// Copies a page dictionary without its `/Parent` link, so the source page
    /// tree (and every sibling page hanging off it) is not dragged along.
    fn copy_page(&mut self, page_id: ObjectId) -> Result<ObjectId, lopdf::Error> {
        let mut page = self.source_doc.get_dictionary(page_id)?.clone();
        page.remove(b"Parent");
        let new_id = self.target_doc.add_object(Object::Null);
        self.id_map.insert(page_id, new_id);
        let remapped = self.remap_references(Object::Dictionary(page))?;
        self.replace(new_id, remapped)?;
        Ok(new_id)
    }

    fn copy_object(&mut self, source_id: ObjectId) -> Result<ObjectId, lopdf::Error> {
        if let Some(target_id) = self.id_map.get(&source_id) {
            return Ok(*target_id);
        }

        // Reserve the id before recursing so reference cycles terminate.
        let new_id = self.target_doc.add_object(Object::Null);
        self.id_map.insert(source_id, new_id);

        let obj = self.source_doc.get_object(source_id)?.clone();
        let new_obj = self.remap_references(obj)?;
        self.replace(new_id, new_obj)?;
        Ok(new_id)
    }

    fn replace(&mut self, id: ObjectId, obj: Object) -> Result<(), lopdf::Error> {
        match self.target_doc.objects.get_mut(&id) {
            Some(slot) => {
                *slot = obj;
                Ok(())
            }
            None => Err(lopdf::Error::ObjectNotFound(id)),
        }
    }

    fn remap_references(&mut self, obj: Object) -> Result<Object, lopdf::Error> {
        match obj {
            Object::Reference(id) => Ok(Object::Reference(self.copy_object(id)?)),
            Object::Array(arr) => {
                let new_arr = arr
                    .into_iter()
                    .map(|o| self.remap_references(o))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Object::Array(new_arr))
            }
            Object::Dictionary(mut dict) => {
                for (_, value) in dict.iter_mut() {
                    *value = self.remap_references(value.clone())?;
                }
                Ok(Object::Dictionary(dict))
            }
            Object::Stream(mut stream) => {
                for (_, value) in stream.dict.iter_mut() {
                    *value = self.remap_references(value.clone())?;
                }
                Ok(Object::Stream(stream))
            }
            _ => Ok(obj),
        }
    }
}

/// Appends every page of `source` to `target`, preserving page order.
pub fn merge_documents(target: &mut Document, source: Document) -> Result<(), ComposerError> {
    let source_pages = source.get_pages();
    if source_pages.is_empty() {
        return Ok(());
    }

    let mut copier = ObjectCopier::new(&source, target);
    let mut new_page_ids = Vec::with_capacity(source_pages.len());
    // get_pages is keyed by 1-based page number, so iteration is already in order.
    for page_id in source_pages.values() {
        new_page_ids.push(copier.copy_page(*page_id)?);
    }

    let root_id = target.trailer.get(b"Root")?.as_reference()?;
    let pages_id = target.get_dictionary(root_id)?.get(b"Pages")?.as_reference()?;
    let pages_dict = target.get_object_mut(pages_id)?.as_dict_mut()?;

    let mut kids = pages_dict.get(b"Kids")?.as_array()?.clone();
    let original_count = pages_dict.get(b"Count")?.as_i64()?;
    kids.extend(new_page_ids.iter().map(|id| Object::Reference(*id)));
    pages_dict.set("Kids", Object::Array(kids));
    pages_dict.set("Count", original_count + new_page_ids.len() as i64);

    for page_id in new_page_ids {
        if let Ok(Object::Dictionary(page_dict)) = target.get_object_mut(page_id) {
            page_dict.set("Parent", Object::Reference(pages_id));
        }
    }

    Ok(())
}

/// Merges serialized PDFs in order into one serialized document.
pub fn merge_pdf_bytes(documents: &[Vec<u8>]) -> Result<Vec<u8>, ComposerError> {
    let (first, rest) = documents.split_first().ok_or(ComposerError::Empty)?;
    let mut target = Document::load_mem(first)?;
    for (i, bytes) in rest.iter().enumerate() {
        let source = Document::load_mem(bytes)?;
        log::debug!("Merging document {} ({} pages)", i + 2, source.get_pages().len());
        merge_documents(&mut target, source)?;
    }

    let mut out = Vec::new();
    target.save_to(&mut out)?;
    Ok(out)
}
