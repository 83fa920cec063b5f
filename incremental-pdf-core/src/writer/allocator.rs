//! Up-front object number reservation
//!
//! Every indirect object the document can ever contain gets its number before
//! the first byte of content exists, so any page can be written on its own and
//! every cross reference it makes is already known.

use crate::objects::ObjectId;

/// Object numbers reserved for one page
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageObjects {
    /// Background picture of a compound page
    pub background: ObjectId,
    /// Foreground text mask of a compound page
    pub mask: ObjectId,
    /// Image of a simple page
    pub image: ObjectId,
    pub contents: ObjectId,
    pub page: ObjectId,
}

/// The complete object number assignment of a document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectTable {
    pub catalog: ObjectId,
    pub pages: ObjectId,
    pub info: ObjectId,
    pub jbig2_globals: Vec<ObjectId>,
    /// Root of the outline tree, present when the outline is not empty
    pub outlines: Option<ObjectId>,
    pub outline_items: Vec<ObjectId>,
    pub page_objects: Vec<PageObjects>,
}

struct Counter(u32);

impl Counter {
    fn next(&mut self) -> ObjectId {
        let id = ObjectId::new(self.0, 0);
        self.0 += 1;
        id
    }
}

impl ObjectTable {
    /// Assign numbers in the fixed order: catalog, pages root, info, globals
    /// slots, outline root and items, then five slots per page.
    pub fn allocate(page_count: usize, globals_slots: usize, outline_items: usize) -> Self {
        let mut counter = Counter(1);

        let catalog = counter.next();
        let pages = counter.next();
        let info = counter.next();

        let jbig2_globals = (0..globals_slots).map(|_| counter.next()).collect();

        let (outlines, outline_items) = if outline_items > 0 {
            let root = counter.next();
            let items = (0..outline_items).map(|_| counter.next()).collect();
            (Some(root), items)
        } else {
            (None, Vec::new())
        };

        let page_objects = (0..page_count)
            .map(|_| PageObjects {
                background: counter.next(),
                mask: counter.next(),
                image: counter.next(),
                contents: counter.next(),
                page: counter.next(),
            })
            .collect();

        Self {
            catalog,
            pages,
            info,
            jbig2_globals,
            outlines,
            outline_items,
            page_objects,
        }
    }

    /// Highest reserved object number
    pub fn max_object(&self) -> u32 {
        self.page_objects
            .last()
            .map(|p| p.page)
            .or_else(|| self.outline_items.last().copied())
            .or(self.outlines)
            .or_else(|| self.jbig2_globals.last().copied())
            .unwrap_or(self.info)
            .number()
    }

    pub fn page_count(&self) -> usize {
        self.page_objects.len()
    }

    /// Object number of the globals stream at `index`, if one was reserved
    pub fn jbig2_globals_object(&self, index: usize) -> Option<ObjectId> {
        self.jbig2_globals.get(index).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allocation_order_without_outline() {
        let table = ObjectTable::allocate(2, 1, 0);
        assert_eq!(table.catalog.number(), 1);
        assert_eq!(table.pages.number(), 2);
        assert_eq!(table.info.number(), 3);
        assert_eq!(table.jbig2_globals, vec![ObjectId::new(4, 0)]);
        assert_eq!(table.outlines, None);
        assert!(table.outline_items.is_empty());

        let first = table.page_objects[0];
        assert_eq!(first.background.number(), 5);
        assert_eq!(first.mask.number(), 6);
        assert_eq!(first.image.number(), 7);
        assert_eq!(first.contents.number(), 8);
        assert_eq!(first.page.number(), 9);
        assert_eq!(table.page_objects[1].background.number(), 10);
        assert_eq!(table.max_object(), 14);
    }

    #[test]
    fn test_allocation_order_with_outline() {
        let table = ObjectTable::allocate(1, 2, 3);
        assert_eq!(
            table.jbig2_globals,
            vec![ObjectId::new(4, 0), ObjectId::new(5, 0)]
        );
        assert_eq!(table.outlines, Some(ObjectId::new(6, 0)));
        assert_eq!(
            table
                .outline_items
                .iter()
                .map(|id| id.number())
                .collect::<Vec<_>>(),
            vec![7, 8, 9]
        );
        assert_eq!(table.page_objects[0].background.number(), 10);
        assert_eq!(table.max_object(), 14);
    }

    #[test]
    fn test_allocation_is_deterministic() {
        assert_eq!(
            ObjectTable::allocate(7, 3, 4),
            ObjectTable::allocate(7, 3, 4)
        );
    }

    #[test]
    fn test_max_object_without_pages() {
        assert_eq!(ObjectTable::allocate(0, 0, 0).max_object(), 3);
        assert_eq!(ObjectTable::allocate(0, 2, 0).max_object(), 5);
        assert_eq!(ObjectTable::allocate(0, 0, 2).max_object(), 6);
    }

    #[test]
    fn test_globals_lookup() {
        let table = ObjectTable::allocate(1, 2, 0);
        assert_eq!(table.jbig2_globals_object(1), Some(ObjectId::new(5, 0)));
        assert_eq!(table.jbig2_globals_object(2), None);
        assert_eq!(table.page_count(), 1);
    }
}
