//! Collection rendering.

use crate::objects::{OrderedCollection, OrderedCollectionPage};
use crate::pagination::{CollectionIndex, CollectionPage};

/// Summary `OrderedCollection` without items.
#[must_use]
pub fn render_index(index: CollectionIndex) -> OrderedCollection<()> {
    OrderedCollection {
        kind: "OrderedCollection",
        id: index.id,
        total_items: index.total_items,
        first: Some(index.first),
        last: index.last,
        ordered_items: None,
    }
}

/// `OrderedCollectionPage` from a built page.
#[must_use]
pub fn render_page<T>(page: CollectionPage<T>) -> OrderedCollectionPage<T> {
    OrderedCollectionPage {
        kind: "OrderedCollectionPage",
        id: page.id,
        part_of: page.part_of,
        total_items: page.total_items,
        ordered_items: page.ordered_items,
        prev: page.prev,
        next: page.next,
    }
}

/// Unpaged `OrderedCollection` holding every item.
#[must_use]
pub fn render_featured<T>(id: String, items: Vec<T>) -> OrderedCollection<T> {
    OrderedCollection {
        kind: "OrderedCollection",
        id,
        total_items: items.len() as u64,
        first: None,
        last: None,
        ordered_items: Some(items),
    }
}
