//! Keyset pagination for `OrderedCollection` endpoints.
//!
//! Callers fetch [`Paginator::fetch_size`] rows (the page size plus one
//! probe row): newest first below an `until` cursor, or oldest first above a
//! `since` cursor. [`Paginator::page`] drops the probe and orders the page
//! newest first.

use url::form_urlencoded;

/// Page size of followers and following collections.
pub const FOLLOW_PAGE_LIMIT: usize = 10;

/// Page size of outboxes.
pub const OUTBOX_PAGE_LIMIT: usize = 20;

/// Lowest possible id, used for the outbox `last` link.
pub const MIN_ID: &str = "000000000000000000000000";

/// How cursors appear in collection URLs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorStyle {
    /// `?page=true&cursor=<id>`, forward only.
    Cursor,
    /// `?page=true&until_id=<id>` forward, `&since_id=<id>` backward.
    SinceUntil,
}

/// Position requested by the client.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Cursor {
    #[default]
    Start,
    /// Items older than the id.
    Until(String),
    /// Items newer than the id.
    Since(String),
}

impl Cursor {
    #[must_use]
    pub fn until_id(&self) -> Option<&str> {
        match self {
            Self::Until(id) => Some(id),
            _ => None,
        }
    }

    #[must_use]
    pub fn since_id(&self) -> Option<&str> {
        match self {
            Self::Since(id) => Some(id),
            _ => None,
        }
    }
}

/// Summary returned when no page is requested.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionIndex {
    pub id: String,
    pub total_items: u64,
    pub first: String,
    pub last: Option<String>,
}

/// One page of a collection, newest first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionPage<T> {
    pub id: String,
    pub part_of: String,
    pub total_items: u64,
    pub ordered_items: Vec<T>,
    pub next: Option<String>,
    pub prev: Option<String>,
}

impl<T> CollectionPage<T> {
    /// Render the items, keeping links and counts.
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> CollectionPage<U> {
        CollectionPage {
            id: self.id,
            part_of: self.part_of,
            total_items: self.total_items,
            ordered_items: self.ordered_items.into_iter().map(f).collect(),
            next: self.next,
            prev: self.prev,
        }
    }

    /// Like [`CollectionPage::map`], dropping items that render to `None`.
    pub fn filter_map<U>(self, f: impl FnMut(T) -> Option<U>) -> CollectionPage<U> {
        CollectionPage {
            id: self.id,
            part_of: self.part_of,
            total_items: self.total_items,
            ordered_items: self.ordered_items.into_iter().filter_map(f).collect(),
            next: self.next,
            prev: self.prev,
        }
    }
}

/// Page builder for one collection type.
#[derive(Debug, Clone, Copy)]
pub struct Paginator {
    limit: usize,
    style: CursorStyle,
}

impl Paginator {
    /// Followers and following.
    #[must_use]
    pub const fn follows() -> Self {
        Self {
            limit: FOLLOW_PAGE_LIMIT,
            style: CursorStyle::Cursor,
        }
    }

    /// Outboxes.
    #[must_use]
    pub const fn outbox() -> Self {
        Self {
            limit: OUTBOX_PAGE_LIMIT,
            style: CursorStyle::SinceUntil,
        }
    }

    #[must_use]
    pub const fn limit(&self) -> usize {
        self.limit
    }

    /// Rows to fetch for one page.
    #[must_use]
    pub const fn fetch_size(&self) -> u64 {
        self.limit as u64 + 1
    }

    /// The collection summary.
    #[must_use]
    pub fn index(&self, part_of: &str, total_items: u64) -> CollectionIndex {
        CollectionIndex {
            id: part_of.to_string(),
            total_items,
            first: format!("{part_of}?page=true"),
            last: match self.style {
                CursorStyle::Cursor => None,
                CursorStyle::SinceUntil => Some(format!("{part_of}?page=true&since_id={MIN_ID}")),
            },
        }
    }

    /// Build a page from fetched `rows`, identified by `id_of`.
    pub fn page<T>(
        &self,
        part_of: &str,
        total_items: u64,
        cursor: &Cursor,
        mut rows: Vec<T>,
        id_of: impl Fn(&T) -> &str,
    ) -> CollectionPage<T> {
        let has_more = rows.len() > self.limit;
        rows.truncate(self.limit);

        let (next, prev) = match cursor {
            Cursor::Since(_) => {
                rows.reverse();
                let prev = if has_more {
                    rows.first().map(&id_of)
                } else {
                    None
                };
                (rows.last().map(&id_of), prev)
            }
            Cursor::Start | Cursor::Until(_) => {
                let next = if has_more {
                    rows.last().map(&id_of)
                } else {
                    None
                };
                let prev = match cursor {
                    Cursor::Until(_) => rows.first().map(&id_of),
                    _ => None,
                };
                (next, prev)
            }
        };

        let next = next.map(|id| self.link(part_of, "next", id));
        let prev = match self.style {
            CursorStyle::Cursor => None,
            CursorStyle::SinceUntil => prev.map(|id| self.link(part_of, "prev", id)),
        };

        CollectionPage {
            id: self.page_id(part_of, cursor),
            part_of: part_of.to_string(),
            total_items,
            ordered_items: rows,
            next,
            prev,
        }
    }

    fn link(&self, part_of: &str, rel: &str, id: &str) -> String {
        let id = encode(id);
        match (self.style, rel) {
            (CursorStyle::Cursor, _) => format!("{part_of}?page=true&cursor={id}"),
            (CursorStyle::SinceUntil, "prev") => format!("{part_of}?page=true&since_id={id}"),
            (CursorStyle::SinceUntil, _) => format!("{part_of}?page=true&until_id={id}"),
        }
    }

    fn page_id(&self, part_of: &str, cursor: &Cursor) -> String {
        match (self.style, cursor) {
            (_, Cursor::Start) => format!("{part_of}?page=true"),
            (CursorStyle::Cursor, Cursor::Until(id) | Cursor::Since(id)) => {
                format!("{part_of}?page=true&cursor={}", encode(id))
            }
            (CursorStyle::SinceUntil, Cursor::Until(id)) => {
                format!("{part_of}?page=true&until_id={}", encode(id))
            }
            (CursorStyle::SinceUntil, Cursor::Since(id)) => {
                format!("{part_of}?page=true&since_id={}", encode(id))
            }
        }
    }
}

/// Query-escape a cursor id.
fn encode(id: &str) -> String {
    form_urlencoded::byte_serialize(id.as_bytes()).collect()
}

/// Extract the decoded cursor id from a link produced by [`Paginator`].
#[must_use]
pub fn cursor_of(link: &str) -> Option<String> {
    let (_, query) = link.split_once('?')?;
    form_urlencoded::parse(query.as_bytes())
        .find(|(name, _)| matches!(name.as_ref(), "cursor" | "until_id" | "since_id"))
        .map(|(_, value)| value.into_owned())
}
