//! Conversion from database entities to served `ActivityPub` documents.

#![allow(missing_docs)]

mod collection;
mod misc;
mod note;
mod user;

pub use collection::{render_featured, render_index, render_page};
pub use misc::{EmojiToApEmoji, render_follow, render_like};
pub use note::{NoteLinks, NoteToApNote, render_content};
pub use user::UserToApPerson;
