//! The normalised post type shared by every forum client.
//!
//! `PostRecord` is what the rest of the application sees.  Clients hand
//! back [`RawItem`]s in whatever shape the remote offers, and the fetch
//! controller turns each one into a `PostRecord` via [`From`].
//!
//! ## For contributors
//!
//! If you are adding a new forum client you do **not** need to modify this
//! file.  Fill in `RawItem` in your client's `list_newest()` and leave the
//! author as `None` when the remote has none.

use std::fmt;

use super::RawItem;

/// Placeholder author for posts whose author is absent or deleted.
pub const UNKNOWN_AUTHOR: &str = "Unknown";

/// A single post, ready to present.
///
/// Value type: produced fresh per fetch and never mutated afterwards.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct PostRecord {
    /// Post headline.
    pub title: String,

    /// Author's username, or [`UNKNOWN_AUTHOR`].  Never empty.
    pub author: String,

    /// Net upvotes at fetch time.
    pub score: i64,
}

impl From<RawItem> for PostRecord {
    fn from(item: RawItem) -> Self {
        let author = item
            .author
            .filter(|name| !name.trim().is_empty())
            .unwrap_or_else(|| UNKNOWN_AUTHOR.to_string());

        Self {
            title: item.title,
            author,
            score: item.score,
        }
    }
}

impl fmt::Display for PostRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Title: {} | Author: {} | Upvotes: {}",
            self.title, self.author, self.score
        )
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
