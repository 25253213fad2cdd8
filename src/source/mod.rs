//! Forum client abstraction layer.
//!
//! This module defines the [`ForumClient`] trait, the raw [`RawItem`] a
//! client returns, and the normalised [`PostRecord`].  Concrete clients live
//! in sub-modules (currently only [`reddit`]).
//!
//! ## For contributors — adding a new client
//!
//! 1. Create a new file in this directory (e.g. `lemmy.rs`).
//! 2. Define a struct (e.g. `LemmyClient`) and implement [`ForumClient`] for it.
//! 3. Map the remote's throttling response to [`FetchError::RateLimited`];
//!    that is the only error the fetch controller retries.
//! 4. Add `mod lemmy;` below and re-export your struct in the `pub use` block.
//!
//! The retry loop and presenter are client-agnostic.

mod post_record;
mod reddit;

pub use post_record::PostRecord;
pub use reddit::RedditClient;

use async_trait::async_trait;

use crate::error::FetchError;

/// One listing entry as the remote returned it, before normalisation.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct RawItem {
    pub title: String,
    /// `None` when the remote has no (or a deleted) author.
    pub author: Option<String>,
    pub score: i64,
}

/// Trait that every forum client must implement.
///
/// A client is owned by exactly one fetch controller, hence `&mut self`:
/// implementations may refresh tokens or other session state in place.
///
/// ## Implementing a new client
///
/// ```ignore
/// pub struct MyClient { /* session fields */ }
///
/// #[async_trait]
/// impl ForumClient for MyClient {
///     fn name(&self) -> &str { "my-forum" }
///
///     async fn list_newest(&mut self, resource: &str, limit: u32)
///         -> Result<Vec<RawItem>, FetchError>
///     {
///         // Perform HTTP, then convert into RawItem values.
///         todo!()
///     }
/// }
/// ```
#[async_trait]
pub trait ForumClient: Send {
    /// Human-readable label used in log events.
    fn name(&self) -> &str;

    /// List at most `limit` of the newest items in `resource`, newest first.
    ///
    /// A throttled request must fail with [`FetchError::RateLimited`].
    async fn list_newest(
        &mut self,
        resource: &str,
        limit: u32,
    ) -> Result<Vec<RawItem>, FetchError>;
}
