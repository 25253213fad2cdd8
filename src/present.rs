//! Post presentation.
//!
//! Output goes through the log, one `info` line per post, so it shares the
//! timestamped format of every other event.  An empty result produces a
//! single warning; it cannot tell an empty subreddit from a failed fetch,
//! the error (if any) having already been logged by the fetch controller.

use tracing::{info, warn};

use crate::source::PostRecord;

pub const EMPTY_WARNING: &str = "No posts found or an error occurred.";

/// Log `posts`, or a warning if there are none.
pub fn present(posts: &[PostRecord]) {
    if posts.is_empty() {
        warn!("{EMPTY_WARNING}");
        return;
    }
    for line in lines(posts) {
        info!("{line}");
    }
}

/// The lines [`present`] logs, in order.
pub fn lines(posts: &[PostRecord]) -> Vec<String> {
    posts.iter().map(PostRecord::to_string).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn post(title: &str, author: &str, score: i64) -> PostRecord {
        PostRecord {
            title: title.to_string(),
            author: author.to_string(),
            score,
        }
    }

    #[test]
    fn one_line_per_post_in_order() {
        let posts = vec![post("A", "Unknown", 10), post("B", "bob", 5)];
        assert_eq!(
            lines(&posts),
            vec![
                "Title: A | Author: Unknown | Upvotes: 10",
                "Title: B | Author: bob | Upvotes: 5",
            ]
        );
    }

    #[test]
    fn empty_input_has_no_lines() {
        assert!(lines(&[]).is_empty());
        // Logs the warning; must not panic without a subscriber.
        present(&[]);
    }
}
