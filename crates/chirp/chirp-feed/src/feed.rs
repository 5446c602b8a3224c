//! The shared, timestamp-ordered feed.
//!
//! Posts live in a singly linked chain ordered by descending timestamp
//! (most recent first). Each node is owned by its predecessor; the chain's
//! `head` link plays the role of the sentinel's `next`. Splicing and
//! unlinking move ownership of the tail of the chain, so the `next`
//! relation is never aliased mutably.
//!
//! Every operation goes through the feed's reader/writer lock:
//!
//! | operation  | access |
//! |------------|--------|
//! | `add`      | writer |
//! | `remove`   | writer |
//! | `contains` | reader |
//! | `lists`    | reader |
//!
//! A reader therefore never observes a half-spliced chain.

use chirp_sync::{DEFAULT_READER_CAP, RwLock};

use crate::post::Post;

type Link = Option<Box<Node>>;

struct Node {
    post: Post,
    next: Link,
}

#[derive(Default)]
struct Chain {
    head: Link,
}

impl Chain {
    fn iter(&self) -> impl Iterator<Item = &Post> {
        std::iter::successors(self.head.as_deref(), |node| node.next.as_deref()).map(|node| &node.post)
    }

    /// Returns the link holding the first post with a timestamp `<= timestamp`,
    /// or the empty link at the end of the chain.
    fn seek_mut(&mut self, timestamp: f64) -> &mut Link {
        let mut cursor = &mut self.head;
        while cursor
            .as_ref()
            .is_some_and(|node| node.post.timestamp > timestamp)
        {
            if let Some(node) = cursor {
                cursor = &mut node.next;
            }
        }
        cursor
    }
}

impl Drop for Chain {
    // Unlink iteratively; the default drop would recurse once per post.
    fn drop(&mut self) {
        let mut link = self.head.take();
        while let Some(mut node) = link {
            link = node.next.take();
        }
    }
}

/// A feed of posts, safe to share between threads.
pub struct Feed {
    chain: RwLock<Chain>,
}

impl Feed {
    /// Creates an empty feed whose lock admits the default number of readers.
    pub fn new() -> Self {
        Self::with_reader_cap(DEFAULT_READER_CAP)
    }

    pub fn with_reader_cap(reader_cap: usize) -> Self {
        Self {
            chain: RwLock::with_reader_cap(Chain::default(), reader_cap),
        }
    }

    /// Inserts a post right before the first post that is not more recent.
    ///
    /// The caller guarantees `timestamp` is not already present.
    pub fn add(&self, body: impl Into<String>, timestamp: f64) {
        let post = Post::new(body, timestamp);
        let mut chain = self.chain.write();
        let slot = chain.seek_mut(timestamp);
        let next = slot.take();
        *slot = Some(Box::new(Node { post, next }));
    }

    /// Unlinks the post with exactly `timestamp`.
    ///
    /// Returns `false` and leaves the feed untouched when there is no match.
    pub fn remove(&self, timestamp: f64) -> bool {
        let mut chain = self.chain.write();
        let slot = chain.seek_mut(timestamp);
        if !slot
            .as_ref()
            .is_some_and(|node| node.post.timestamp == timestamp)
        {
            return false;
        }
        if let Some(mut node) = slot.take() {
            *slot = node.next.take();
        }
        true
    }

    pub fn contains(&self, timestamp: f64) -> bool {
        self.chain.read().iter().any(|post| post.timestamp == timestamp)
    }

    /// Copies every post, most recent first.
    ///
    /// The copy is taken under the read lock and stays valid after it is
    /// released.
    pub fn lists(&self) -> Vec<Post> {
        self.chain.read().iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.chain.read().iter().count()
    }

    pub fn is_empty(&self) -> bool {
        self.chain.read().head.is_none()
    }

    pub fn reader_cap(&self) -> usize {
        self.chain.raw().reader_cap()
    }
}

impl Default for Feed {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Feed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.chain.read().iter()).finish()
    }
}
