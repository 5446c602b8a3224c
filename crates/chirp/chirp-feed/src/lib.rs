#![forbid(unsafe_code)]

mod feed;
mod post;

pub use feed::Feed;
pub use post::Post;
