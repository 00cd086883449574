pub mod post;
pub mod save_record;
pub mod user;

pub use post::{parse_tags, NewPost, Post, PostUpdate};
pub use save_record::SaveRecord;
pub use user::{ProfileUpdate, User};
