pub mod entities;
pub mod value_objects;

pub use entities::{NewPost, Post, PostUpdate, ProfileUpdate, SaveRecord, User};
pub use value_objects::LikeSet;
