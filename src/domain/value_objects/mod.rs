pub mod like_set;

pub use like_set::LikeSet;
