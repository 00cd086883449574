pub mod ports;
pub mod services;
pub mod shared;

pub use services::{
    FeedPaginator, InteractionService, PostSearchCoordinator, PostService, SavedPostService,
    UserService,
};
