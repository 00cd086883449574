pub mod feed_paginator;
pub mod interaction_service;
pub mod post_search;
pub mod post_service;
pub mod saved_post_service;
pub mod user_service;

pub use feed_paginator::{FeedPaginator, LoadOutcome, PaginationStatus};
pub use interaction_service::{
    InteractionKind, InteractionNotice, InteractionService, InteractionSnapshot, SaveToggle,
};
pub use post_search::{PostSearchCoordinator, SearchResults};
pub use post_service::{FeedPage, PostService};
pub use saved_post_service::SavedPostService;
pub use user_service::UserService;
