use std::fmt;

/// キャッシュキーの種別。`invalidate_scope` はこの単位でまとめて無効化する。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryScope {
    CurrentUser,
    UserById,
    Users,
    RecentPosts,
    PostById,
    UserPosts,
    FeedPage,
    SearchPosts,
    SavedPosts,
}

impl QueryScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueryScope::CurrentUser => "current_user",
            QueryScope::UserById => "user_by_id",
            QueryScope::Users => "users",
            QueryScope::RecentPosts => "recent_posts",
            QueryScope::PostById => "post_by_id",
            QueryScope::UserPosts => "user_posts",
            QueryScope::FeedPage => "feed_page",
            QueryScope::SearchPosts => "search_posts",
            QueryScope::SavedPosts => "saved_posts",
        }
    }
}

impl fmt::Display for QueryScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// スコープとパラメータからなるキャッシュキー
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueryKey {
    pub scope: QueryScope,
    pub params: Vec<String>,
}

impl QueryKey {
    pub fn new(scope: QueryScope, params: Vec<String>) -> Self {
        Self { scope, params }
    }

    pub fn current_user() -> Self {
        Self::new(QueryScope::CurrentUser, Vec::new())
    }

    pub fn user_by_id(user_id: &str) -> Self {
        Self::new(QueryScope::UserById, vec![user_id.to_string()])
    }

    pub fn users(limit: usize) -> Self {
        Self::new(QueryScope::Users, vec![limit.to_string()])
    }

    pub fn recent_posts() -> Self {
        Self::new(QueryScope::RecentPosts, Vec::new())
    }

    pub fn post_by_id(post_id: &str) -> Self {
        Self::new(QueryScope::PostById, vec![post_id.to_string()])
    }

    pub fn user_posts(user_id: &str) -> Self {
        Self::new(QueryScope::UserPosts, vec![user_id.to_string()])
    }

    /// 先頭ページは cursor なし
    pub fn feed_page(cursor: Option<&str>) -> Self {
        Self::new(
            QueryScope::FeedPage,
            cursor.map(|c| vec![c.to_string()]).unwrap_or_default(),
        )
    }

    pub fn search_posts(term: &str) -> Self {
        Self::new(QueryScope::SearchPosts, vec![term.to_string()])
    }

    pub fn saved_posts(user_id: &str) -> Self {
        Self::new(QueryScope::SavedPosts, vec![user_id.to_string()])
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.params.is_empty() {
            write!(f, "{}", self.scope)
        } else {
            write!(f, "{}:{}", self.scope, self.params.join(","))
        }
    }
}
