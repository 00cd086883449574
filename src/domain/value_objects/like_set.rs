use serde::{Deserialize, Serialize};

/// 投稿にいいねしたユーザー ID の集合。
///
/// リモートストア上では配列として丸ごと上書きされるため、挿入順を保ったまま
/// 重複だけを排除して保持する。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<String>", into = "Vec<String>")]
pub struct LikeSet(Vec<String>);

impl LikeSet {
    pub fn new<I, S>(user_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut ids: Vec<String> = Vec::new();
        for id in user_ids {
            let id: String = id.into();
            if !id.is_empty() && !ids.contains(&id) {
                ids.push(id);
            }
        }
        Self(ids)
    }

    pub fn contains(&self, user_id: &str) -> bool {
        self.0.iter().any(|id| id == user_id)
    }

    /// `user_id` が含まれていれば取り除き、含まれていなければ末尾に追加した集合を返す。
    pub fn toggled(&self, user_id: &str) -> Self {
        if self.contains(user_id) {
            Self(self.0.iter().filter(|id| *id != user_id).cloned().collect())
        } else {
            let mut ids = self.0.clone();
            ids.push(user_id.to_string());
            Self(ids)
        }
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    pub fn iter(&self) -> impl Iterator<Item = &String> {
        self.0.iter()
    }
}

impl From<Vec<String>> for LikeSet {
    fn from(value: Vec<String>) -> Self {
        Self::new(value)
    }
}

impl From<LikeSet> for Vec<String> {
    fn from(value: LikeSet) -> Self {
        value.0
    }
}

impl FromIterator<String> for LikeSet {
    fn from_iter<T: IntoIterator<Item = String>>(iter: T) -> Self {
        Self::new(iter)
    }
}
