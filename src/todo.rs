use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::datetime::{deserialize_optional_timestamp, deserialize_timestamp};

/// タスクのタイマーの状態。
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimerStatus {
    #[default]
    Stopped,
    Running,
    Paused,
}

impl TimerStatus {
    /// 保存時の文字列表現を返す。
    pub fn as_str(self) -> &'static str {
        match self {
            TimerStatus::Stopped => "stopped",
            TimerStatus::Running => "running",
            TimerStatus::Paused => "paused",
        }
    }
}

impl fmt::Display for TimerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `todos`テーブルの1レコード。
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct Todo {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub completed: bool,
    #[serde(deserialize_with = "deserialize_timestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(default, deserialize_with = "deserialize_optional_timestamp")]
    pub due_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub elapsed_time: u64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub timer_status: TimerStatus,
    #[serde(default, deserialize_with = "deserialize_optional_timestamp")]
    pub timer_started_at: Option<DateTime<Utc>>,
}

/// 新しく作成するタスク。
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct NewTodo {
    pub title: String,
    pub user_id: String,
    pub due_date: Option<DateTime<Utc>>,
}

/// `update`で送信する部分的な更新内容。
///
/// `None`のフィールドは送信しない。`timer_started_at`の`Some(None)`は`null`として送信される。
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct TodoPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub elapsed_time: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timer_status: Option<TimerStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timer_started_at: Option<Option<DateTime<Utc>>>,
}

impl TodoPatch {
    /// 完了状態を反転させる更新内容を返す。
    pub fn toggle_completed(todo: &Todo) -> Self {
        Self {
            completed: Some(!todo.completed),
            ..Self::default()
        }
    }
}

/// `null`をデフォルト値として読み込む。
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
