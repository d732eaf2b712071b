use crate::todo::Todo;

/// グラフのラベルとして表示するタイトルの最大文字数。
const MAX_LABEL_CHARS: usize = 20;

/// タスクごとの計測時間の内訳の1要素。
#[derive(Clone, Debug, PartialEq)]
pub struct TimeSlice {
    /// 表示用に切り詰めたタイトル。
    pub name: String,
    /// 切り詰める前のタイトル。
    pub full_name: String,
    /// 累積秒数。
    pub value: u64,
    /// 全体に占める割合（0.0〜1.0）。
    pub ratio: f64,
}

/// 計測時間の集計結果。
#[derive(Clone, Debug, PartialEq)]
pub struct TimeStats {
    pub total: u64,
    pub slices: Vec<TimeSlice>,
}

impl TimeStats {
    /// タスク一覧から集計する。
    ///
    /// 合計はすべてのタスクの累積時間の和とし、内訳は累積時間が0のタスクを除く。
    pub fn from_todos(todos: &[Todo]) -> Self {
        let total: u64 = todos.iter().map(|todo| todo.elapsed_time).sum();
        let slices = todos
            .iter()
            .filter(|todo| todo.elapsed_time > 0)
            .map(|todo| TimeSlice {
                name: truncate_label(&todo.title),
                full_name: todo.title.clone(),
                value: todo.elapsed_time,
                ratio: todo.elapsed_time as f64 / total as f64,
            })
            .collect();

        Self { total, slices }
    }
}

/// 未完了・完了の件数。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TodoCounts {
    pub active: usize,
    pub completed: usize,
    pub total: usize,
}

impl TodoCounts {
    pub fn from_todos(todos: &[Todo]) -> Self {
        let completed = todos.iter().filter(|todo| todo.completed).count();
        Self {
            active: todos.len() - completed,
            completed,
            total: todos.len(),
        }
    }
}

/// 秒数を`1h 2m 5s`、`7m 0s`、`45s`のように表す。
pub fn format_duration(seconds: u64) -> String {
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    let secs = seconds % 60;

    if hours > 0 {
        format!("{}h {}m {}s", hours, minutes, secs)
    } else if minutes > 0 {
        format!("{}m {}s", minutes, secs)
    } else {
        format!("{}s", secs)
    }
}

fn truncate_label(title: &str) -> String {
    if title.chars().count() > MAX_LABEL_CHARS {
        let truncated: String = title.chars().take(MAX_LABEL_CHARS).collect();
        format!("{}...", truncated)
    } else {
        title.to_string()
    }
}
