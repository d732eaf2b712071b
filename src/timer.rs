use std::fmt;

use chrono::{DateTime, Utc};
use log::warn;
use thiserror::Error;

use crate::todo::{TimerStatus, Todo, TodoPatch};

/// タイマーに対する操作。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TimerAction {
    Start,
    Pause,
    Stop,
}

impl fmt::Display for TimerAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TimerAction::Start => "start",
            TimerAction::Pause => "pause",
            TimerAction::Stop => "stop",
        };
        f.write_str(s)
    }
}

/// 定義されていない状態遷移を要求された場合のエラー。
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TimerError {
    #[error("Cannot {action} a timer that is {status}")]
    InvalidTransition {
        action: TimerAction,
        status: TimerStatus,
    },
}

/// タイマーの状態。`Running`の場合のみ計測開始時刻を持つ。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TimerState {
    Stopped,
    Running { started_at: DateTime<Utc> },
    Paused,
}

/// タスクごとのタイマー。
///
/// `elapsed`は確定済みの累積秒数で、計測中の区間は含まない。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Timer {
    pub elapsed: u64,
    pub state: TimerState,
}

impl Timer {
    /// 新しく作成されたタスクのタイマーを返す。
    pub fn new() -> Self {
        Self {
            elapsed: 0,
            state: TimerState::Stopped,
        }
    }

    /// 保存されているタスクのフィールドからタイマーを復元する。
    ///
    /// 開始時刻のない`running`は不整合なレコードなので、一時停止中として扱う。
    pub fn from_todo(todo: &Todo) -> Self {
        let state = match (todo.timer_status, todo.timer_started_at) {
            (TimerStatus::Running, Some(started_at)) => TimerState::Running { started_at },
            (TimerStatus::Running, None) => {
                warn!(
                    "Todo {} is running without timer_started_at; treating it as paused",
                    todo.id
                );
                TimerState::Paused
            }
            (TimerStatus::Paused, _) => TimerState::Paused,
            (TimerStatus::Stopped, _) => TimerState::Stopped,
        };

        Self {
            elapsed: todo.elapsed_time,
            state,
        }
    }

    /// 現在の状態を保存用の列挙値で返す。
    pub fn status(&self) -> TimerStatus {
        match self.state {
            TimerState::Stopped => TimerStatus::Stopped,
            TimerState::Running { .. } => TimerStatus::Running,
            TimerState::Paused => TimerStatus::Paused,
        }
    }

    /// 操作を適用した後のタイマーを返す。
    ///
    /// # Arguments
    ///
    /// * `action` - 適用する操作
    /// * `now` - 操作を行った時刻
    pub fn apply(&self, action: TimerAction, now: DateTime<Utc>) -> Result<Self, TimerError> {
        match action {
            TimerAction::Start => self.start(now),
            TimerAction::Pause => self.pause(now),
            TimerAction::Stop => self.stop(now),
        }
    }

    /// 計測を開始、または一時停止から再開する。
    pub fn start(&self, now: DateTime<Utc>) -> Result<Self, TimerError> {
        match self.state {
            TimerState::Stopped | TimerState::Paused => Ok(Self {
                elapsed: self.elapsed,
                state: TimerState::Running { started_at: now },
            }),
            TimerState::Running { .. } => Err(self.invalid(TimerAction::Start)),
        }
    }

    /// 計測中の区間を累積時間に加算して一時停止する。
    pub fn pause(&self, now: DateTime<Utc>) -> Result<Self, TimerError> {
        match self.state {
            TimerState::Running { started_at } => Ok(Self {
                elapsed: self.elapsed + seconds_between(started_at, now),
                state: TimerState::Paused,
            }),
            TimerState::Stopped | TimerState::Paused => Err(self.invalid(TimerAction::Pause)),
        }
    }

    /// 計測を終了する。一時停止中であれば累積時間は変わらない。
    pub fn stop(&self, now: DateTime<Utc>) -> Result<Self, TimerError> {
        match self.state {
            TimerState::Running { started_at } => Ok(Self {
                elapsed: self.elapsed + seconds_between(started_at, now),
                state: TimerState::Stopped,
            }),
            TimerState::Paused => Ok(Self {
                elapsed: self.elapsed,
                state: TimerState::Stopped,
            }),
            TimerState::Stopped => Err(self.invalid(TimerAction::Stop)),
        }
    }

    /// 指定時刻に表示する秒数を返す。保存されている値は変更しない。
    pub fn display_seconds(&self, now: DateTime<Utc>) -> u64 {
        match self.state {
            TimerState::Running { started_at } => self.elapsed + seconds_between(started_at, now),
            TimerState::Stopped | TimerState::Paused => self.elapsed,
        }
    }

    /// 現在の状態で利用できる操作と、その表示名を返す。
    pub fn available_actions(&self) -> Vec<(TimerAction, &'static str)> {
        match self.state {
            TimerState::Stopped => vec![(TimerAction::Start, "Start")],
            TimerState::Running { .. } => {
                vec![(TimerAction::Pause, "Pause"), (TimerAction::Stop, "Stop")]
            }
            TimerState::Paused => vec![(TimerAction::Start, "Resume"), (TimerAction::Stop, "Stop")],
        }
    }

    /// タイマー関連の列をすべて含む更新内容を返す。
    pub fn to_patch(&self) -> TodoPatch {
        let started_at = match self.state {
            TimerState::Running { started_at } => Some(started_at),
            TimerState::Stopped | TimerState::Paused => None,
        };

        TodoPatch {
            elapsed_time: Some(self.elapsed),
            timer_status: Some(self.status()),
            timer_started_at: Some(started_at),
            ..TodoPatch::default()
        }
    }

    fn invalid(&self, action: TimerAction) -> TimerError {
        TimerError::InvalidTransition {
            action,
            status: self.status(),
        }
    }
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}

/// 経過秒数を`H:MM:SS`、1時間未満の場合は`M:SS`で表す。
pub fn format_clock(seconds: u64) -> String {
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    let secs = seconds % 60;

    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, minutes, secs)
    } else {
        format!("{}:{:02}", minutes, secs)
    }
}

/// 2つの時刻の間の秒数を切り捨てで返す。時計が戻った場合は0とする。
fn seconds_between(from: DateTime<Utc>, to: DateTime<Utc>) -> u64 {
    u64::try_from((to - from).num_seconds()).unwrap_or(0)
}
