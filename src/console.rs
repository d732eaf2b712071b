use std::io::Write;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};

use crate::due_date::due_badge;
use crate::stats::{format_duration, TimeStats, TodoCounts};
use crate::supabase::RemoteError;
use crate::timer::{format_clock, Timer, TimerError};
use crate::timetable::{Day, Timetable};
use crate::todo::{TimerStatus, Todo};
use crate::validation::ValidationError;

/// Consoleに各画面の内容を表示するためのtrait。
pub trait ConsolePresenter {
    /// タスク一覧を表示する。
    ///
    /// # Arguments
    ///
    /// * `todos` - 表示するタスク
    /// * `now` - 期限とタイマーの表示に利用する現在時刻
    fn show_todos(&mut self, todos: &[Todo], now: DateTime<Utc>) -> Result<()>;

    /// 計測時間の集計を表示する。
    fn show_stats(&mut self, stats: &TimeStats) -> Result<()>;

    /// 時間割を曜日ごとに表示する。
    fn show_timetable(&mut self, timetable: &Timetable) -> Result<()>;
}

/// 各画面をMarkdownのlist形式で表示する。
pub struct ConsoleMarkdownList<'a, W: Write> {
    writer: &'a mut W,
}

impl<'a, W: Write> ConsoleMarkdownList<'a, W> {
    /// 新しい`ConsoleMarkdownList`を返す。
    pub fn new(writer: &'a mut W) -> Self {
        Self { writer }
    }
}

impl<'a, W: Write> ConsolePresenter for ConsoleMarkdownList<'a, W> {
    fn show_todos(&mut self, todos: &[Todo], now: DateTime<Utc>) -> Result<()> {
        if todos.is_empty() {
            writeln!(self.writer, "No todos yet. Add one to get started!")
                .context("Failed to write empty todo list")?;
            return Ok(());
        }

        for todo in todos {
            writeln!(self.writer, "{}", todo_line(todo, now))
                .with_context(|| format!("Failed to write todo: {:?}", todo))?;
        }

        let counts = TodoCounts::from_todos(todos);
        writeln!(
            self.writer,
            "\n{} active / {} completed / {} total",
            counts.active, counts.completed, counts.total
        )
        .context("Failed to write todo counts")?;

        Ok(())
    }

    fn show_stats(&mut self, stats: &TimeStats) -> Result<()> {
        writeln!(
            self.writer,
            "Total Time Spent: {}\n\n## Time per Task",
            format_duration(stats.total)
        )
        .context("Failed to write total time")?;

        if stats.slices.is_empty() {
            writeln!(self.writer, "No time tracked yet").context("Failed to write stats")?;
            return Ok(());
        }
        for slice in &stats.slices {
            writeln!(
                self.writer,
                "- {}: {} ({:.0}%)",
                slice.name,
                format_duration(slice.value),
                slice.ratio * 100.0
            )
            .with_context(|| format!("Failed to write time slice: {}", slice.full_name))?;
        }

        Ok(())
    }

    fn show_timetable(&mut self, timetable: &Timetable) -> Result<()> {
        for day in Day::ALL {
            writeln!(self.writer, "## {}", day).context("Failed to write day header")?;
            let entries = timetable.entries_for_day(day);
            if entries.is_empty() {
                writeln!(self.writer, "- (no sessions)").context("Failed to write timetable")?;
            }
            for entry in entries {
                let topic = if entry.topic.is_empty() {
                    String::new()
                } else {
                    format!(": {}", entry.topic)
                };
                writeln!(
                    self.writer,
                    "- {} {}{} (id: {})",
                    entry.time.format("%H:%M"),
                    entry.subject,
                    topic,
                    entry.id
                )
                .with_context(|| format!("Failed to write timetable entry: {:?}", entry))?;
            }
        }

        Ok(())
    }
}

/// 1件のタスクの表示内容を返す。
fn todo_line(todo: &Todo, now: DateTime<Utc>) -> String {
    let checkbox = if todo.completed { "[x]" } else { "[ ]" };
    let mut line = format!("- {} {}", checkbox, todo.title);
    if let Some(due) = todo.due_date {
        line.push_str(&format!(" | due: {}", due_badge(due, now)));
    }

    let timer = Timer::from_todo(todo);
    line.push_str(&format!(" | {}", format_clock(timer.display_seconds(now))));
    if timer.status() != TimerStatus::Stopped {
        line.push_str(&format!(" ({})", timer.status()));
    }
    line.push_str(&format!(" | id: {}", todo.id));

    line
}

/// タイマーの状態と、利用できる操作を1行で返す。
pub fn timer_line(timer: &Timer, seconds: u64) -> String {
    let actions: Vec<&str> = timer
        .available_actions()
        .into_iter()
        .map(|(_, label)| label)
        .collect();
    format!(
        "{} [{}] {}",
        format_clock(seconds),
        timer.status(),
        actions.join(" / ")
    )
}

/// 利用者への一時的な通知。
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Notification {
    Success { title: String, description: String },
    Error { message: String },
}

impl Notification {
    pub fn success(title: &str, description: &str) -> Self {
        Notification::Success {
            title: title.to_string(),
            description: description.to_string(),
        }
    }

    /// エラーを通知内容に変換する。
    ///
    /// 入力チェックやバックエンドのエラーが含まれていればそのメッセージを、
    /// それ以外はcontextを含めたエラーの連鎖を表示する。
    pub fn from_error(error: &anyhow::Error) -> Self {
        let message = error
            .chain()
            .find_map(|cause| {
                cause
                    .downcast_ref::<ValidationError>()
                    .map(ToString::to_string)
                    .or_else(|| cause.downcast_ref::<RemoteError>().map(ToString::to_string))
                    .or_else(|| cause.downcast_ref::<TimerError>().map(ToString::to_string))
            })
            .unwrap_or_else(|| format!("{:#}", error));

        Notification::Error { message }
    }
}

/// 通知を表示するためのtrait。
pub trait Notifier {
    fn notify(&mut self, notification: &Notification) -> Result<()>;
}

/// 通知をConsoleに1行で表示する。
pub struct ConsoleNotifier<'a, W: Write> {
    writer: &'a mut W,
}

impl<'a, W: Write> ConsoleNotifier<'a, W> {
    /// 新しい`ConsoleNotifier`を返す。
    pub fn new(writer: &'a mut W) -> Self {
        Self { writer }
    }
}

impl<'a, W: Write> Notifier for ConsoleNotifier<'a, W> {
    fn notify(&mut self, notification: &Notification) -> Result<()> {
        match notification {
            Notification::Success { title, description } if description.is_empty() => {
                writeln!(self.writer, "{}", title)
            }
            Notification::Success { title, description } => {
                writeln!(self.writer, "{} {}", title, description)
            }
            Notification::Error { message } => writeln!(self.writer, "Error: {}", message),
        }
        .context("Failed to write notification")
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use anyhow::{anyhow, Context};
    use chrono::{DateTime, Duration, NaiveTime, TimeZone, Utc};
    use rstest::rstest;

    use super::{
        timer_line, ConsoleMarkdownList, ConsoleNotifier, ConsolePresenter, Notification, Notifier,
    };
    use crate::stats::TimeStats;
    use crate::supabase::RemoteError;
    use crate::timer::{Timer, TimerState};
    use crate::timetable::{Day, Timetable};
    use crate::todo::{TimerStatus, Todo};
    use crate::validation::ValidationError;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 10, 12, 0, 0).unwrap()
    }

    /// テスト用にダミーのTodoを作成する。
    pub(crate) fn dummy_todo(pattern: u8) -> Todo {
        let created_at = Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap();
        match pattern {
            1 => Todo {
                id: "t1".to_string(),
                title: "Read chapter 3".to_string(),
                completed: false,
                created_at,
                due_date: None,
                user_id: Some("user-1".to_string()),
                elapsed_time: 0,
                timer_status: TimerStatus::Stopped,
                timer_started_at: None,
            },
            2 => Todo {
                id: "t2".to_string(),
                title: "Write summary".to_string(),
                completed: true,
                created_at,
                due_date: None,
                user_id: Some("user-1".to_string()),
                elapsed_time: 125,
                timer_status: TimerStatus::Paused,
                timer_started_at: None,
            },
            3 => Todo {
                id: "t3".to_string(),
                title: "Solve exercises".to_string(),
                completed: false,
                created_at,
                due_date: None,
                user_id: Some("user-1".to_string()),
                elapsed_time: 3600,
                timer_status: TimerStatus::Running,
                timer_started_at: Some(now() - Duration::seconds(125)),
            },
            _ => panic!("Invalid pattern: {}", pattern),
        }
    }

    fn render_todos(todos: &[Todo]) -> String {
        let mut writer = Vec::new();
        let mut presenter = ConsoleMarkdownList::new(&mut writer);
        presenter.show_todos(todos, now()).unwrap();
        String::from_utf8(writer).unwrap()
    }

    #[test]
    fn test_show_todos_empty() {
        assert_eq!(render_todos(&[]), "No todos yet. Add one to get started!\n");
    }

    /// 完了状態、タイマー、件数を表示する。
    #[test]
    fn test_show_todos() {
        let output = render_todos(&[dummy_todo(1), dummy_todo(2), dummy_todo(3)]);

        assert_eq!(
            output,
            [
                "- [ ] Read chapter 3 | 0:00 | id: t1\n",
                "- [x] Write summary | 2:05 (paused) | id: t2\n",
                "- [ ] Solve exercises | 1:02:05 (running) | id: t3\n",
                "\n2 active / 1 completed / 3 total\n",
            ]
            .join("")
        );
    }

    #[test]
    fn test_show_todos_with_overdue_badge() {
        let mut todo = dummy_todo(1);
        todo.due_date = Some(now() - Duration::days(3));

        let output = render_todos(&[todo]);

        assert!(output.starts_with("- [ ] Read chapter 3 | due: Overdue | 0:00"));
    }

    #[test]
    fn test_show_stats() {
        let stats = TimeStats::from_todos(&[dummy_todo(1), dummy_todo(2), dummy_todo(3)]);
        let mut writer = Vec::new();
        let mut presenter = ConsoleMarkdownList::new(&mut writer);

        presenter.show_stats(&stats).unwrap();

        assert_eq!(
            String::from_utf8(writer).unwrap(),
            [
                "Total Time Spent: 1h 2m 5s\n",
                "\n## Time per Task\n",
                "- Write summary: 2m 5s (3%)\n",
                "- Solve exercises: 1h 0m 0s (97%)\n",
            ]
            .join("")
        );
    }

    #[test]
    fn test_show_stats_empty() {
        let stats = TimeStats::from_todos(&[dummy_todo(1)]);
        let mut writer = Vec::new();
        let mut presenter = ConsoleMarkdownList::new(&mut writer);

        presenter.show_stats(&stats).unwrap();

        assert!(String::from_utf8(writer)
            .unwrap()
            .ends_with("No time tracked yet\n"));
    }

    #[test]
    fn test_show_timetable() {
        let mut timetable = Timetable::default();
        let id = timetable
            .add(
                Day::Wednesday,
                NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
                "Math",
                Some("Limits"),
            )
            .unwrap()
            .id
            .clone();
        let mut writer = Vec::new();
        let mut presenter = ConsoleMarkdownList::new(&mut writer);

        presenter.show_timetable(&timetable).unwrap();
        let output = String::from_utf8(writer).unwrap();

        assert!(output.starts_with("## Monday\n- (no sessions)\n## Tuesday\n"));
        assert!(output.contains(&format!("## Wednesday\n- 09:00 Math: Limits (id: {})\n", id)));
        assert!(output.ends_with("## Sunday\n- (no sessions)\n"));
    }

    #[rstest]
    #[case::stopped(Timer::new(), 0, "0:00 [stopped] Start")]
    #[case::running(
        Timer { elapsed: 0, state: TimerState::Running { started_at: now() } },
        125,
        "2:05 [running] Pause / Stop",
    )]
    #[case::paused(Timer { elapsed: 45, state: TimerState::Paused }, 45, "0:45 [paused] Resume / Stop")]
    fn test_timer_line(#[case] timer: Timer, #[case] seconds: u64, #[case] expected: &str) {
        assert_eq!(timer_line(&timer, seconds), expected);
    }

    /// エラーの連鎖から利用者向けのメッセージを取り出す。
    #[rstest]
    #[case::validation(
        anyhow::Error::new(ValidationError("Invalid email address".to_string())),
        "Invalid email address",
    )]
    #[case::remote_with_context(
        Err::<(), _>(RemoteError { status: 400, message: "User already registered".to_string() })
            .context("Failed to sign up")
            .unwrap_err(),
        "User already registered",
    )]
    #[case::other(
        Err::<(), _>(anyhow!("connection refused"))
            .context("Failed to send request")
            .unwrap_err(),
        "Failed to send request: connection refused",
    )]
    fn test_notification_from_error(#[case] error: anyhow::Error, #[case] expected: &str) {
        assert_eq!(
            Notification::from_error(&error),
            Notification::Error {
                message: expected.to_string()
            }
        );
    }

    #[test]
    fn test_console_notifier() {
        let mut writer = Vec::new();
        let mut notifier = ConsoleNotifier::new(&mut writer);

        notifier
            .notify(&Notification::success(
                "Todo added!",
                "Your task has been created.",
            ))
            .unwrap();
        notifier
            .notify(&Notification::Error {
                message: "JWT expired".to_string(),
            })
            .unwrap();

        assert_eq!(
            String::from_utf8(writer).unwrap(),
            "Todo added! Your task has been created.\nError: JWT expired\n"
        );
    }
}
