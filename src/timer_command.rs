use std::future::Future;
use std::time::Duration;

use anyhow::{Context, Result};
use log::{debug, info, warn};

use crate::datetime;
use crate::supabase::TodoRepository;
use crate::ticker::TimerView;
use crate::timer::{Timer, TimerAction};
use crate::todo_command::find_todo;

/// `timer`サブコマンドの操作。
#[derive(Debug, clap::Subcommand)]
pub enum TimerArgs {
    /// Start the timer, or resume it when paused
    Start { id: String },
    /// Pause a running timer
    Pause { id: String },
    /// Stop the timer
    Stop { id: String },
    /// Show the timer, refreshed every second, until Ctrl-C
    Watch {
        id: String,

        #[clap(
            long = "poll",
            default_value = "5",
            help = "Seconds between refetches of the stored timer"
        )]
        poll: u64,
    },
}

/// タイマーに関するサブコマンドの処理を行う。
pub struct TimerCommand<'a, T: TodoRepository> {
    repository: &'a T,
}

impl<'a, T: TodoRepository> TimerCommand<'a, T> {
    /// 新しい`TimerCommand`を返す。
    ///
    /// # Arguments
    /// * `repository` - `todos`コレクションと通信するためのリポジトリ
    pub fn new(repository: &'a T) -> Self {
        Self { repository }
    }

    /// タイマーの状態を遷移させ、保存に成功した遷移後のタイマーを返す。
    ///
    /// 保存に失敗した場合は遷移後のタイマーを返さない。
    ///
    /// # Arguments
    ///
    /// * `id` - タスクのID
    /// * `action` - 適用する操作
    pub async fn run(&self, id: &str, action: TimerAction) -> Result<Timer> {
        let todo = find_todo(self.repository, id).await?;
        let current = Timer::from_todo(&todo);
        let next = current.apply(action, datetime::now())?;

        if let Err(error) = self.repository.update(id, &next.to_patch()).await {
            warn!("Timer {} for todo {} was not saved: {:#}", action, id, error);
            return Err(error.context(format!("Failed to {} timer", action)));
        }
        info!(
            "Timer for todo {}: {} -> {} ({}s)",
            id,
            current.status(),
            next.status(),
            next.elapsed
        );

        Ok(next)
    }

    /// タイマーを1秒ごとに表示する。
    ///
    /// `poll`ごとに保存されている状態を取得し直し、変わっていれば表示を切り替える。
    /// `shutdown`が完了すると表示を止めて戻る。
    ///
    /// # Arguments
    ///
    /// * `id` - タスクのID
    /// * `poll` - 保存されている状態を取得し直す間隔
    /// * `render` - タイマーと表示値を描画する関数
    /// * `shutdown` - 完了したら表示を終了するfuture
    pub async fn watch<R, S>(&self, id: &str, poll: Duration, render: R, shutdown: S) -> Result<()>
    where
        R: Fn(&Timer, u64) + Send + Sync + 'static,
        S: Future<Output = ()>,
    {
        let mut view = TimerView::new(render);
        let mut interval = tokio::time::interval(poll);
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                _ = interval.tick() => {
                    let todo = find_todo(self.repository, id)
                        .await
                        .context("Failed to refresh timer")?;
                    view.apply(Timer::from_todo(&todo));
                    debug!("Todo {} refreshed (ticking: {})", id, view.is_ticking());
                }
            }
        }
        info!("Stopped watching todo {}", id);

        Ok(())
    }
}
