use anyhow::{Context, Result};
use log::info;

use crate::stats::TimeStats;
use crate::supabase::{TodoFilter, TodoOrder, TodoRepository};

/// `stats`サブコマンドの処理を行う。
pub struct StatsCommand<'a, T: TodoRepository> {
    repository: &'a T,
}

impl<'a, T: TodoRepository> StatsCommand<'a, T> {
    /// 新しい`StatsCommand`を返す。
    pub fn new(repository: &'a T) -> Self {
        Self { repository }
    }

    /// 全タスクの計測時間を集計する。
    ///
    /// 計測中の区間は確定していないので集計に含めない。
    pub async fn run(&self) -> Result<TimeStats> {
        let todos = self
            .repository
            .select(&TodoFilter::All, &TodoOrder::default())
            .await
            .context("Failed to retrieve todos")?;
        let stats = TimeStats::from_todos(&todos);
        info!(
            "Total time: {}s across {} tasks",
            stats.total,
            stats.slices.len()
        );

        Ok(stats)
    }
}
