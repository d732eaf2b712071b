use std::io::Write;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use log::{info, warn};

use crate::console::{ConsoleMarkdownList, ConsolePresenter, Notification};
use crate::datetime::{self, parse_local_date};
use crate::session::Session;
use crate::supabase::{TodoFilter, TodoOrder, TodoRepository};
use crate::todo::{NewTodo, Todo, TodoPatch};
use crate::validation::ValidationError;

/// `add`サブコマンドの引数。
#[derive(Debug, clap::Args)]
pub struct AddArgs {
    #[clap(help = "What needs to be done?")]
    title: String,

    #[clap(
        short = 'd',
        long = "due",
        help = "Sets a due date in the format YYYY-MM-DD",
        parse(try_from_str = parse_local_date),
    )]
    due: Option<DateTime<Utc>>,
}

/// タスク一覧に関するサブコマンドの処理を行う。
pub struct TodoCommand<'a, T: TodoRepository> {
    repository: &'a T,
    session: &'a Session,
}

impl<'a, T: TodoRepository> TodoCommand<'a, T> {
    /// 新しい`TodoCommand`を返す。
    ///
    /// # Arguments
    /// * `repository` - `todos`コレクションと通信するためのリポジトリ
    /// * `session` - ログイン中のセッション
    pub fn new(repository: &'a T, session: &'a Session) -> Self {
        Self {
            repository,
            session,
        }
    }

    /// 作成日時の新しい順にタスクを取得する。
    pub async fn list(&self) -> Result<Vec<Todo>> {
        let todos = self
            .repository
            .select(&TodoFilter::All, &TodoOrder::default())
            .await
            .context("Failed to retrieve todos")?;
        info!("Todos retrieved successfully.");

        Ok(todos)
    }

    /// タスクを作成する。
    ///
    /// タイトルが空白のみの場合は通信せずにエラーを返す。
    pub async fn add(&self, args: AddArgs) -> Result<Notification> {
        let title = args.title.trim();
        if title.is_empty() {
            return Err(ValidationError("Please enter a task title".to_string()).into());
        }

        let new_todo = NewTodo {
            title: title.to_string(),
            user_id: self.session.user.id.clone(),
            due_date: args.due,
        };
        let created = self
            .repository
            .insert(&new_todo)
            .await
            .context("Failed to add todo")?;
        info!("Todo {} created", created.id);

        Ok(Notification::success(
            "Todo added!",
            "Your task has been created.",
        ))
    }

    /// タスクの完了状態を切り替える。
    pub async fn toggle(&self, id: &str) -> Result<()> {
        let todo = find_todo(self.repository, id).await?;

        self.repository
            .update(id, &TodoPatch::toggle_completed(&todo))
            .await
            .context("Failed to update todo")
    }

    /// タスクを削除する。
    pub async fn delete(&self, id: &str) -> Result<Notification> {
        self.repository
            .delete(id)
            .await
            .context("Failed to delete todo")?;

        Ok(Notification::success(
            "Todo deleted",
            "Your task has been removed.",
        ))
    }

    /// 操作の成否にかかわらず、保存されている最新のタスク一覧を表示する。
    ///
    /// 操作と表示の両方に失敗した場合は操作のエラーを返す。
    ///
    /// # Arguments
    ///
    /// * `writer` - 出力先
    /// * `result` - 直前の操作の結果
    pub async fn show_latest<W: Write>(&self, writer: &mut W, result: Result<()>) -> Result<()> {
        let shown = match self.list().await {
            Ok(todos) => ConsoleMarkdownList::new(writer).show_todos(&todos, datetime::now()),
            Err(error) => Err(error),
        };

        match (result, shown) {
            (Err(error), Err(refresh_error)) => {
                warn!("Failed to refresh todos: {:#}", refresh_error);
                Err(error)
            }
            (result, shown) => shown.and(result),
        }
    }
}

/// IDを指定してタスクを1件取得する。
pub async fn find_todo<T: TodoRepository>(repository: &T, id: &str) -> Result<Todo> {
    repository
        .select(&TodoFilter::Id(id.to_string()), &TodoOrder::default())
        .await
        .with_context(|| format!("Failed to retrieve todo {}", id))?
        .into_iter()
        .next()
        .with_context(|| format!("Todo not found: {}", id))
}
