use std::time::Duration;

use anyhow::{Context, Result};
use log::{debug, info};
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};
use thiserror::Error;

use crate::config::Config;
use crate::datetime;
use crate::session::{Session, User};
use crate::todo::{NewTodo, Todo, TodoPatch};
use crate::validation::Credentials;

const TODOS_TABLE: &str = "todos";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// バックエンドがエラーを返した場合のエラー。
///
/// `message`はレスポンスのJSONから取り出したもので、そのまま利用者に表示する。
#[derive(Debug, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct RemoteError {
    pub status: u16,
    pub message: String,
}

impl RemoteError {
    /// エラーレスポンスの本文からメッセージを取り出す。
    ///
    /// PostgRESTは`message`、認証APIは`msg`、`error_description`、`error`のいずれかにメッセージを入れる。
    pub fn from_body(status: StatusCode, body: &str) -> Self {
        let message = serde_json::from_str::<Value>(body)
            .ok()
            .and_then(|value| {
                ["message", "msg", "error_description", "error"]
                    .iter()
                    .find_map(|key| value.get(*key).and_then(Value::as_str).map(str::to_string))
            })
            .filter(|message| !message.is_empty())
            .or_else(|| Some(body.trim().to_string()).filter(|body| !body.is_empty()))
            .unwrap_or_else(|| {
                status
                    .canonical_reason()
                    .unwrap_or("Request failed")
                    .to_string()
            });

        Self {
            status: status.as_u16(),
            message,
        }
    }
}

/// `select`で利用する絞り込み条件。
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TodoFilter {
    All,
    Id(String),
}

impl TodoFilter {
    fn query(&self) -> Option<(&'static str, String)> {
        match self {
            TodoFilter::All => None,
            TodoFilter::Id(id) => Some(("id", format!("eq.{}", id))),
        }
    }
}

/// `select`で利用する並び順。
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TodoOrder {
    pub column: &'static str,
    pub ascending: bool,
}

impl TodoOrder {
    fn query(&self) -> String {
        let direction = if self.ascending { "asc" } else { "desc" };
        format!("{}.{}", self.column, direction)
    }
}

impl Default for TodoOrder {
    /// 作成日時の新しい順。
    fn default() -> Self {
        Self {
            column: "created_at",
            ascending: false,
        }
    }
}

/// `todos`コレクションを操作するためのリポジトリ。
#[cfg_attr(test, mockall::automock)]
pub trait TodoRepository {
    /// タスクを作成し、作成されたレコードを返す。
    async fn insert(&self, todo: &NewTodo) -> Result<Todo>;

    /// タスクの一部のフィールドを更新する。
    async fn update(&self, id: &str, patch: &TodoPatch) -> Result<()>;

    /// タスクを削除する。
    async fn delete(&self, id: &str) -> Result<()>;

    /// 条件に一致するタスクを取得する。
    async fn select(&self, filter: &TodoFilter, order: &TodoOrder) -> Result<Vec<Todo>>;
}

/// 認証サービスを操作するためのリポジトリ。
#[cfg_attr(test, mockall::automock)]
pub trait AuthRepository {
    /// アカウントを作成する。メール確認が必要な場合はセッションを返さない。
    async fn sign_up(&self, credentials: &Credentials) -> Result<Option<Session>>;

    /// メールアドレスとパスワードでログインする。
    async fn sign_in(&self, credentials: &Credentials) -> Result<Session>;

    /// セッションを無効化する。
    async fn sign_out(&self, session: &Session) -> Result<()>;

    /// リフレッシュトークンで新しいセッションを取得する。
    async fn refresh(&self, refresh_token: &str) -> Result<Session>;
}

/// 認証APIのセッションレスポンス。
///
/// メール確認が必要なサインアップではユーザー情報だけがトップレベルに返る。
#[derive(Debug, Deserialize)]
struct SessionResponse {
    access_token: Option<String>,
    refresh_token: Option<String>,
    expires_at: Option<i64>,
    expires_in: Option<i64>,
    user: Option<User>,
}

impl SessionResponse {
    fn into_session(self) -> Option<Session> {
        let expires_at = self.expires_at.or_else(|| {
            self.expires_in
                .map(|expires_in| datetime::now().timestamp() + expires_in)
        });

        Some(Session {
            access_token: self.access_token?,
            refresh_token: self.refresh_token?,
            expires_at,
            user: self.user?,
        })
    }
}

/// Supabase（認証APIとPostgREST）と通信するためのクライアント。
///
/// # Examples
///
/// ```
/// let client = SupabaseClient::new(&Config::from_env()?)?.with_session(&session);
/// let todos = client.select(&TodoFilter::All, &TodoOrder::default()).await?;
/// ```
pub struct SupabaseClient {
    client: Client,
    api_url: String,
    anon_key: String,
    access_token: Option<String>,
}

impl SupabaseClient {
    /// 新しい`SupabaseClient`を返す。
    ///
    /// # Arguments
    ///
    /// * `config` - 接続設定
    pub fn new(config: &Config) -> Result<Self> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            api_url: config.api_url.clone(),
            anon_key: config.anon_key.clone(),
            access_token: None,
        })
    }

    /// セッションのアクセストークンでリクエストするクライアントを返す。
    pub fn with_session(mut self, session: &Session) -> Self {
        self.access_token = Some(session.access_token.clone());
        self
    }

    fn rest_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.api_url, table)
    }

    fn auth_url(&self, endpoint: &str) -> String {
        format!("{}/auth/v1/{}", self.api_url, endpoint)
    }

    /// 共通のヘッダーを付けたリクエストを作成する。
    ///
    /// アクセストークンがない場合はanonキーで認可する。
    fn request(&self, method: Method, url: &str, token: Option<&str>) -> RequestBuilder {
        let token = token
            .or(self.access_token.as_deref())
            .unwrap_or(&self.anon_key);
        self.client
            .request(method, url)
            .header("apikey", &self.anon_key)
            .bearer_auth(token)
    }

    async fn send(&self, builder: RequestBuilder) -> Result<Response> {
        let response = builder
            .send()
            .await
            .with_context(|| format!("Failed to send request to Supabase at {}", self.api_url))?;
        let status = response.status();
        debug!("Supabase responded with {}", status);
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(RemoteError::from_body(status, &body).into())
    }

    async fn request_session(&self, grant_type: &str, body: Value) -> Result<Session> {
        let builder = self
            .request(Method::POST, &self.auth_url("token"), None)
            .query(&[("grant_type", grant_type)])
            .json(&body);
        self.send(builder)
            .await?
            .json::<SessionResponse>()
            .await
            .context("Failed to deserialize response")?
            .into_session()
            .context("Response did not contain a session")
    }

    /// 指定したIDの行だけを対象にする更新・削除で、対象の行がなかった場合にエラーを返す。
    async fn expect_affected(&self, builder: RequestBuilder, id: &str) -> Result<()> {
        let rows = self
            .send(builder)
            .await?
            .json::<Vec<Value>>()
            .await
            .context("Failed to deserialize response")?;
        if rows.is_empty() {
            return Err(RemoteError {
                status: StatusCode::NOT_FOUND.as_u16(),
                message: format!("Todo not found: {}", id),
            }
            .into());
        }

        Ok(())
    }
}

impl TodoRepository for SupabaseClient {
    async fn insert(&self, todo: &NewTodo) -> Result<Todo> {
        let builder = self
            .request(Method::POST, &self.rest_url(TODOS_TABLE), None)
            .header("Prefer", "return=representation")
            .json(&[todo]);
        let mut created = self
            .send(builder)
            .await?
            .json::<Vec<Todo>>()
            .await
            .context("Failed to deserialize response")?;
        info!("Todo inserted: {} rows", created.len());

        created.pop().context("Insert returned no rows")
    }

    async fn update(&self, id: &str, patch: &TodoPatch) -> Result<()> {
        let builder = self
            .request(Method::PATCH, &self.rest_url(TODOS_TABLE), None)
            .header("Prefer", "return=representation")
            .query(&[("id", format!("eq.{}", id))])
            .json(patch);
        self.expect_affected(builder, id).await?;
        info!("Todo {} updated", id);

        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<()> {
        let builder = self
            .request(Method::DELETE, &self.rest_url(TODOS_TABLE), None)
            .header("Prefer", "return=representation")
            .query(&[("id", format!("eq.{}", id))]);
        self.expect_affected(builder, id).await?;
        info!("Todo {} deleted", id);

        Ok(())
    }

    async fn select(&self, filter: &TodoFilter, order: &TodoOrder) -> Result<Vec<Todo>> {
        let mut query = vec![("select", "*".to_string()), ("order", order.query())];
        query.extend(filter.query());
        let builder = self
            .request(Method::GET, &self.rest_url(TODOS_TABLE), None)
            .query(&query);
        let todos = self
            .send(builder)
            .await?
            .json::<Vec<Todo>>()
            .await
            .context("Failed to deserialize response")?;
        info!("length of todos: {}", todos.len());

        Ok(todos)
    }
}

impl AuthRepository for SupabaseClient {
    async fn sign_up(&self, credentials: &Credentials) -> Result<Option<Session>> {
        let builder = self
            .request(Method::POST, &self.auth_url("signup"), None)
            .json(&json!({"email": credentials.email, "password": credentials.password}));
        let response = self
            .send(builder)
            .await?
            .json::<SessionResponse>()
            .await
            .context("Failed to deserialize response")?;

        Ok(response.into_session())
    }

    async fn sign_in(&self, credentials: &Credentials) -> Result<Session> {
        self.request_session(
            "password",
            json!({"email": credentials.email, "password": credentials.password}),
        )
        .await
    }

    async fn sign_out(&self, session: &Session) -> Result<()> {
        let builder = self.request(
            Method::POST,
            &self.auth_url("logout"),
            Some(&session.access_token),
        );
        self.send(builder).await?;
        info!("Signed out user {}", session.user.id);

        Ok(())
    }

    async fn refresh(&self, refresh_token: &str) -> Result<Session> {
        self.request_session("refresh_token", json!({"refresh_token": refresh_token}))
            .await
    }
}
