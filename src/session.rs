use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

/// アクセストークンの期限切れとみなすまでの余裕。
const EXPIRY_MARGIN_SECONDS: i64 = 10;

/// ログイン中のユーザー。
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
}

/// 認証サービスが発行したセッション。
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    pub refresh_token: String,
    /// アクセストークンの有効期限（UNIX秒）。
    pub expires_at: Option<i64>,
    pub user: User,
}

impl Session {
    /// アクセストークンが期限切れかどうか。期限が不明な場合は有効とみなす。
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        match self.expires_at {
            Some(expires_at) => {
                (now + Duration::seconds(EXPIRY_MARGIN_SECONDS)).timestamp() >= expires_at
            }
            None => false,
        }
    }
}

/// セッションの有無で決まる表示先。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Route {
    /// ログイン画面。
    Auth,
    /// タスク一覧。
    Main,
}

impl Route {
    pub fn for_session(session: Option<&Session>) -> Self {
        match session {
            Some(_) => Route::Main,
            None => Route::Auth,
        }
    }
}

/// ローカルに保存されたセッションと、その変更の通知先を管理する。
pub struct SessionStore {
    path: PathBuf,
    sender: watch::Sender<Option<Session>>,
}

impl SessionStore {
    /// 保存先のファイルからセッションを読み込む。ファイルがない場合は未ログインとする。
    ///
    /// # Arguments
    ///
    /// * `path` - セッションを保存するファイル
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let session = if path.exists() {
            let content = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read session file: {}", path.display()))?;
            let session: Session = serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse session file: {}", path.display()))?;
            debug!("Session loaded from {}", path.display());
            Some(session)
        } else {
            None
        };
        let (sender, _) = watch::channel(session);

        Ok(Self { path, sender })
    }

    /// 現在のセッションを返す。
    pub fn current(&self) -> Option<Session> {
        self.sender.borrow().clone()
    }

    /// セッションを保存し、購読者に通知する。`None`の場合はファイルを削除する。
    pub fn set(&self, session: Option<Session>) -> Result<()> {
        match &session {
            Some(session) => write_session(&self.path, session)?,
            None => {
                if self.path.exists() {
                    fs::remove_file(&self.path).with_context(|| {
                        format!("Failed to remove session file: {}", self.path.display())
                    })?;
                }
            }
        }
        info!(
            "Session changed: {}",
            if session.is_some() { "signed in" } else { "signed out" }
        );
        self.sender.send_replace(session);

        Ok(())
    }

    /// セッションの変更を購読する。返された`SessionSubscription`をdropすると購読を解除する。
    pub fn subscribe(&self) -> SessionSubscription {
        SessionSubscription {
            receiver: self.sender.subscribe(),
        }
    }

    /// 現在の購読者数。
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

/// セッション変更の購読。
pub struct SessionSubscription {
    receiver: watch::Receiver<Option<Session>>,
}

impl SessionSubscription {
    /// 現在のセッションに応じた表示先を返す。
    pub fn route(&self) -> Route {
        Route::for_session(self.receiver.borrow().as_ref())
    }

    /// 現在のセッションを返す。
    pub fn session(&self) -> Option<Session> {
        self.receiver.borrow().clone()
    }

    /// 次の変更を待ち、変更後の表示先を返す。`SessionStore`が破棄された場合は`None`を返す。
    pub async fn changed(&mut self) -> Option<Route> {
        self.receiver.changed().await.ok()?;
        Some(self.route())
    }

    /// 購読を解除する。
    pub fn unsubscribe(self) {}
}

fn write_session(path: &Path, session: &Session) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }
    let content = serde_json::to_string_pretty(session).context("Failed to serialize session")?;
    fs::write(path, content)
        .with_context(|| format!("Failed to write session file: {}", path.display()))?;

    Ok(())
}

#[cfg(test)]
pub(crate) mod tests {
    use std::path::PathBuf;

    use chrono::{TimeZone, Utc};

    use super::{Route, Session, SessionStore, User};

    /// テスト用のセッションを作成する。
    pub(crate) fn dummy_session() -> Session {
        Session {
            access_token: "access-token".to_string(),
            refresh_token: "refresh-token".to_string(),
            expires_at: Some(Utc.with_ymd_and_hms(2024, 3, 1, 11, 0, 0).unwrap().timestamp()),
            user: User {
                id: "user-1".to_string(),
                email: Some("student@example.com".to_string()),
            },
        }
    }

    /// テストごとに重ならない一時ファイルのパスを返す。
    pub(crate) fn temp_path(name: &str) -> PathBuf {
        let path = std::env::temp_dir()
            .join(format!("taskflow-test-{}", std::process::id()))
            .join(name);
        let _ = std::fs::remove_file(&path);
        path
    }

    #[test]
    fn test_load_without_file() {
        let store = SessionStore::load(temp_path("missing-session.json")).unwrap();

        assert_eq!(store.current(), None);
        assert_eq!(store.subscribe().route(), Route::Auth);
    }

    /// 保存したセッションは次回の読み込みで復元される。
    #[test]
    fn test_set_persists_session() {
        let path = temp_path("persist-session.json");
        let store = SessionStore::load(&path).unwrap();

        store.set(Some(dummy_session())).unwrap();
        let reloaded = SessionStore::load(&path).unwrap();

        assert_eq!(reloaded.current(), Some(dummy_session()));

        reloaded.set(None).unwrap();
        assert!(!path.exists());
        assert_eq!(SessionStore::load(&path).unwrap().current(), None);
    }

    /// 購読者はセッションの変更を受け取り、表示先が切り替わる。
    #[tokio::test]
    async fn test_subscription_receives_changes() {
        let store = SessionStore::load(temp_path("subscribe-session.json")).unwrap();
        let mut subscription = store.subscribe();

        store.set(Some(dummy_session())).unwrap();
        assert_eq!(subscription.changed().await, Some(Route::Main));
        assert_eq!(subscription.session(), Some(dummy_session()));

        store.set(None).unwrap();
        assert_eq!(subscription.changed().await, Some(Route::Auth));
    }

    /// 購読を解除すると購読者数が減る。
    #[test]
    fn test_unsubscribe() {
        let store = SessionStore::load(temp_path("unsubscribe-session.json")).unwrap();
        let first = store.subscribe();
        let second = store.subscribe();
        assert_eq!(store.subscriber_count(), 2);

        first.unsubscribe();
        assert_eq!(store.subscriber_count(), 1);
        drop(second);
        assert_eq!(store.subscriber_count(), 0);
    }

    #[test]
    fn test_is_expired() {
        let session = dummy_session();

        assert!(!session.is_expired(Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap()));
        assert!(session.is_expired(Utc.with_ymd_and_hms(2024, 3, 1, 10, 59, 55).unwrap()));
        assert!(session.is_expired(Utc.with_ymd_and_hms(2024, 3, 2, 0, 0, 0).unwrap()));
        assert!(!Session {
            expires_at: None,
            ..session
        }
        .is_expired(Utc::now()));
    }
}
