use anyhow::{Context, Result};
use log::{info, warn};

use crate::console::Notification;
use crate::datetime;
use crate::session::{Session, SessionStore};
use crate::supabase::{AuthRepository, RemoteError};
use crate::validation::Credentials;

/// `signup`、`signin`サブコマンドの引数。
#[derive(Debug, clap::Args)]
pub struct CredentialsArgs {
    #[clap(short = 'e', long = "email", help = "Email address")]
    email: String,

    #[clap(short = 'p', long = "password", help = "Password (6 to 100 characters)")]
    password: String,
}

/// 認証に関するサブコマンドの処理を行う。
pub struct AuthCommand<'a, A: AuthRepository> {
    auth: &'a A,
    store: &'a SessionStore,
}

impl<'a, A: AuthRepository> AuthCommand<'a, A> {
    /// 新しい`AuthCommand`を返す。
    ///
    /// # Arguments
    /// * `auth` - 認証サービスと通信するためのリポジトリ
    /// * `store` - ログイン中のセッションの保存先
    pub fn new(auth: &'a A, store: &'a SessionStore) -> Self {
        Self { auth, store }
    }

    /// アカウントを作成する。
    ///
    /// 入力チェックに失敗した場合は通信せずにエラーを返す。
    pub async fn sign_up(&self, args: CredentialsArgs) -> Result<Notification> {
        let credentials = Credentials::parse(&args.email, &args.password)?;

        let session = self
            .auth
            .sign_up(&credentials)
            .await
            .context("Failed to sign up")?;
        match session {
            Some(session) => {
                self.store.set(Some(session))?;
                Ok(Notification::success(
                    "Account created!",
                    "You're all set.",
                ))
            }
            None => {
                info!("Sign up requires email confirmation");
                Ok(Notification::success(
                    "Account created!",
                    "Check your email to confirm your address, then sign in.",
                ))
            }
        }
    }

    /// ログインする。
    pub async fn sign_in(&self, args: CredentialsArgs) -> Result<Notification> {
        let credentials = Credentials::parse(&args.email, &args.password)?;

        let session = self
            .auth
            .sign_in(&credentials)
            .await
            .context("Failed to sign in")?;
        self.store.set(Some(session))?;

        Ok(Notification::success(
            "Welcome back!",
            "Successfully logged in.",
        ))
    }

    /// ログアウトする。
    ///
    /// 認証サービスへの通知に失敗しても、ローカルのセッションは削除する。
    pub async fn sign_out(&self) -> Result<Notification> {
        if let Some(session) = self.store.current() {
            if let Err(error) = self.auth.sign_out(&session).await {
                warn!("Failed to revoke session: {:#}", error);
            }
        }
        self.store.set(None)?;

        Ok(Notification::success("Signed out.", ""))
    }

    /// 現在のセッションを返す。
    ///
    /// アクセストークンが期限切れの場合はリフレッシュする。
    /// リフレッシュが認証サービスに拒否された場合はログアウト状態にする。
    pub async fn current_session(&self) -> Result<Option<Session>> {
        let Some(session) = self.store.current() else {
            return Ok(None);
        };
        if !session.is_expired(datetime::now()) {
            return Ok(Some(session));
        }

        info!("Access token expired, refreshing session");
        match self.auth.refresh(&session.refresh_token).await {
            Ok(refreshed) => {
                self.store.set(Some(refreshed.clone()))?;
                Ok(Some(refreshed))
            }
            Err(error) if error.downcast_ref::<RemoteError>().is_some() => {
                warn!("Session refresh rejected: {:#}", error);
                self.store.set(None)?;
                Ok(None)
            }
            Err(error) => Err(error.context("Failed to refresh session")),
        }
    }
}
