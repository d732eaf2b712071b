use std::env;
use std::path::PathBuf;

use anyhow::{Context, Result};

const URL_VAR: &str = "TASKFLOW_SUPABASE_URL";
const ANON_KEY_VAR: &str = "TASKFLOW_SUPABASE_ANON_KEY";
const APP_DIR: &str = "taskflow";

/// バックエンドへの接続設定。
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Config {
    /// プロジェクトのURL（例: `https://xyz.supabase.co`）。
    pub api_url: String,
    /// 公開用のanonキー。
    pub anon_key: String,
}

impl Config {
    /// 環境変数から設定を読み込む。
    ///
    /// `TASKFLOW_SUPABASE_URL`、`TASKFLOW_SUPABASE_ANON_KEY`が設定されていない場合はエラーを返す。
    pub fn from_env() -> Result<Self> {
        let api_url = env::var(URL_VAR).with_context(|| format!("{} must be set", URL_VAR))?;
        let anon_key =
            env::var(ANON_KEY_VAR).with_context(|| format!("{} must be set", ANON_KEY_VAR))?;

        Ok(Self::new(&api_url, &anon_key))
    }

    /// 新しい`Config`を返す。URL末尾の`/`は取り除く。
    pub fn new(api_url: &str, anon_key: &str) -> Self {
        Self {
            api_url: api_url.trim_end_matches('/').to_string(),
            anon_key: anon_key.to_string(),
        }
    }
}

/// セッションを保存するファイルのデフォルトのパス。
pub fn default_session_file() -> Result<PathBuf> {
    let dir = dirs::config_dir().context("Failed to find the config directory")?;
    Ok(dir.join(APP_DIR).join("session.json"))
}

/// 時間割を保存するファイルのデフォルトのパス。
pub fn default_timetable_file() -> Result<PathBuf> {
    let dir = dirs::data_dir().context("Failed to find the data directory")?;
    Ok(dir.join(APP_DIR).join("timetable.json"))
}
