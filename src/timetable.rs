use std::fmt;
use std::fs;
use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{anyhow, Context, Result};
use chrono::NaiveTime;
use log::debug;
use serde::{Deserialize, Serialize};

use crate::datetime;
use crate::validation::ValidationError;

/// 曜日。月曜日始まり。
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Day {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
    Sunday,
}

impl Day {
    pub const ALL: [Day; 7] = [
        Day::Monday,
        Day::Tuesday,
        Day::Wednesday,
        Day::Thursday,
        Day::Friday,
        Day::Saturday,
        Day::Sunday,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Day::Monday => "Monday",
            Day::Tuesday => "Tuesday",
            Day::Wednesday => "Wednesday",
            Day::Thursday => "Thursday",
            Day::Friday => "Friday",
            Day::Saturday => "Saturday",
            Day::Sunday => "Sunday",
        }
    }
}

impl fmt::Display for Day {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Day {
    type Err = anyhow::Error;

    /// `Monday`、`monday`、`mon`のいずれの形式も受け付ける。
    fn from_str(s: &str) -> Result<Self> {
        let normalized = s.trim().to_ascii_lowercase();
        Day::ALL
            .iter()
            .copied()
            .find(|day| {
                let name = day.name().to_ascii_lowercase();
                name == normalized || (normalized.len() >= 3 && name.starts_with(&normalized))
            })
            .ok_or_else(|| anyhow!("Invalid day: {}", s))
    }
}

/// 時刻をパースする。`14:30`と`02:30 PM`の形式を受け付ける。
pub fn parse_time(s: &str) -> Result<NaiveTime> {
    let s = s.trim();
    NaiveTime::parse_from_str(s, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(&s.to_ascii_uppercase(), "%I:%M %p"))
        .with_context(|| format!("Failed to parse time: {}", s))
}

/// 時間割の1コマ。
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimetableEntry {
    pub id: String,
    pub day: Day,
    pub time: NaiveTime,
    pub subject: String,
    #[serde(default)]
    pub topic: String,
}

/// 時間割。
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timetable {
    entries: Vec<TimetableEntry>,
}

impl Timetable {
    /// コマを追加し、追加したコマを返す。
    ///
    /// # Arguments
    ///
    /// * `day` - 曜日
    /// * `time` - 開始時刻
    /// * `subject` - 科目。空白のみの場合はエラー
    /// * `topic` - 内容（任意）
    pub fn add(
        &mut self,
        day: Day,
        time: NaiveTime,
        subject: &str,
        topic: Option<&str>,
    ) -> Result<&TimetableEntry, ValidationError> {
        let subject = subject.trim();
        if subject.is_empty() {
            return Err(ValidationError("Please enter a subject".to_string()));
        }

        let entry = TimetableEntry {
            id: self.next_id(),
            day,
            time,
            subject: subject.to_string(),
            topic: topic.map(str::trim).unwrap_or_default().to_string(),
        };
        debug!("Adding timetable entry {:?}", entry);
        self.entries.push(entry);

        Ok(&self.entries[self.entries.len() - 1])
    }

    /// 指定したIDのコマを削除する。削除した場合は`true`を返す。
    pub fn remove(&mut self, id: &str) -> bool {
        let before = self.entries.len();
        self.entries.retain(|entry| entry.id != id);
        self.entries.len() != before
    }

    /// 指定した曜日のコマを時刻順に返す。
    pub fn entries_for_day(&self, day: Day) -> Vec<&TimetableEntry> {
        let mut entries: Vec<&TimetableEntry> =
            self.entries.iter().filter(|entry| entry.day == day).collect();
        entries.sort_by_key(|entry| entry.time);
        entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 作成時刻のミリ秒をIDとする。重複する場合はずらす。
    fn next_id(&self) -> String {
        let mut candidate = datetime::now().timestamp_millis();
        while self.entries.iter().any(|entry| entry.id == candidate.to_string()) {
            candidate += 1;
        }
        candidate.to_string()
    }
}

/// 時間割をローカルのJSONファイルに保存する。
pub struct TimetableStore {
    path: PathBuf,
}

impl TimetableStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// 時間割を読み込む。ファイルがない場合は空の時間割を返す。
    pub fn load(&self) -> Result<Timetable> {
        if !self.path.exists() {
            return Ok(Timetable::default());
        }
        let content = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read timetable file: {}", self.path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse timetable file: {}", self.path.display()))
    }

    pub fn save(&self, timetable: &Timetable) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }
        let content =
            serde_json::to_string_pretty(timetable).context("Failed to serialize timetable")?;
        fs::write(&self.path, content)
            .with_context(|| format!("Failed to write timetable file: {}", self.path.display()))
    }
}
