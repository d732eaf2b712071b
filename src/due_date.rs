use std::fmt;

use chrono::{DateTime, Days, Local, NaiveDate, TimeZone, Utc};

/// 期限の表示ラベル。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DueBadge {
    Overdue,
    Today,
    Tomorrow,
    On(NaiveDate),
}

impl fmt::Display for DueBadge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DueBadge::Overdue => f.write_str("Overdue"),
            DueBadge::Today => f.write_str("Today"),
            DueBadge::Tomorrow => f.write_str("Tomorrow"),
            DueBadge::On(date) => write!(f, "{}", date.format("%b %-d")),
        }
    }
}

/// Localタイムゾーンで期限のラベルを求める。
///
/// # Arguments
///
/// * `due` - 期限
/// * `now` - 現在時刻
pub fn due_badge(due: DateTime<Utc>, now: DateTime<Utc>) -> DueBadge {
    due_badge_in(due, now, &Local)
}

/// 指定したタイムゾーンの日付で期限のラベルを求める。
///
/// 期限を過ぎていても当日であれば`Today`とする。
pub fn due_badge_in<Tz: TimeZone>(due: DateTime<Utc>, now: DateTime<Utc>, tz: &Tz) -> DueBadge {
    let due_date = due.with_timezone(tz).date_naive();
    let today = now.with_timezone(tz).date_naive();

    if due_date == today {
        DueBadge::Today
    } else if due < now {
        DueBadge::Overdue
    } else if today.checked_add_days(Days::new(1)) == Some(due_date) {
        DueBadge::Tomorrow
    } else {
        DueBadge::On(due_date)
    }
}
