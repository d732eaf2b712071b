use anyhow::{Context, Result};
use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer};

#[cfg(not(test))]
/// 現在のUTC時間を取得する。
pub fn now() -> DateTime<Utc> {
    Utc::now()
}


#[cfg(test)]
pub use mock_datetime::now;

/// バックエンドから返されるタイムスタンプ文字列をパースする。
///
/// RFC 3339形式（オフセット付き）を優先し、オフセットのない形式はUTCとして扱う。
///
/// # Arguments
///
/// * `s` - ISO-8601形式のタイムスタンプ文字列
pub fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
    let s = s.trim();
    if let Ok(datetime) = DateTime::parse_from_rfc3339(s) {
        return Ok(datetime.to_utc());
    }
    // PostgreSQLは`+00`のように分を省略したオフセットを返すことがある
    if let Ok(datetime) = DateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f%#z") {
        return Ok(datetime.to_utc());
    }

    let naive = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f"))
        .with_context(|| format!("Failed to parse timestamp: {}", s))?;

    Ok(Utc.from_utc_datetime(&naive))
}

/// `YYYY-MM-DD`形式の日付をLocalタイムゾーンの00:00:00としてパースする。
pub fn parse_local_date(s: &str) -> Result<DateTime<Utc>> {
    let naive_date = NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .with_context(|| format!("Failed to parse date: {}", s))?;
    let naive_datetime = naive_date
        .and_hms_opt(0, 0, 0)
        .context("Failed to set hour, minute, and second")?;
    let datetime = Local
        .from_local_datetime(&naive_datetime)
        .earliest()
        .context("Failed to convert to DateTime<Local>")?
        .to_utc();

    Ok(datetime)
}

/// serdeの`deserialize_with`で利用する、タイムスタンプのデシリアライザ。
pub fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    parse_timestamp(&s).map_err(serde::de::Error::custom)
}

/// `null`を許容するタイムスタンプのデシリアライザ。
pub fn deserialize_optional_timestamp<'de, D>(
    deserializer: D,
) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let s = Option::<String>::deserialize(deserializer)?;
    s.map(|s| parse_timestamp(&s).map_err(serde::de::Error::custom))
        .transpose()
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, Local, SecondsFormat, TimeZone, Timelike, Utc};
    use rstest::rstest;

    use super::mock_datetime;
    use super::{parse_local_date, parse_timestamp};

    /// 何も設定しない場合は、現在時間が取得できることを確認する。
    ///
    ///  - 現在時刻での比較を行なっているため、ミリ秒単位まで比較するとテストが失敗する可能性があり、秒単位で比較している。
    #[test]
    fn test_now() {
        assert_eq!(
            mock_datetime::now().to_rfc3339_opts(SecondsFormat::Secs, true),
            Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
        );
    }

    /// モック時間を設定した時に、その時間が取得できることを確認する。
    #[test]
    fn test_now_specific_datetime() {
        let datetime = String::from("2024-01-01T00:00:00+00:00");
        mock_datetime::set_mock_time(
            DateTime::parse_from_rfc3339(datetime.as_str())
                .unwrap()
                .to_utc(),
        );

        assert_eq!(mock_datetime::now().to_rfc3339(), datetime);
        mock_datetime::clear_mock_time();
    }

    /// モック時間をリセットした時に、現在時間が取得できることを確認する。
    #[test]
    fn test_now_after_clear_mock_time() {
        let datetime = String::from("2024-01-01T00:00:00+00:00");
        mock_datetime::set_mock_time(
            DateTime::parse_from_rfc3339(datetime.as_str())
                .unwrap()
                .to_utc(),
        );
        mock_datetime::clear_mock_time();

        assert_eq!(
            mock_datetime::now().to_rfc3339_opts(SecondsFormat::Secs, true),
            Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
        );
    }

    /// バックエンドが返しうる形式のタイムスタンプをパースできることを確認する。
    #[rstest]
    #[case::rfc3339_utc("2024-03-01T10:20:30Z")]
    #[case::rfc3339_offset("2024-03-01T19:20:30+09:00")]
    #[case::postgres_micros("2024-03-01T10:20:30.000000+00:00")]
    #[case::postgres_short_offset("2024-03-01 10:20:30+00")]
    #[case::naive("2024-03-01T10:20:30")]
    #[case::naive_space("2024-03-01 10:20:30")]
    fn test_parse_timestamp(#[case] input: &str) {
        let expected = Utc.with_ymd_and_hms(2024, 3, 1, 10, 20, 30).unwrap();

        assert_eq!(parse_timestamp(input).unwrap(), expected);
    }

    #[rstest]
    #[case::empty("")]
    #[case::date_only("2024-03-01")]
    #[case::garbage("tomorrow")]
    fn test_parse_timestamp_invalid(#[case] input: &str) {
        assert!(parse_timestamp(input).is_err());
    }

    /// 日付はLocalタイムゾーンの0時として扱われる。
    #[test]
    fn test_parse_local_date() {
        let parsed = parse_local_date("2024-05-06").unwrap().with_timezone(&Local);

        assert_eq!(parsed.date_naive().to_string(), "2024-05-06");
        assert_eq!(parsed.hour(), 0);
        assert!(parse_local_date("2024/05/06").is_err());
    }
}
