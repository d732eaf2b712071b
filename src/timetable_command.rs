use anyhow::{bail, Result};
use chrono::NaiveTime;
use log::info;

use crate::console::Notification;
use crate::timetable::{parse_time, Day, Timetable, TimetableStore};

/// `timetable`サブコマンドの操作。
#[derive(Debug, clap::Subcommand)]
pub enum TimetableArgs {
    /// Add a study session
    Add {
        #[clap(short = 'd', long = "day", help = "Day of the week, e.g. Monday")]
        day: Day,

        #[clap(
            short = 't',
            long = "time",
            help = "Time of day, e.g. 14:30 or 02:30 PM",
            parse(try_from_str = parse_time),
        )]
        time: NaiveTime,

        #[clap(short = 's', long = "subject")]
        subject: String,

        #[clap(long = "topic")]
        topic: Option<String>,
    },
    /// Show the weekly plan
    List,
    /// Remove a study session
    Remove { id: String },
}

/// 時間割に関するサブコマンドの処理を行う。
pub struct TimetableCommand<'a> {
    store: &'a TimetableStore,
}

impl<'a> TimetableCommand<'a> {
    /// 新しい`TimetableCommand`を返す。
    pub fn new(store: &'a TimetableStore) -> Self {
        Self { store }
    }

    /// 操作を行い、操作後の時間割と通知内容を返す。
    pub fn run(&self, args: TimetableArgs) -> Result<(Timetable, Option<Notification>)> {
        let mut timetable = self.store.load()?;

        let notification = match args {
            TimetableArgs::Add {
                day,
                time,
                subject,
                topic,
            } => {
                let entry = timetable.add(day, time, &subject, topic.as_deref())?;
                info!("Timetable entry {} added on {}", entry.id, entry.day);
                self.store.save(&timetable)?;
                Some(Notification::success("Entry added to timetable", ""))
            }
            TimetableArgs::List => None,
            TimetableArgs::Remove { id } => {
                if !timetable.remove(&id) {
                    bail!("Timetable entry not found: {}", id);
                }
                self.store.save(&timetable)?;
                Some(Notification::success("Entry removed", ""))
            }
        };

        Ok((timetable, notification))
    }
}
