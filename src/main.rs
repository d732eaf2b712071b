use std::io::{self, Write};
use std::path::PathBuf;
use std::process;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use fern::colors::{Color, ColoredLevelConfig};
use log::{debug, error, info, LevelFilter};

mod auth_command;
mod config;
mod console;
mod datetime;
mod due_date;
mod session;
mod stats;
mod stats_command;
mod supabase;
mod ticker;
mod timer;
mod timer_command;
mod timetable;
mod timetable_command;
mod todo;
mod todo_command;
mod validation;

use auth_command::{AuthCommand, CredentialsArgs};
use config::{default_session_file, default_timetable_file, Config};
use console::{
    timer_line, ConsoleMarkdownList, ConsoleNotifier, ConsolePresenter, Notification, Notifier,
};
use session::{Route, SessionStore, SessionSubscription};
use stats_command::StatsCommand;
use supabase::SupabaseClient;
use timer::TimerAction;
use timer_command::{TimerArgs, TimerCommand};
use timetable::TimetableStore;
use timetable_command::{TimetableArgs, TimetableCommand};
use todo_command::{AddArgs, TodoCommand};

/// タスクと学習時間割を管理するためのCLIアプリケーション。
///
/// # Examples
/// ```
/// $ cargo run -- signin --email student@example.com --password secret1
/// $ cargo run -- add "Read chapter 3" --due 2024-03-02
/// $ cargo run -- timer start <id>
/// ```
#[derive(Debug, Parser)]
#[clap(version, about)]
struct Args {
    #[clap(
        short = 'v',
        long = "verbose",
        parse(from_occurrences),
        global = true,
        help = "Increases log output (-v: info, -vv: debug)"
    )]
    verbose: u8,

    #[clap(long = "session-file", parse(from_os_str), global = true)]
    session_file: Option<PathBuf>,

    #[clap(long = "timetable-file", parse(from_os_str), global = true)]
    timetable_file: Option<PathBuf>,

    #[clap(subcommand)]
    subcommand: SubCommands,
}

/// サブコマンドを表す列挙型。
#[derive(Debug, Subcommand)]
enum SubCommands {
    /// Create an account
    Signup(CredentialsArgs),
    /// Sign in with email and password
    Signin(CredentialsArgs),
    /// Sign out
    Signout,
    /// Show the signed-in user
    Whoami,
    /// Add a task
    Add(AddArgs),
    /// List tasks, newest first
    List,
    /// Mark a task as completed, or back to active
    Toggle { id: String },
    /// Delete a task
    Delete { id: String },
    /// Start, pause, stop or watch a task timer
    Timer {
        #[clap(subcommand)]
        action: TimerArgs,
    },
    /// Show the time spent per task
    Stats,
    /// Manage the weekly study timetable
    Timetable {
        #[clap(subcommand)]
        action: TimetableArgs,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args = Args::parse();

    setup_logger(args.verbose)?;

    if let Err(error) = run(args).await {
        error!("{:?}", error);
        let mut stderr = io::stderr();
        let mut notifier = ConsoleNotifier::new(&mut stderr);
        notifier.notify(&Notification::from_error(&error))?;
        process::exit(1);
    }

    Ok(())
}

/// ログの出力先と書式を設定する。
fn setup_logger(verbose: u8) -> Result<()> {
    let level = match verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        _ => LevelFilter::Debug,
    };
    let colors = ColoredLevelConfig::new()
        .error(Color::Red)
        .warn(Color::Yellow)
        .info(Color::Green)
        .debug(Color::Blue);

    fern::Dispatch::new()
        .format(move |out, message, record| {
            out.finish(format_args!(
                "{} [{}] {}: {}",
                chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
                colors.color(record.level()),
                record.target(),
                message
            ))
        })
        .level(level)
        .level_for("reqwest", LevelFilter::Warn)
        .level_for("hyper", LevelFilter::Warn)
        .chain(io::stderr())
        .apply()
        .context("Failed to initialize logger")?;

    Ok(())
}

async fn run(args: Args) -> Result<()> {
    let mut stdout = io::stdout();

    if let SubCommands::Timetable { action } = args.subcommand {
        let path = match args.timetable_file {
            Some(path) => path,
            None => default_timetable_file()?,
        };
        let store = TimetableStore::new(path);
        let (timetable, notification) = TimetableCommand::new(&store).run(action)?;
        if let Some(notification) = notification {
            ConsoleNotifier::new(&mut stdout).notify(&notification)?;
        }
        return ConsoleMarkdownList::new(&mut stdout).show_timetable(&timetable);
    }

    let config = Config::from_env()?;
    let session_file = match args.session_file {
        Some(path) => path,
        None => default_session_file()?,
    };
    let store = SessionStore::load(session_file)?;
    let subscription = store.subscribe();
    let anonymous = SupabaseClient::new(&config)?;
    let auth = AuthCommand::new(&anonymous, &store);

    let subcommand = match args.subcommand {
        SubCommands::Signup(credentials) => {
            let notification = auth.sign_up(credentials).await?;
            return ConsoleNotifier::new(&mut stdout).notify(&notification);
        }
        SubCommands::Signin(credentials) => {
            let notification = auth.sign_in(credentials).await?;
            ConsoleNotifier::new(&mut stdout).notify(&notification)?;
            log_route(subscription).await;
            return Ok(());
        }
        SubCommands::Signout => {
            let notification = auth.sign_out().await?;
            ConsoleNotifier::new(&mut stdout).notify(&notification)?;
            log_route(subscription).await;
            return Ok(());
        }
        subcommand => subcommand,
    };

    auth.current_session().await?;
    let session = match (subscription.route(), subscription.session()) {
        (Route::Main, Some(session)) => session,
        _ => bail!("Not signed in. Run `taskflow signin` first."),
    };
    subscription.unsubscribe();
    debug!("Session subscribers: {}", store.subscriber_count());

    let client = SupabaseClient::new(&config)?.with_session(&session);
    let todos = TodoCommand::new(&client, &session);

    let result = match subcommand {
        SubCommands::Whoami => {
            let email = session.user.email.as_deref().unwrap_or("(no email)");
            writeln!(stdout, "{} ({})", email, session.user.id).context("Failed to write user")?;
            return Ok(());
        }
        SubCommands::List => Ok(()),
        SubCommands::Add(add) => notify(&mut stdout, todos.add(add).await),
        SubCommands::Toggle { id } => todos.toggle(&id).await,
        SubCommands::Delete { id } => notify(&mut stdout, todos.delete(&id).await),
        SubCommands::Stats => {
            let stats = StatsCommand::new(&client).run().await?;
            return ConsoleMarkdownList::new(&mut stdout).show_stats(&stats);
        }
        SubCommands::Timer { action } => {
            let command = TimerCommand::new(&client);
            let (id, action) = match action {
                TimerArgs::Start { id } => (id, TimerAction::Start),
                TimerArgs::Pause { id } => (id, TimerAction::Pause),
                TimerArgs::Stop { id } => (id, TimerAction::Stop),
                TimerArgs::Watch { id, poll } => {
                    return watch(&command, &id, poll).await;
                }
            };
            command.run(&id, action).await.map(|_| ())
        }
        SubCommands::Signup(_)
        | SubCommands::Signin(_)
        | SubCommands::Signout
        | SubCommands::Timetable { .. } => unreachable!("handled before signing in"),
    };

    todos.show_latest(&mut stdout, result).await
}

/// セッション変更後の表示先をログに出す。
async fn log_route(mut subscription: SessionSubscription) {
    if let Some(route) = subscription.changed().await {
        info!("Route changed to {:?}", route);
    }
}

/// 処理に成功した場合は通知を表示する。
fn notify<W: Write>(writer: &mut W, result: Result<Notification>) -> Result<()> {
    let notification = result?;
    ConsoleNotifier::new(writer).notify(&notification)
}

/// Ctrl-Cが押されるまでタイマーを表示する。
async fn watch(command: &TimerCommand<'_, SupabaseClient>, id: &str, poll: u64) -> Result<()> {
    let render = |timer: &timer::Timer, seconds: u64| {
        let mut stdout = io::stdout();
        if let Err(error) = write!(stdout, "\r{}   ", timer_line(timer, seconds))
            .and_then(|_| stdout.flush())
        {
            error!("Failed to render timer: {}", error);
        }
    };
    let shutdown = async {
        if let Err(error) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl-C: {}", error);
        }
    };

    command
        .watch(id, Duration::from_secs(poll.max(1)), render, shutdown)
        .await?;
    writeln!(io::stdout()).context("Failed to write newline")?;

    Ok(())
}
