use std::io::{self, Write};
use std::path::PathBuf;
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{Local, NaiveDateTime};
use clap::{Args, Parser, Subcommand, ValueEnum};
use momentum::core::{Document, DomainError};
use momentum::filter::{self, Filter};
use momentum::projectors::{project_history, project_status};
use momentum::views::{HistoryKind, HistorySelect, StatusView};
use momentum::timer::{self, Phase};
use momentum::{engine, store};

#[derive(Debug, Parser)]
#[command(name = "momentum", about = "One-task-at-a-time tracker", version)]
struct Cli {
    /// Path to the JSON store.
    #[arg(long, global = true, default_value = "storage.json")]
    store: PathBuf,

    /// Disable emoji and color output.
    #[arg(long, global = true)]
    plain: bool,

    /// Enable verbose logging for debugging.
    #[arg(long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Set the active task for today.
    Add(AddArgs),

    /// Complete the active task.
    Done,

    /// Cancel the active task without completing it.
    Cancel,

    /// Show today's progress, the active task, and the backlog.
    Status(StatusArgs),

    /// Initialize a record for today.
    Newday,

    /// Manage the global backlog.
    Backlog(BacklogArgs),

    /// List completed, cancelled, and archived tasks across all days.
    History(HistoryArgs),

    /// Run a Pomodoro work/break countdown.
    Timer(TimerArgs),
}

#[derive(Debug, Args)]
struct AddArgs {
    /// Task text; words are joined with spaces.
    #[arg(required = true)]
    task: Vec<String>,
}

#[derive(Debug, Args)]
struct StatusArgs {
    /// Comma-separated `@category` / `#tag` tokens, e.g. `@work,#urgent`.
    #[arg(long)]
    filter: Option<String>,
}

#[derive(Debug, Args)]
struct BacklogArgs {
    #[command(subcommand)]
    command: BacklogCommands,
}

#[derive(Debug, Subcommand)]
enum BacklogCommands {
    /// Queue a task for later.
    Add(AddArgs),

    /// List backlog items with their pull numbers.
    List(StatusArgs),

    /// Make a backlog item today's active task (front of the queue by default).
    Pull {
        /// 1-based number from `backlog list`.
        index: Option<usize>,
    },

    /// Drop a backlog item without activating it.
    Remove {
        /// 1-based number from `backlog list`.
        index: usize,
    },

    /// Alias for `remove`.
    Cancel {
        /// 1-based number from `backlog list`.
        index: usize,
    },
}

#[derive(Debug, Args)]
struct HistoryArgs {
    #[arg(long = "type", value_enum, default_value_t = HistoryType::All)]
    kind: HistoryType,
}

#[derive(Debug, Args)]
struct TimerArgs {
    /// Work session length in minutes.
    #[arg(value_parser = clap::value_parser!(u64).range(1..))]
    work_minutes: u64,

    /// Break length in minutes; 0 skips the break.
    #[arg(long, default_value_t = timer::DEFAULT_BREAK_MINUTES)]
    break_minutes: u64,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum HistoryType {
    Done,
    Cancelled,
    Archived,
    All,
}

impl From<HistoryType> for HistorySelect {
    fn from(t: HistoryType) -> Self {
        match t {
            HistoryType::Done => Self::Done,
            HistoryType::Cancelled => Self::Cancelled,
            HistoryType::Archived => Self::Archived,
            HistoryType::All => Self::All,
        }
    }
}

/* ------------------------------- App context ------------------------------- */

struct App {
    store: PathBuf,
    ui: Ui,
    verbose: bool,
}

impl App {
    fn load(&self) -> Result<Document> {
        if self.verbose {
            eprintln!("Loading store from {:?}", self.store);
        }
        Ok(store::load(&self.store)?)
    }

    fn save(&self, doc: &Document) -> Result<()> {
        if self.verbose {
            eprintln!("Saving store to {:?}", self.store);
        }
        store::save(&self.store, doc)
            .with_context(|| format!("saving {:?}", self.store))
    }
}

fn today_key() -> String {
    Local::now().date_naive().to_string()
}

fn now() -> NaiveDateTime {
    Local::now().naive_local()
}

fn main() -> std::process::ExitCode {
    let cli = Cli::parse();
    let app = App {
        store: cli.store,
        ui: Ui { plain: cli.plain },
        verbose: cli.verbose,
    };

    let result = match cli.command {
        Commands::Add(args) => handle_add(&app, args),
        Commands::Done => handle_done(&app),
        Commands::Cancel => handle_cancel(&app),
        Commands::Status(args) => handle_status(&app, args),
        Commands::Newday => handle_newday(&app),
        Commands::Backlog(args) => handle_backlog(&app, args),
        Commands::History(args) => handle_history(&app, args),
        Commands::Timer(args) => handle_timer(&app, args),
    };

    match result {
        Ok(()) => std::process::ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{}{err:#}", app.ui.emoji_prefix(Emoji::Error));
            std::process::ExitCode::FAILURE
        }
    }
}

/* -------------------------------- Commands -------------------------------- */

fn handle_add(app: &App, args: AddArgs) -> Result<()> {
    let text = args.task.join(" ");
    let mut doc = app.load()?;
    let day = today_key();

    match engine::add(&mut doc, &day, &text) {
        Ok(()) => {
            app.save(&doc)?;
            println!("{}Added: {}", app.ui.emoji_prefix(Emoji::Added), text.trim());
            render_status(&app.ui, &project_status(&doc, &day, &Filter::default()));
            Ok(())
        }
        Err(DomainError::ActiveTaskExists(existing)) => {
            // Offer the backlog instead of dropping the text on the floor.
            let prompt = format!(
                "Active task already exists: {existing}. Add to backlog instead? [y/N] > "
            );
            if safe_input(&prompt).as_deref() == Some("y") {
                let item = engine::backlog_add(&mut doc, &text, now())?;
                app.save(&doc)?;
                println!(
                    "{}Added to backlog: {}",
                    app.ui.emoji_prefix(Emoji::BacklogAdd),
                    item.task
                );
                Ok(())
            } else {
                Err(DomainError::ActiveTaskExists(existing).into())
            }
        }
        Err(err) => Err(err.into()),
    }
}

fn handle_done(app: &App) -> Result<()> {
    let mut doc = app.load()?;
    let day = today_key();

    let item = engine::complete(&mut doc, &day, now())?;
    app.save(&doc)?;
    println!(
        "{}Completed: {}",
        app.ui.emoji_prefix(Emoji::Complete),
        item.task
    );
    render_status(&app.ui, &project_status(&doc, &day, &Filter::default()));

    if prompt_next_task(app, &mut doc, &day)? {
        app.save(&doc)?;
    }
    Ok(())
}

/// After a completion, offer to line up the next task: pull a backlog item by
/// its number, add a fresh one, or skip. Closed stdin skips silently, so piped
/// invocations never block.
fn prompt_next_task(app: &App, doc: &mut Document, day: &str) -> Result<bool> {
    let has_backlog = !doc.backlog.is_empty();
    if has_backlog {
        render_backlog_lines(&app.ui, doc);
    }
    let prompt = if has_backlog {
        "[number] pull from backlog, [a] add new, ENTER to skip > "
    } else {
        "[a] add new, ENTER to skip > "
    };
    let Some(choice) = safe_input(prompt) else {
        return Ok(false);
    };

    if choice.eq_ignore_ascii_case("a") {
        let Some(text) = safe_input("Describe the next task > ") else {
            return Ok(false);
        };
        if text.is_empty() {
            return Ok(false);
        }
        engine::add(doc, day, &text)?;
        println!("{}Added: {text}", app.ui.emoji_prefix(Emoji::Added));
        return Ok(true);
    }

    if let Ok(number) = choice.parse::<usize>() {
        let Some(index) = number.checked_sub(1) else {
            println!(
                "{}invalid backlog index: 0 (numbering starts at 1)",
                app.ui.emoji_prefix(Emoji::Error)
            );
            return Ok(false);
        };
        match engine::backlog_pull(doc, day, Some(index)) {
            Ok(item) => {
                println!(
                    "{}Pulled from backlog: {}",
                    app.ui.emoji_prefix(Emoji::BacklogPull),
                    item.task
                );
                return Ok(true);
            }
            Err(err) => {
                // The completion already succeeded; a bad pick isn't fatal.
                println!("{}{err}", app.ui.emoji_prefix(Emoji::Error));
                return Ok(false);
            }
        }
    }

    Ok(false)
}

fn handle_cancel(app: &App) -> Result<()> {
    let mut doc = app.load()?;
    let day = today_key();

    let item = engine::cancel(&mut doc, &day, now())?;
    app.save(&doc)?;
    println!(
        "{}Cancelled: {}",
        app.ui.emoji_prefix(Emoji::Cancelled),
        item.task
    );
    Ok(())
}

fn handle_status(app: &App, args: StatusArgs) -> Result<()> {
    let doc = app.load()?;
    let day = today_key();
    let filter = parse_filter(args.filter.as_deref())?;
    render_status(&app.ui, &project_status(&doc, &day, &filter));
    Ok(())
}

fn handle_newday(app: &App) -> Result<()> {
    let mut doc = app.load()?;
    let day = today_key();
    engine::newday(&mut doc, &day);
    app.save(&doc)?;
    println!(
        "{}New day initialized -> {day}",
        app.ui.emoji_prefix(Emoji::Newday)
    );
    Ok(())
}

fn handle_backlog(app: &App, args: BacklogArgs) -> Result<()> {
    match args.command {
        BacklogCommands::Add(add) => {
            let text = add.task.join(" ");
            let mut doc = app.load()?;
            let item = engine::backlog_add(&mut doc, &text, now())?;
            app.save(&doc)?;
            println!(
                "{}Backlog task added: {}",
                app.ui.emoji_prefix(Emoji::BacklogAdd),
                item.task
            );
            Ok(())
        }
        BacklogCommands::List(list) => {
            let doc = app.load()?;
            let filter = parse_filter(list.filter.as_deref())?;
            println!("{}Backlog:", app.ui.emoji_prefix(Emoji::BacklogList));
            for (i, item) in engine::backlog_iter(&doc, &filter) {
                println!(" {}. {} [{}]", i + 1, item.task, short_ts(&item.ts));
            }
            Ok(())
        }
        BacklogCommands::Pull { index } => {
            let mut doc = app.load()?;
            let day = today_key();
            let engine_index = match index {
                Some(0) => anyhow::bail!("invalid backlog index: 0 (numbering starts at 1)"),
                Some(n) => Some(n - 1),
                None => None,
            };
            let item = engine::backlog_pull(&mut doc, &day, engine_index)?;
            app.save(&doc)?;
            println!(
                "{}Pulled from backlog: {}",
                app.ui.emoji_prefix(Emoji::BacklogPull),
                item.task
            );
            render_status(&app.ui, &project_status(&doc, &day, &Filter::default()));
            Ok(())
        }
        BacklogCommands::Remove { index } | BacklogCommands::Cancel { index } => {
            let mut doc = app.load()?;
            if index == 0 {
                anyhow::bail!("invalid backlog index: 0 (numbering starts at 1)");
            }
            let item = engine::backlog_remove(&mut doc, index - 1)?;
            app.save(&doc)?;
            println!(
                "{}Removed from backlog: {}",
                app.ui.emoji_prefix(Emoji::Removed),
                item.task
            );
            Ok(())
        }
    }
}

fn handle_history(app: &App, args: HistoryArgs) -> Result<()> {
    let doc = app.load()?;
    let day = today_key();
    let entries = project_history(&doc, &day, args.kind.into());

    if entries.is_empty() {
        println!("No history entries.");
        return Ok(());
    }
    for e in &entries {
        let label = match e.kind {
            HistoryKind::Done => app.ui.green("done"),
            HistoryKind::Cancelled => app.ui.gray("cancelled"),
            HistoryKind::Archived => app.ui.cyan("archived"),
        };
        let when = e.ts.as_deref().map(time_of).unwrap_or_default();
        let suffix = if when.is_empty() {
            String::new()
        } else {
            format!(" [{when}]")
        };
        println!("{}  {label:<9}  {}{suffix}", e.date, e.task);
    }
    Ok(())
}

fn handle_timer(app: &App, args: TimerArgs) -> Result<()> {
    let session = timer::Session::new(args.work_minutes, args.break_minutes);
    for (phase, seconds) in session.phases() {
        let (start_emoji, label) = match phase {
            Phase::Work => (Emoji::Work, "WORK SESSION"),
            Phase::Break => (Emoji::Break, "BREAK TIME"),
        };
        println!(
            "{}{} ({} minutes)",
            app.ui.emoji_prefix(start_emoji),
            label,
            seconds / 60
        );
        run_countdown(seconds);
        let (end_emoji, message) = match phase {
            Phase::Work => (Emoji::Added, "Work session complete!"),
            Phase::Break => (Emoji::Complete, "Break complete!"),
        };
        println!();
        println!("{}{message}", app.ui.emoji_prefix(end_emoji));
    }
    Ok(())
}

/// One line rewritten in place per second. Ctrl-C aborts the whole process
/// mid-countdown, which is the intended way to bail out of a session.
fn run_countdown(total_seconds: u64) {
    for remaining in timer::countdown_seconds(total_seconds) {
        print!("\r{} remaining", timer::format_remaining(remaining));
        let _ = io::stdout().flush();
        thread::sleep(Duration::from_secs(1));
    }
}

fn parse_filter(expr: Option<&str>) -> Result<Filter> {
    match expr {
        Some(expr) => Ok(filter::parse(expr)?),
        None => Ok(Filter::default()),
    }
}

/* ------------------------------- Rendering ------------------------------- */

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Emoji {
    Added,
    Complete,
    BacklogAdd,
    BacklogList,
    BacklogPull,
    Newday,
    Cancelled,
    Removed,
    Work,
    Break,
    Error,
}

struct Ui {
    plain: bool,
}

impl Ui {
    /// Emoji plus a trailing space, or nothing at all in `--plain` mode.
    fn emoji_prefix(&self, e: Emoji) -> &'static str {
        if self.plain {
            return "";
        }
        match e {
            Emoji::Added => "\u{2705} ",
            Emoji::Complete => "\u{1f389} ",
            Emoji::BacklogAdd => "\u{1f4e5} ",
            Emoji::BacklogList => "\u{1f4cb} ",
            Emoji::BacklogPull => "\u{1f4e4} ",
            Emoji::Newday => "\u{1f305} ",
            Emoji::Cancelled => "\u{1f6ab} ",
            Emoji::Removed => "\u{1f5d1} ",
            Emoji::Work => "\u{1f345} ",
            Emoji::Break => "\u{2615} ",
            Emoji::Error => "\u{274c} ",
        }
    }

    fn paint(&self, code: &str, s: &str) -> String {
        if self.plain {
            s.to_string()
        } else {
            format!("\x1b[{code}m{s}\x1b[0m")
        }
    }

    fn green(&self, s: &str) -> String {
        self.paint("92", s)
    }

    fn cyan(&self, s: &str) -> String {
        self.paint("96", s)
    }

    fn bold_cyan(&self, s: &str) -> String {
        self.paint("1;96", s)
    }

    fn gray(&self, s: &str) -> String {
        self.paint("90", s)
    }
}

fn render_status(ui: &Ui, view: &StatusView) {
    println!();
    println!("=== TODAY: {} ===", view.date);

    for d in &view.done {
        println!(
            "{}{} [{}]",
            ui.emoji_prefix(Emoji::Added),
            ui.green(&d.task),
            time_of(&d.ts)
        );
    }
    if view.done.is_empty() {
        println!("No completed tasks yet.");
    }

    match &view.active {
        Some(active) => {
            println!("{}", ui.bold_cyan(&active.task));
            if !active.markers.is_empty() {
                let mut parts = Vec::new();
                if !active.markers.categories.is_empty() {
                    parts.push(format!("categories: {}", active.markers.categories.join(", ")));
                }
                if !active.markers.tags.is_empty() {
                    parts.push(format!("tags: {}", active.markers.tags.join(", ")));
                }
                println!("{}", ui.gray(&parts.join("  ")));
            }
        }
        None => println!("{}", ui.gray("TBD")),
    }

    if !view.backlog.is_empty() {
        println!("{}Backlog:", ui.emoji_prefix(Emoji::BacklogList));
        for b in &view.backlog {
            println!(" {}. {} [{}]", b.number, b.task, short_ts(&b.ts));
        }
    }

    println!("{}", "=".repeat(17 + view.date.len()));
}

fn render_backlog_lines(ui: &Ui, doc: &Document) {
    println!("{}Backlog:", ui.emoji_prefix(Emoji::BacklogList));
    for (i, item) in doc.backlog.iter().enumerate() {
        println!(" {}. {} [{}]", i + 1, item.task, short_ts(&item.ts));
    }
}

/// `HH:MM:SS` portion of a stored ISO timestamp.
fn time_of(ts: &str) -> &str {
    ts.split_once('T').map_or(ts, |(_, time)| time)
}

/// Compact `MM/DD HH:MM` for backlog listings; older stores may hold plain
/// time strings, which pass through untouched.
fn short_ts(ts: &str) -> String {
    match NaiveDateTime::parse_from_str(ts, "%Y-%m-%dT%H:%M:%S") {
        Ok(dt) => dt.format("%m/%d %H:%M").to_string(),
        Err(_) => ts.to_string(),
    }
}

/// Read one trimmed line from stdin. `None` on EOF or read failure, so
/// non-interactive callers fall through instead of hanging or crashing.
fn safe_input(prompt: &str) -> Option<String> {
    print!("{prompt}");
    io::stdout().flush().ok()?;
    let mut line = String::new();
    match io::stdin().read_line(&mut line) {
        Ok(0) | Err(_) => None,
        Ok(_) => Some(line.trim().to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn time_of_strips_the_date() {
        assert_eq!(time_of("2025-05-30T09:15:30"), "09:15:30");
        assert_eq!(time_of("09:15:30"), "09:15:30");
    }

    #[test]
    fn short_ts_formats_iso_and_passes_through_legacy() {
        assert_eq!(short_ts("2025-05-30T10:00:00"), "05/30 10:00");
        assert_eq!(short_ts("10:00:00"), "10:00:00");
    }

    #[test]
    fn plain_ui_suppresses_emoji_and_color() {
        let ui = Ui { plain: true };
        assert_eq!(ui.emoji_prefix(Emoji::Added), "");
        assert_eq!(ui.green("task"), "task");

        let fancy = Ui { plain: false };
        assert!(fancy.green("task").contains("\x1b[92m"));
    }

    #[test]
    fn history_type_maps_onto_select() {
        assert_eq!(HistorySelect::from(HistoryType::All), HistorySelect::All);
        assert_eq!(
            HistorySelect::from(HistoryType::Cancelled),
            HistorySelect::Cancelled
        );
    }
}
