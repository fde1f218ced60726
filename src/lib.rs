//! Momentum domain library: a one-task-at-a-time tracker persisted to a single
//! JSON document. The core stays pure — engine transitions mutate an in-memory
//! `Document`, and `store` is the only module that touches the filesystem.

pub mod core {
    use chrono::NaiveDateTime;
    use indexmap::IndexMap;
    use serde::{Deserialize, Serialize};

    /* ------------------------------ Document ------------------------------ */

    /// Aggregate root: the whole storage file. Date keys (`YYYY-MM-DD`) map to
    /// day records; the reserved `backlog` key holds the global queue.
    /// `IndexMap` keeps date keys in insertion order across save/load.
    #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
    pub struct Document {
        #[serde(default)]
        pub backlog: Vec<BacklogItem>,

        #[serde(flatten)]
        pub days: IndexMap<String, DayRecord>,
    }

    impl Document {
        pub fn day(&self, key: &str) -> Option<&DayRecord> {
            self.days.get(key)
        }

        /// Fetch the record for `key`, creating an empty one if missing.
        pub fn day_mut(&mut self, key: &str) -> &mut DayRecord {
            self.days.entry(key.to_string()).or_default()
        }
    }

    /// One day's slice of the document: at most one active task plus the
    /// append-ordered completion/cancellation logs.
    #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
    pub struct DayRecord {
        /// The active task text, possibly carrying inline `@category` and
        /// `#tag` markers. `None` when nothing is in focus.
        pub todo: Option<String>,

        #[serde(default)]
        pub done: Vec<DoneItem>,

        /// Tasks cancelled rather than completed. Omitted from the file while
        /// empty so documents that never cancel keep the historical shape.
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        pub cancelled: Vec<DoneItem>,
    }

    impl DayRecord {
        pub fn has_active(&self) -> bool {
            self.todo.is_some()
        }
    }

    /// A finished (or cancelled) task with its generated id and timestamp.
    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct DoneItem {
        pub id: String,
        pub task: String,
        pub ts: String,
    }

    /// A queued task waiting in the global backlog.
    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct BacklogItem {
        pub task: String,
        pub ts: String,
    }

    /* ------------------------------- Markers ------------------------------- */

    /// Inline markers extracted from task text. Categories come from `@name`
    /// words, tags from `#name` words. These are never stored separately; the
    /// text is the source of truth.
    #[derive(Debug, Clone, Default, PartialEq, Eq)]
    pub struct Markers {
        pub categories: Vec<String>,
        pub tags: Vec<String>,
    }

    impl Markers {
        pub fn is_empty(&self) -> bool {
            self.categories.is_empty() && self.tags.is_empty()
        }
    }

    pub(crate) fn is_marker_char(c: char) -> bool {
        c.is_ascii_alphanumeric() || c == '_' || c == '-'
    }

    /// Scan task text for `@category` / `#tag` words. Names are lowercased and
    /// deduplicated in first-seen order; trailing punctuation is ignored.
    pub fn scan_markers(text: &str) -> Markers {
        let mut markers = Markers::default();
        for word in text.split_whitespace() {
            let Some(rest) = word.strip_prefix(['@', '#']) else {
                continue;
            };
            let name: String = rest
                .chars()
                .take_while(|c| is_marker_char(*c))
                .collect::<String>()
                .to_lowercase();
            if name.is_empty() {
                continue;
            }
            let bucket = if word.starts_with('@') {
                &mut markers.categories
            } else {
                &mut markers.tags
            };
            if !bucket.contains(&name) {
                bucket.push(name);
            }
        }
        markers
    }

    /* ----------------------------- Identifiers ----------------------------- */

    /// Short unique id for done records: the first 8 hex chars of a v4 UUID.
    pub fn new_task_id() -> String {
        let mut id = uuid::Uuid::new_v4().simple().to_string();
        id.truncate(8);
        id
    }

    /// Seconds-precision ISO-8601 rendering used for every stored timestamp.
    pub fn iso_seconds(ts: NaiveDateTime) -> String {
        ts.format("%Y-%m-%dT%H:%M:%S").to_string()
    }

    /* ------------------------------- Errors ------------------------------- */

    #[derive(Debug, thiserror::Error)]
    pub enum DomainError {
        #[error("active task already exists: {0}")]
        ActiveTaskExists(String),
        #[error("no active task")]
        NoActiveTask,
        #[error("task name cannot be empty")]
        EmptyTask,
        #[error("backlog is empty")]
        BacklogEmpty,
        #[error("invalid backlog index: {index} (valid: 1..={len})")]
        IndexOutOfRange { index: usize, len: usize },
        #[error("invalid filter: {0}")]
        InvalidFilter(String),
    }

}

pub mod filter {
    //! Filter expressions for `status` and `backlog list`: a comma-separated
    //! list of `@category` and `#tag` tokens, e.g. `@work,#urgent`. Matching
    //! is case-insensitive OR logic over the markers found in each task's text.

    use nom::{
        IResult,
        bytes::complete::take_while1,
        character::complete::{char, multispace0, one_of},
        combinator::all_consuming,
        multi::separated_list1,
        sequence::{delimited, pair},
    };

    use super::core::{DomainError, is_marker_char, scan_markers};

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum TokenKind {
        Category,
        Tag,
    }

    #[derive(Debug, Clone, PartialEq, Eq)]
    pub struct FilterToken {
        pub kind: TokenKind,
        pub name: String,
    }

    /// A parsed filter. Empty means "match everything".
    #[derive(Debug, Clone, Default, PartialEq, Eq)]
    pub struct Filter {
        tokens: Vec<FilterToken>,
    }

    impl Filter {
        pub fn is_empty(&self) -> bool {
            self.tokens.is_empty()
        }

        pub fn tokens(&self) -> &[FilterToken] {
            &self.tokens
        }

        /// OR semantics: a task passes when any filter token appears among the
        /// markers scanned from its text. An empty filter passes everything.
        pub fn matches(&self, text: &str) -> bool {
            if self.tokens.is_empty() {
                return true;
            }
            let markers = scan_markers(text);
            self.tokens.iter().any(|t| match t.kind {
                TokenKind::Category => markers.categories.contains(&t.name),
                TokenKind::Tag => markers.tags.contains(&t.name),
            })
        }
    }

    fn token(i: &str) -> IResult<&str, FilterToken> {
        let (i, (prefix, name)) = delimited(
            multispace0,
            pair(one_of("@#"), take_while1(is_marker_char)),
            multispace0,
        )(i)?;
        let kind = if prefix == '@' {
            TokenKind::Category
        } else {
            TokenKind::Tag
        };
        Ok((
            i,
            FilterToken {
                kind,
                name: name.to_lowercase(),
            },
        ))
    }

    /// Parse a filter expression. `None` or blank input yields the empty
    /// filter; anything that is not a clean token list is `InvalidFilter`.
    pub fn parse(expr: &str) -> Result<Filter, DomainError> {
        let trimmed = expr.trim();
        if trimmed.is_empty() {
            return Ok(Filter::default());
        }
        let (_, tokens) = all_consuming(separated_list1(char(','), token))(trimmed)
            .map_err(|_| DomainError::InvalidFilter(describe_bad_token(trimmed)))?;

        let mut deduped: Vec<FilterToken> = Vec::new();
        for t in tokens {
            if !deduped.contains(&t) {
                deduped.push(t);
            }
        }
        Ok(Filter { tokens: deduped })
    }

    /// Point at the first malformed token so the message names the culprit.
    fn describe_bad_token(expr: &str) -> String {
        for part in expr.split(',') {
            let part = part.trim();
            if part.is_empty() {
                return "empty token in filter expression".to_string();
            }
            let Some(name) = part.strip_prefix(['@', '#']) else {
                return format!("token `{part}` must start with '@' or '#'");
            };
            if name.is_empty() || !name.chars().all(is_marker_char) {
                return format!(
                    "token `{part}` may only contain letters, digits, '_' or '-'"
                );
            }
        }
        "malformed filter expression".to_string()
    }

}

pub mod store {
    //! Load/save for the JSON document. Writes go through a sibling temp file
    //! and an atomic rename, so a crash mid-write never leaves a partial store.
    //! A corrupt store is backed up before the error is surfaced — overwriting
    //! it with a fresh empty document would silently destroy prior data.

    use std::ffi::OsString;
    use std::fs::{self, File};
    use std::io::Write;
    use std::path::{Path, PathBuf};

    use super::core::Document;

    #[derive(Debug, thiserror::Error)]
    pub enum StoreError {
        #[error("corrupt store at {path} (backup saved to {backup}): {source}")]
        Corrupt {
            path: PathBuf,
            backup: PathBuf,
            source: serde_json::Error,
        },
        #[error("failed to read {path}")]
        Read {
            path: PathBuf,
            source: std::io::Error,
        },
        #[error("failed to write {path}")]
        Write {
            path: PathBuf,
            source: std::io::Error,
        },
        #[error("failed to serialize store")]
        Serialize(#[from] serde_json::Error),
    }

    /// `<path>.suffix` with the suffix appended, not substituted, so
    /// `storage.json` becomes `storage.json.tmp` rather than `storage.tmp`.
    fn sibling(path: &Path, suffix: &str) -> PathBuf {
        let mut name = OsString::from(path.as_os_str());
        name.push(suffix);
        PathBuf::from(name)
    }

    /// Read the document at `path`. A missing file is an empty document; a
    /// present-but-unreadable file is `Corrupt`, with a backup copy written
    /// next to the original first.
    pub fn load(path: &Path) -> Result<Document, StoreError> {
        if !path.exists() {
            return Ok(Document::default());
        }
        let raw = fs::read_to_string(path).map_err(|source| StoreError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        match serde_json::from_str(&raw) {
            Ok(doc) => Ok(doc),
            Err(source) => {
                let backup = sibling(path, ".corrupt");
                fs::copy(path, &backup).map_err(|err| StoreError::Write {
                    path: backup.clone(),
                    source: err,
                })?;
                Err(StoreError::Corrupt {
                    path: path.to_path_buf(),
                    backup,
                    source,
                })
            }
        }
    }

    /// Serialize `doc` and atomically replace `path`: write a sibling temp
    /// file, flush it, then rename over the target.
    pub fn save(path: &Path, doc: &Document) -> Result<(), StoreError> {
        let body = serde_json::to_string_pretty(doc)?;

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|source| StoreError::Write {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
        }

        let tmp = sibling(path, ".tmp");
        let write_err = |source| StoreError::Write {
            path: tmp.clone(),
            source,
        };
        let mut file = File::create(&tmp).map_err(write_err)?;
        file.write_all(body.as_bytes()).map_err(write_err)?;
        file.flush().map_err(write_err)?;
        drop(file);

        fs::rename(&tmp, path).map_err(|source| StoreError::Write {
            path: path.to_path_buf(),
            source,
        })
    }

}

pub mod engine {
    //! Pure state transitions over a `Document`. Nothing here performs I/O;
    //! callers load, transition, then save. Per date key the machine is
    //! `NoActiveTask -> ActiveTask -> (Done | Cancelled)`, looping back after
    //! completion, cancellation, or `newday`.

    use chrono::NaiveDateTime;

    use super::core::{
        BacklogItem, Document, DomainError, DoneItem, iso_seconds, new_task_id,
    };
    use super::filter::Filter;

    /// Set the active task for `day`. At most one task may be in focus.
    pub fn add(doc: &mut Document, day: &str, text: &str) -> Result<(), DomainError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(DomainError::EmptyTask);
        }
        let rec = doc.day_mut(day);
        if let Some(existing) = &rec.todo {
            return Err(DomainError::ActiveTaskExists(existing.clone()));
        }
        rec.todo = Some(text.to_string());
        Ok(())
    }

    /// Move the active task into the day's `done` log with a fresh id and the
    /// completion timestamp.
    pub fn complete(
        doc: &mut Document,
        day: &str,
        now: NaiveDateTime,
    ) -> Result<DoneItem, DomainError> {
        let rec = doc.day_mut(day);
        let task = rec.todo.take().ok_or(DomainError::NoActiveTask)?;
        let item = DoneItem {
            id: new_task_id(),
            task,
            ts: iso_seconds(now),
        };
        rec.done.push(item.clone());
        Ok(item)
    }

    /// Drop the active task without completing it. The record lands in the
    /// day's `cancelled` log, never in `done`.
    pub fn cancel(
        doc: &mut Document,
        day: &str,
        now: NaiveDateTime,
    ) -> Result<DoneItem, DomainError> {
        let rec = doc.day_mut(day);
        let task = rec.todo.take().ok_or(DomainError::NoActiveTask)?;
        let item = DoneItem {
            id: new_task_id(),
            task,
            ts: iso_seconds(now),
        };
        rec.cancelled.push(item.clone());
        Ok(item)
    }

    /// Initialize `day` with an empty record if absent. Prior days are left
    /// untouched; an incomplete `todo` simply stays archived under its own
    /// date key, where the history projector can find it.
    pub fn newday(doc: &mut Document, day: &str) {
        doc.day_mut(day);
    }

    /// Append to the global backlog.
    pub fn backlog_add(
        doc: &mut Document,
        text: &str,
        now: NaiveDateTime,
    ) -> Result<BacklogItem, DomainError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(DomainError::EmptyTask);
        }
        let item = BacklogItem {
            task: text.to_string(),
            ts: iso_seconds(now),
        };
        doc.backlog.push(item.clone());
        Ok(item)
    }

    /// Lazy, restartable walk over backlog items passing `filter`, paired with
    /// their absolute 0-based positions (stable under filtering, so the
    /// numbers remain valid `pull`/`remove` arguments).
    pub fn backlog_iter<'a>(
        doc: &'a Document,
        filter: &'a Filter,
    ) -> impl Iterator<Item = (usize, &'a BacklogItem)> + 'a {
        doc.backlog
            .iter()
            .enumerate()
            .filter(|(_, item)| filter.matches(&item.task))
    }

    /// Remove a backlog item (front of the queue when `index` is `None`) and
    /// make it `day`'s active task.
    pub fn backlog_pull(
        doc: &mut Document,
        day: &str,
        index: Option<usize>,
    ) -> Result<BacklogItem, DomainError> {
        if let Some(existing) = &doc.day_mut(day).todo {
            return Err(DomainError::ActiveTaskExists(existing.clone()));
        }
        let item = take_backlog_item(doc, index)?;
        doc.day_mut(day).todo = Some(item.task.clone());
        Ok(item)
    }

    /// Remove a backlog item without activating it.
    pub fn backlog_remove(doc: &mut Document, index: usize) -> Result<BacklogItem, DomainError> {
        take_backlog_item(doc, Some(index))
    }

    fn take_backlog_item(
        doc: &mut Document,
        index: Option<usize>,
    ) -> Result<BacklogItem, DomainError> {
        let len = doc.backlog.len();
        if len == 0 {
            return Err(DomainError::BacklogEmpty);
        }
        let idx = index.unwrap_or(0);
        if idx >= len {
            // report the 1-based number the user typed
            return Err(DomainError::IndexOutOfRange {
                index: idx + 1,
                len,
            });
        }
        Ok(doc.backlog.remove(idx))
    }

    #[cfg(test)]
    mod tests {
        use super::*;
        use chrono::NaiveDate;

        const DAY: &str = "2025-05-30";

        fn noon() -> NaiveDateTime {
            NaiveDate::from_ymd_opt(2025, 5, 30)
                .unwrap()
                .and_hms_opt(12, 0, 0)
                .unwrap()
        }

        #[test]
        fn add_then_complete_moves_task_to_done() {
            let mut doc = Document::default();
            add(&mut doc, DAY, "Write docs @work #urgent").unwrap();

            let item = complete(&mut doc, DAY, noon()).unwrap();
            assert_eq!(item.task, "Write docs @work #urgent");
            assert_eq!(item.ts, "2025-05-30T12:00:00");
            assert_eq!(item.id.len(), 8);

            let rec = doc.day(DAY).unwrap();
            assert!(rec.todo.is_none());
            assert_eq!(rec.done.len(), 1);
            assert!(rec.cancelled.is_empty());
        }

        #[test]
        fn second_add_without_completion_fails() {
            let mut doc = Document::default();
            add(&mut doc, DAY, "First").unwrap();
            let err = add(&mut doc, DAY, "Second").unwrap_err();
            assert!(matches!(err, DomainError::ActiveTaskExists(t) if t == "First"));
        }

        #[test]
        fn add_trims_and_rejects_blank_text() {
            let mut doc = Document::default();
            assert!(matches!(
                add(&mut doc, DAY, "   "),
                Err(DomainError::EmptyTask)
            ));
            add(&mut doc, DAY, "  padded  ").unwrap();
            assert_eq!(doc.day(DAY).unwrap().todo.as_deref(), Some("padded"));
        }

        #[test]
        fn complete_without_active_task_fails() {
            let mut doc = Document::default();
            assert!(matches!(
                complete(&mut doc, DAY, noon()),
                Err(DomainError::NoActiveTask)
            ));
        }

        #[test]
        fn cancel_records_separately_from_done() {
            let mut doc = Document::default();
            add(&mut doc, DAY, "Doomed").unwrap();
            cancel(&mut doc, DAY, noon()).unwrap();

            let rec = doc.day(DAY).unwrap();
            assert!(rec.todo.is_none());
            assert!(rec.done.is_empty());
            assert_eq!(rec.cancelled.len(), 1);
            assert_eq!(rec.cancelled[0].task, "Doomed");

            // the day is idle again, so a new task may start
            add(&mut doc, DAY, "Fresh").unwrap();
        }

        #[test]
        fn newday_initializes_and_leaves_prior_days_alone() {
            let mut doc = Document::default();
            add(&mut doc, "2025-05-29", "Leftover").unwrap();

            newday(&mut doc, DAY);
            assert!(doc.day(DAY).is_some());
            assert_eq!(
                doc.day("2025-05-29").unwrap().todo.as_deref(),
                Some("Leftover")
            );
        }

        #[test]
        fn backlog_pull_defaults_to_front_of_queue() {
            let mut doc = Document::default();
            backlog_add(&mut doc, "A", noon()).unwrap();
            backlog_add(&mut doc, "B", noon()).unwrap();

            let pulled = backlog_pull(&mut doc, DAY, None).unwrap();
            assert_eq!(pulled.task, "A");
            assert_eq!(doc.day(DAY).unwrap().todo.as_deref(), Some("A"));
            assert_eq!(doc.backlog.len(), 1);
            assert_eq!(doc.backlog[0].task, "B");
        }

        #[test]
        fn backlog_pull_by_index_takes_that_item() {
            let mut doc = Document::default();
            backlog_add(&mut doc, "A", noon()).unwrap();
            backlog_add(&mut doc, "B", noon()).unwrap();

            let pulled = backlog_pull(&mut doc, DAY, Some(1)).unwrap();
            assert_eq!(pulled.task, "B");
            assert_eq!(doc.backlog[0].task, "A");
        }

        #[test]
        fn backlog_pull_refuses_while_task_is_active() {
            let mut doc = Document::default();
            add(&mut doc, DAY, "Busy").unwrap();
            backlog_add(&mut doc, "Queued", noon()).unwrap();

            let err = backlog_pull(&mut doc, DAY, None).unwrap_err();
            assert!(matches!(err, DomainError::ActiveTaskExists(_)));
            assert_eq!(doc.backlog.len(), 1);
        }

        #[test]
        fn backlog_errors_for_empty_and_out_of_range() {
            let mut doc = Document::default();
            assert!(matches!(
                backlog_pull(&mut doc, DAY, None),
                Err(DomainError::BacklogEmpty)
            ));

            backlog_add(&mut doc, "Only", noon()).unwrap();
            let err = backlog_pull(&mut doc, DAY, Some(4)).unwrap_err();
            assert!(matches!(
                err,
                DomainError::IndexOutOfRange { index: 5, len: 1 }
            ));
        }

        #[test]
        fn backlog_remove_drops_without_activating() {
            let mut doc = Document::default();
            backlog_add(&mut doc, "A", noon()).unwrap();
            backlog_add(&mut doc, "B", noon()).unwrap();

            let removed = backlog_remove(&mut doc, 0).unwrap();
            assert_eq!(removed.task, "A");
            assert_eq!(doc.backlog.len(), 1);
            assert!(doc.day(DAY).is_none());
        }

        #[test]
        fn backlog_iter_filters_and_keeps_absolute_positions() {
            let mut doc = Document::default();
            backlog_add(&mut doc, "Email @work", noon()).unwrap();
            backlog_add(&mut doc, "Groceries @personal", noon()).unwrap();
            backlog_add(&mut doc, "Review @work", noon()).unwrap();

            let f = crate::filter::parse("@work").unwrap();
            let hits: Vec<_> = backlog_iter(&doc, &f).collect();
            assert_eq!(hits.len(), 2);
            assert_eq!(hits[0].0, 0);
            assert_eq!(hits[1].0, 2);

            // restartable: a second pass sees the same items
            assert_eq!(backlog_iter(&doc, &f).count(), 2);
        }
    }
}

pub mod timer {
    //! Pomodoro session schedule: one work phase followed by one break phase.
    //! This module only computes the schedule and the countdown display text;
    //! the CLI owns the sleep loop and terminal output.

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum Phase {
        Work,
        Break,
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Session {
        pub work_minutes: u64,
        pub break_minutes: u64,
    }

    pub const DEFAULT_BREAK_MINUTES: u64 = 5;

    impl Session {
        pub fn new(work_minutes: u64, break_minutes: u64) -> Self {
            Self {
                work_minutes,
                break_minutes,
            }
        }

        /// Phases in running order with their durations in seconds. A
        /// zero-minute phase is skipped rather than producing an empty
        /// countdown.
        pub fn phases(self) -> impl Iterator<Item = (Phase, u64)> {
            [
                (Phase::Work, self.work_minutes * 60),
                (Phase::Break, self.break_minutes * 60),
            ]
            .into_iter()
            .filter(|(_, seconds)| *seconds > 0)
        }
    }

    /// Seconds left at each tick, counting down to one. The caller sleeps
    /// between items.
    pub fn countdown_seconds(total: u64) -> impl Iterator<Item = u64> {
        (1..=total).rev()
    }

    /// `MM:SS` display for the countdown line.
    pub fn format_remaining(seconds: u64) -> String {
        format!("{:02}:{:02}", seconds / 60, seconds % 60)
    }

}

pub mod views {
    //! Read models for rendering. Projectors build these from a `Document`;
    //! the CLI only formats them.

    use super::core::{DoneItem, Markers};

    /// Everything `status` shows for one day.
    #[derive(Debug, Clone, PartialEq)]
    pub struct StatusView {
        pub date: String,
        pub done: Vec<DoneItem>,
        pub active: Option<ActiveTask>,
        pub backlog: Vec<BacklogEntry>,
    }

    /// The task in focus, with its inline markers pre-extracted for display.
    #[derive(Debug, Clone, PartialEq)]
    pub struct ActiveTask {
        pub task: String,
        pub markers: Markers,
    }

    /// A backlog line. `number` is the 1-based absolute position, valid as a
    /// `pull`/`remove` argument even when the listing is filtered.
    #[derive(Debug, Clone, PartialEq)]
    pub struct BacklogEntry {
        pub number: usize,
        pub task: String,
        pub ts: String,
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum HistoryKind {
        Done,
        Cancelled,
        Archived,
    }

    /// Which entries `history` should include.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum HistorySelect {
        Done,
        Cancelled,
        Archived,
        All,
    }

    impl HistorySelect {
        pub fn includes(self, kind: HistoryKind) -> bool {
            match self {
                Self::All => true,
                Self::Done => kind == HistoryKind::Done,
                Self::Cancelled => kind == HistoryKind::Cancelled,
                Self::Archived => kind == HistoryKind::Archived,
            }
        }
    }

    /// One line of `history` output, across all date keys.
    #[derive(Debug, Clone, PartialEq)]
    pub struct HistoryEntry {
        pub date: String,
        pub kind: HistoryKind,
        pub task: String,
        /// Generated id for done/cancelled records; archived tasks have none.
        pub id: Option<String>,
        pub ts: Option<String>,
    }
}

pub mod projectors {
    //! Build view values from the document. Pure functions, same shape as the
    //! engine: the caller supplies "today" so projections stay deterministic.

    use chrono::NaiveDate;

    use super::core::{Document, scan_markers};
    use super::engine::backlog_iter;
    use super::filter::Filter;
    use super::views::{
        ActiveTask, BacklogEntry, HistoryEntry, HistoryKind, HistorySelect, StatusView,
    };

    /// Project the status view for `day`. The filter applies to completed
    /// tasks, the active task, and the backlog alike.
    pub fn project_status(doc: &Document, day: &str, filter: &Filter) -> StatusView {
        let rec = doc.day(day);

        let done = rec
            .map(|r| {
                r.done
                    .iter()
                    .filter(|d| filter.matches(&d.task))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        let active = rec
            .and_then(|r| r.todo.as_ref())
            .filter(|t| filter.matches(t))
            .map(|t| ActiveTask {
                task: t.clone(),
                markers: scan_markers(t),
            });

        let backlog = backlog_iter(doc, filter)
            .map(|(i, item)| BacklogEntry {
                number: i + 1,
                task: item.task.clone(),
                ts: item.ts.clone(),
            })
            .collect();

        StatusView {
            date: day.to_string(),
            done,
            active,
            backlog,
        }
    }

    /// Walk every date key in document order and collect history entries.
    /// Archived entries are incomplete `todo`s on days strictly before
    /// `today`; today's active task is still in play, not history.
    pub fn project_history(doc: &Document, today: &str, select: HistorySelect) -> Vec<HistoryEntry> {
        let today_date = NaiveDate::parse_from_str(today, "%Y-%m-%d").ok();
        let mut out = Vec::new();

        for (date, rec) in &doc.days {
            if select.includes(HistoryKind::Done) {
                for d in &rec.done {
                    out.push(HistoryEntry {
                        date: date.clone(),
                        kind: HistoryKind::Done,
                        task: d.task.clone(),
                        id: Some(d.id.clone()),
                        ts: Some(d.ts.clone()),
                    });
                }
            }
            if select.includes(HistoryKind::Cancelled) {
                for c in &rec.cancelled {
                    out.push(HistoryEntry {
                        date: date.clone(),
                        kind: HistoryKind::Cancelled,
                        task: c.task.clone(),
                        id: Some(c.id.clone()),
                        ts: Some(c.ts.clone()),
                    });
                }
            }
            if select.includes(HistoryKind::Archived) {
                let is_prior = NaiveDate::parse_from_str(date, "%Y-%m-%d")
                    .ok()
                    .zip(today_date)
                    .is_some_and(|(d, t)| d < t);
                if is_prior {
                    if let Some(todo) = &rec.todo {
                        out.push(HistoryEntry {
                            date: date.clone(),
                            kind: HistoryKind::Archived,
                            task: todo.clone(),
                            id: None,
                            ts: None,
                        });
                    }
                }
            }
        }
        out
    }

    #[cfg(test)]
    mod tests {
        use super::*;
        use crate::engine;
        use chrono::{NaiveDate, NaiveDateTime};

        const DAY: &str = "2025-05-30";

        fn noon() -> NaiveDateTime {
            NaiveDate::from_ymd_opt(2025, 5, 30)
                .unwrap()
                .and_hms_opt(12, 0, 0)
                .unwrap()
        }

        fn sample() -> Document {
            let mut doc = Document::default();
            engine::add(&mut doc, "2025-05-28", "Stale @work").unwrap();
            engine::add(&mut doc, "2025-05-29", "Rejected @client").unwrap();
            engine::cancel(&mut doc, "2025-05-29", noon()).unwrap();
            engine::add(&mut doc, DAY, "Write docs @work #urgent").unwrap();
            engine::backlog_add(&mut doc, "Email @work", noon()).unwrap();
            engine::backlog_add(&mut doc, "Groceries @personal", noon()).unwrap();
            doc
        }

        #[test]
        fn status_extracts_markers_from_active_task() {
            let doc = sample();
            let view = project_status(&doc, DAY, &Filter::default());

            let active = view.active.expect("active task");
            assert_eq!(active.task, "Write docs @work #urgent");
            assert_eq!(active.markers.categories, vec!["work"]);
            assert_eq!(active.markers.tags, vec!["urgent"]);
            assert_eq!(view.backlog.len(), 2);
        }

        #[test]
        fn status_filter_applies_to_active_and_backlog() {
            let doc = sample();
            let f = crate::filter::parse("@personal").unwrap();
            let view = project_status(&doc, DAY, &f);

            assert!(view.active.is_none());
            assert_eq!(view.backlog.len(), 1);
            assert_eq!(view.backlog[0].task, "Groceries @personal");
            assert_eq!(view.backlog[0].number, 2);
        }

        #[test]
        fn status_filter_is_case_insensitive() {
            let doc = sample();
            let upper = project_status(&doc, DAY, &crate::filter::parse("@WORK").unwrap());
            let lower = project_status(&doc, DAY, &crate::filter::parse("@work").unwrap());
            assert_eq!(upper, lower);
            assert!(upper.active.is_some());
        }

        #[test]
        fn status_after_completion_shows_no_active_task() {
            let mut doc = sample();
            engine::complete(&mut doc, DAY, noon()).unwrap();

            let view = project_status(&doc, DAY, &Filter::default());
            assert!(view.active.is_none());
            assert_eq!(view.done.len(), 1);
            assert_eq!(view.done[0].task, "Write docs @work #urgent");
        }

        #[test]
        fn history_selects_by_kind() {
            let mut doc = sample();
            engine::complete(&mut doc, DAY, noon()).unwrap();

            let cancelled = project_history(&doc, DAY, HistorySelect::Cancelled);
            assert_eq!(cancelled.len(), 1);
            assert_eq!(cancelled[0].task, "Rejected @client");
            assert!(cancelled[0].id.is_some());

            let archived = project_history(&doc, DAY, HistorySelect::Archived);
            assert_eq!(archived.len(), 1);
            assert_eq!(archived[0].task, "Stale @work");
            assert_eq!(archived[0].date, "2025-05-28");
            assert!(archived[0].ts.is_none());

            let all = project_history(&doc, DAY, HistorySelect::All);
            assert_eq!(all.len(), 3);
        }

        #[test]
        fn todays_active_task_is_not_archived() {
            let doc = sample();
            let archived = project_history(&doc, DAY, HistorySelect::Archived);
            assert!(archived.iter().all(|e| e.date != DAY));
        }
    }
}
