use crate::{
    catalog::{self, Mod},
    config::{self, AppConfig},
    core::{CoreError, ModCore, NativeCore},
};
use anyhow::{Context, Result};
use std::{
    fs,
    io::Write,
    path::PathBuf,
    time::{Duration, Instant},
};
use time::{format_description::FormatItem, macros::format_description, OffsetDateTime};

const MESSAGE_CAPACITY: usize = 200;
const TOAST_SECS: u64 = 4;
const MESSAGE_TIME_FORMAT: &[FormatItem<'static>] =
    format_description!("[hour]:[minute]:[second]");

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Success,
    Error,
}

/// One entry of the user-visible message feed. The feed is append-only;
/// nothing in the application reads it back.
#[derive(Debug, Clone)]
pub struct Message {
    pub text: String,
    pub severity: Severity,
    pub at: OffsetDateTime,
}

impl Message {
    pub fn timestamp(&self) -> String {
        self.at.format(MESSAGE_TIME_FORMAT).unwrap_or_default()
    }
}

#[derive(Debug, Clone)]
pub struct Toast {
    pub message: String,
    pub level: Severity,
    pub expires_at: Instant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DialogChoice {
    Yes,
    No,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DialogKind {
    ReindexUntracked,
}

#[derive(Debug, Clone)]
pub struct Dialog {
    pub title: String,
    pub message: String,
    pub yes_label: String,
    pub no_label: String,
    pub choice: DialogChoice,
    pub kind: DialogKind,
}

pub struct App {
    pub core: Box<dyn ModCore>,
    pub mods: Vec<Mod>,
    pub messages: Vec<Message>,
    pub status: String,
    pub dialog: Option<Dialog>,
    pub toast: Option<Toast>,
    pub selected: usize,
    pub message_scroll: usize,
    pub should_quit: bool,
    log_path: PathBuf,
}

impl App {
    pub fn initialize() -> Result<Self> {
        let config = AppConfig::load_or_create()?;
        let data_dir = config::base_data_dir()?;
        let mods_dir = config.mods_dir()?;
        fs::create_dir_all(&mods_dir).context("create mods dir")?;
        let core = NativeCore::new(data_dir.clone(), mods_dir, config.catalog_url.clone());
        let log_path = data_dir.join("modhearth.log");

        let mut app = Self {
            core: Box::new(core),
            mods: Vec::new(),
            messages: Vec::new(),
            status: "Press f to fetch the mod list".to_string(),
            dialog: None,
            toast: None,
            selected: 0,
            message_scroll: 0,
            should_quit: false,
            log_path,
        };
        app.push_message("Modhearth started", Severity::Info);
        Ok(app)
    }

    #[cfg(test)]
    fn with_core(core: Box<dyn ModCore>, log_path: PathBuf) -> Self {
        Self {
            core,
            mods: Vec::new(),
            messages: Vec::new(),
            status: String::new(),
            dialog: None,
            toast: None,
            selected: 0,
            message_scroll: 0,
            should_quit: false,
            log_path,
        }
    }

    /// Fetches the catalog through the adapter. Adapter failures surface
    /// here, on the feed; the adapter itself does not recover.
    pub fn refresh_mod_list(&mut self) {
        match catalog::fetch_mod_list(self.core.as_ref()) {
            Ok(mods) => {
                self.status = format!("{} mods in catalog", mods.len());
                self.push_message(format!("Mod list loaded ({})", mods.len()), Severity::Info);
                self.mods = mods;
                self.clamp_selection();
            }
            Err(err) => {
                self.status = "Mod list unavailable".to_string();
                self.push_message(format!("Failed to load mod list: {err:#}"), Severity::Error);
            }
        }
    }

    /// First half of the reindex workflow. With untracked mods present the
    /// actual reindex waits for the user's explicit confirmation; with a
    /// clean folder it runs right away.
    pub fn perform_reindex_mods(&mut self) {
        match self.check_and_reindex() {
            Ok(true) => self.open_untracked_warning(),
            Ok(false) => {
                self.status = "Mod index rebuilt".to_string();
                self.push_message("Mods re-indexed successfully", Severity::Success);
            }
            Err(err) => {
                self.status = "Reindex failed".to_string();
                self.push_message(format!("Failed to check mod status: {err}"), Severity::Error);
            }
        }
    }

    /// Returns whether untracked mods were found; reindexes inline when the
    /// folder is clean.
    fn check_and_reindex(&self) -> Result<bool, CoreError> {
        if self.core.has_untracked_mods()? {
            return Ok(true);
        }
        self.core.refresh_mods_folder()?;
        Ok(false)
    }

    /// Second half of the workflow, run after the user confirms despite
    /// untracked mods. The warning dialog is closed on every path.
    pub fn confirm_reindex(&mut self) {
        match self.core.refresh_mods_folder() {
            Ok(()) => {
                self.status = "Mod index rebuilt".to_string();
                self.push_message("Mods re-indexed successfully", Severity::Success);
            }
            Err(err) => {
                self.status = "Reindex failed".to_string();
                self.push_message(format!("Failed to re-index mods: {err}"), Severity::Error);
            }
        }
        self.close_dialog();
    }

    fn open_untracked_warning(&mut self) {
        self.status = "Untracked mods detected".to_string();
        self.open_dialog(Dialog {
            title: "Untracked mods detected".to_string(),
            message: "The mods folder contains mods the index does not track.\n\
                      Re-indexing will pick them up. Continue?"
                .to_string(),
            yes_label: "Re-index".to_string(),
            no_label: "Cancel".to_string(),
            choice: DialogChoice::No,
            kind: DialogKind::ReindexUntracked,
        });
    }

    fn open_dialog(&mut self, dialog: Dialog) {
        self.dialog = Some(dialog);
    }

    pub fn close_dialog(&mut self) {
        self.dialog = None;
    }

    pub fn dialog_choice_left(&mut self) {
        if let Some(dialog) = &mut self.dialog {
            dialog.choice = DialogChoice::Yes;
        }
    }

    pub fn dialog_choice_right(&mut self) {
        if let Some(dialog) = &mut self.dialog {
            dialog.choice = DialogChoice::No;
        }
    }

    pub fn dialog_set_choice(&mut self, choice: DialogChoice) {
        if let Some(dialog) = &mut self.dialog {
            dialog.choice = choice;
        }
    }

    pub fn dialog_confirm(&mut self) {
        let Some(dialog) = self.dialog.take() else {
            return;
        };
        match (dialog.kind, dialog.choice) {
            (DialogKind::ReindexUntracked, DialogChoice::Yes) => self.confirm_reindex(),
            (DialogKind::ReindexUntracked, DialogChoice::No) => {}
        }
    }

    pub fn push_message(&mut self, text: impl Into<String>, severity: Severity) {
        let text = text.into();
        if self.message_scroll > 0 {
            self.message_scroll = self.message_scroll.saturating_add(1);
        }

        self.messages.push(Message {
            text: text.clone(),
            severity,
            at: OffsetDateTime::now_utc(),
        });

        if self.messages.len() > MESSAGE_CAPACITY {
            let overflow = self.messages.len() - MESSAGE_CAPACITY;
            self.messages.drain(0..overflow);
            self.message_scroll = self.message_scroll.saturating_sub(overflow);
        }

        if matches!(severity, Severity::Success | Severity::Error) {
            self.set_toast(&text, severity, Duration::from_secs(TOAST_SECS));
        }

        let _ = append_log_file(&self.log_path, severity, &text);
    }

    pub fn set_toast(&mut self, message: &str, level: Severity, duration: Duration) {
        self.toast = Some(Toast {
            message: message.to_string(),
            level,
            expires_at: Instant::now() + duration,
        });
    }

    pub fn tick(&mut self) {
        if let Some(toast) = &self.toast {
            if toast.expires_at <= Instant::now() {
                self.toast = None;
            }
        }
    }

    pub fn select_next(&mut self) {
        if !self.mods.is_empty() {
            self.selected = (self.selected + 1).min(self.mods.len() - 1);
        }
    }

    pub fn select_prev(&mut self) {
        self.selected = self.selected.saturating_sub(1);
    }

    pub fn clamp_selection(&mut self) {
        if self.mods.is_empty() {
            self.selected = 0;
        } else if self.selected >= self.mods.len() {
            self.selected = self.mods.len() - 1;
        }
    }

    pub fn scroll_messages_up(&mut self, lines: usize) {
        let limit = self.messages.len().saturating_sub(1);
        self.message_scroll = self.message_scroll.saturating_add(lines).min(limit);
    }

    pub fn scroll_messages_down(&mut self, lines: usize) {
        self.message_scroll = self.message_scroll.saturating_sub(lines);
    }
}

fn severity_label(severity: Severity) -> &'static str {
    match severity {
        Severity::Info => "INFO",
        Severity::Success => "OK",
        Severity::Error => "ERROR",
    }
}

fn append_log_file(path: &PathBuf, severity: Severity, message: &str) -> std::io::Result<()> {
    let label = severity_label(severity);
    let mut file = fs::OpenOptions::new().create(true).append(true).open(path)?;
    writeln!(file, "[{label}] {message}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;
    use std::{cell::Cell, rc::Rc};

    #[derive(Clone)]
    struct ScriptedCore {
        untracked: Result<bool, String>,
        refresh_error: Option<String>,
        refresh_calls: Rc<Cell<usize>>,
    }

    impl ScriptedCore {
        fn new(untracked: Result<bool, String>, refresh_error: Option<String>) -> Self {
            Self {
                untracked,
                refresh_error,
                refresh_calls: Rc::new(Cell::new(0)),
            }
        }
    }

    impl ModCore for ScriptedCore {
        fn mod_list(&self) -> Result<Value, CoreError> {
            Ok(Value::Array(Vec::new()))
        }

        fn has_untracked_mods(&self) -> Result<bool, CoreError> {
            self.untracked.clone().map_err(CoreError::Index)
        }

        fn refresh_mods_folder(&self) -> Result<(), CoreError> {
            self.refresh_calls.set(self.refresh_calls.get() + 1);
            match &self.refresh_error {
                Some(error) => Err(CoreError::Index(error.clone())),
                None => Ok(()),
            }
        }
    }

    fn test_app(core: ScriptedCore) -> (App, tempfile::TempDir) {
        let tmp = tempfile::tempdir().unwrap();
        let app = App::with_core(Box::new(core), tmp.path().join("modhearth.log"));
        (app, tmp)
    }

    fn workflow_messages(app: &App) -> Vec<&Message> {
        app.messages
            .iter()
            .filter(|message| message.severity != Severity::Info)
            .collect()
    }

    #[test]
    fn untracked_mods_open_the_warning_without_reindexing() {
        let core = ScriptedCore::new(Ok(true), None);
        let refresh_calls = Rc::clone(&core.refresh_calls);
        let (mut app, _tmp) = test_app(core);

        app.perform_reindex_mods();

        let dialog = app.dialog.as_ref().expect("warning dialog should open");
        assert_eq!(dialog.kind, DialogKind::ReindexUntracked);
        assert_eq!(refresh_calls.get(), 0);
        assert!(workflow_messages(&app).is_empty());
    }

    #[test]
    fn clean_folder_reindexes_once_with_a_success_message() {
        let core = ScriptedCore::new(Ok(false), None);
        let refresh_calls = Rc::clone(&core.refresh_calls);
        let (mut app, _tmp) = test_app(core);

        app.perform_reindex_mods();

        assert_eq!(refresh_calls.get(), 1);
        assert!(app.dialog.is_none());
        let messages = workflow_messages(&app);
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].severity, Severity::Success);
        assert_eq!(messages[0].text, "Mods re-indexed successfully");
    }

    #[test]
    fn check_failure_reports_only_the_check_message() {
        let core = ScriptedCore::new(Err("scan failed".to_string()), None);
        let refresh_calls = Rc::clone(&core.refresh_calls);
        let (mut app, _tmp) = test_app(core);

        app.perform_reindex_mods();

        assert_eq!(refresh_calls.get(), 0);
        assert!(app.dialog.is_none());
        let messages = workflow_messages(&app);
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].severity, Severity::Error);
        assert!(messages[0].text.starts_with("Failed to check mod status: "));
        assert!(messages[0].text.contains("scan failed"));
    }

    #[test]
    fn refresh_failure_on_the_clean_path_uses_the_check_wording() {
        let core = ScriptedCore::new(Ok(false), Some("index locked".to_string()));
        let refresh_calls = Rc::clone(&core.refresh_calls);
        let (mut app, _tmp) = test_app(core);

        app.perform_reindex_mods();

        assert_eq!(refresh_calls.get(), 1);
        assert!(app.dialog.is_none());
        let messages = workflow_messages(&app);
        assert_eq!(messages.len(), 1);
        assert!(messages[0].text.starts_with("Failed to check mod status: "));
    }

    #[test]
    fn confirm_reindex_succeeds_and_closes_the_dialog() {
        let core = ScriptedCore::new(Ok(true), None);
        let refresh_calls = Rc::clone(&core.refresh_calls);
        let (mut app, _tmp) = test_app(core);

        app.perform_reindex_mods();
        assert!(app.dialog.is_some());
        assert_eq!(refresh_calls.get(), 0);

        app.confirm_reindex();

        assert_eq!(refresh_calls.get(), 1);
        assert!(app.dialog.is_none());
        let messages = workflow_messages(&app);
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].severity, Severity::Success);
        assert_eq!(messages[0].text, "Mods re-indexed successfully");
    }

    #[test]
    fn confirm_reindex_closes_the_dialog_on_failure_too() {
        let core = ScriptedCore::new(Ok(true), Some("disk full".to_string()));
        let refresh_calls = Rc::clone(&core.refresh_calls);
        let (mut app, _tmp) = test_app(core);

        app.perform_reindex_mods();
        app.confirm_reindex();

        assert_eq!(refresh_calls.get(), 1);
        assert!(app.dialog.is_none());
        let messages = workflow_messages(&app);
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].severity, Severity::Error);
        assert!(messages[0].text.starts_with("Failed to re-index mods: "));
        assert!(messages[0].text.contains("disk full"));
    }

    #[test]
    fn declining_the_dialog_does_nothing() {
        let core = ScriptedCore::new(Ok(true), None);
        let refresh_calls = Rc::clone(&core.refresh_calls);
        let (mut app, _tmp) = test_app(core);

        app.perform_reindex_mods();
        app.dialog_set_choice(DialogChoice::No);
        app.dialog_confirm();

        assert!(app.dialog.is_none());
        assert_eq!(refresh_calls.get(), 0);
        assert!(workflow_messages(&app).is_empty());
    }

    #[test]
    fn confirming_through_the_dialog_runs_the_reindex() {
        let core = ScriptedCore::new(Ok(true), None);
        let refresh_calls = Rc::clone(&core.refresh_calls);
        let (mut app, _tmp) = test_app(core);

        app.perform_reindex_mods();
        app.dialog_set_choice(DialogChoice::Yes);
        app.dialog_confirm();

        assert!(app.dialog.is_none());
        assert_eq!(refresh_calls.get(), 1);
        let messages = workflow_messages(&app);
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].text, "Mods re-indexed successfully");
    }

    #[test]
    fn message_feed_is_capacity_bounded() {
        let core = ScriptedCore::new(Ok(false), None);
        let (mut app, _tmp) = test_app(core);

        for i in 0..(MESSAGE_CAPACITY + 25) {
            app.push_message(format!("message {i}"), Severity::Info);
        }

        assert_eq!(app.messages.len(), MESSAGE_CAPACITY);
        assert_eq!(app.messages[0].text, "message 25");
    }
}
