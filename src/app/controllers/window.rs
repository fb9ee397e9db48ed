//! One editor window: its tabs, per-window view toggles, loading state and
//! the workflows that act on them.
//!
//! The controller never talks to a toolkit. Prompts go through
//! `DialogHost`; everything the view has to redraw is queued as a
//! `WindowEvent` and drained with `take_events`.

use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::time::Instant;

use tracing::{debug, info, warn};

use crate::app::controllers::tabs::{TabContainer, TabSwitch};
use crate::app::domain::document::{
    DisplayState, DocumentId, DocumentRecord, IdAllocator, Signal, WindowId,
};
use crate::app::domain::messages::{ActionState, Notification, WindowEvent};
use crate::app::domain::settings::{AppSettings, FontSpec};
use crate::app::domain::text::{BlockEdit, BlockRange, TextPos};
use crate::app::infrastructure::error::{AppError, Result};
use crate::app::services::loader::{LoadCompletion, LoadMode, LoadOutcome, LoadRequest, TextCodec};
use crate::app::services::process::{self, ScriptProcess};
use crate::app::services::syntax::language::{detect_language, is_script_language};
use crate::app::services::syntax::{HighlightRequest, HighlighterEngine, SyntaxResources};
use crate::app::services::text_ops;

/// Per-window display toggles. New and incoming tabs follow them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ViewOptions {
    pub line_numbers: bool,
    pub word_wrap: bool,
    pub auto_indent: bool,
    pub status_bar: bool,
    pub jump_bar: bool,
    pub syntax_highlighting: bool,
}

impl ViewOptions {
    pub fn from_settings(settings: &AppSettings) -> Self {
        Self {
            line_numbers: settings.show_line_numbers,
            word_wrap: settings.word_wrap,
            auto_indent: settings.auto_indent,
            status_bar: settings.show_status_bar,
            jump_bar: false,
            syntax_highlighting: settings.syntax_highlighting,
        }
    }

    /// The jump bar needs line numbers too.
    pub fn shows_current_line(&self) -> bool {
        self.line_numbers || self.jump_bar
    }

    pub fn display_state(&self) -> DisplayState {
        DisplayState {
            line_numbers: self.shows_current_line(),
            word_wrap: self.word_wrap,
            auto_indent: self.auto_indent,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowGeometry {
    pub width: u32,
    pub height: u32,
    pub maximized: bool,
    pub full_screen: bool,
}

/// Modal dialogs a window can be showing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DialogKind {
    UnsavedPrompt,
    SaveFile,
    Font,
    Preferences,
    ProcessOutput,
    Session,
}

impl DialogKind {
    /// Process output and session dialogs never block other windows.
    pub fn blocks_other_windows(self) -> bool {
        !matches!(self, Self::ProcessOutput | Self::Session)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnsavedReason {
    Modified,
    FileRemoved,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnsavedPrompt {
    pub document: DocumentId,
    pub index: usize,
    pub title: String,
    pub reason: UnsavedReason,
    /// Offer "No to all": only while closing more than one candidate.
    pub allow_no_to_all: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveChoice {
    Save,
    Discard,
    Cancel,
    NoToAll,
}

pub trait DialogHost {
    fn ask_unsaved(&mut self, prompt: &UnsavedPrompt) -> SaveChoice;

    /// Ask for a file name. None means the dialog was cancelled.
    fn ask_save_path(&mut self, suggested: Option<&Path>) -> Option<PathBuf>;
}

/// Answers every prompt the same way and never supplies a file name.
#[derive(Debug, Clone, Copy)]
pub struct AutoAnswer(pub SaveChoice);

impl DialogHost for AutoAnswer {
    fn ask_unsaved(&mut self, _prompt: &UnsavedPrompt) -> SaveChoice {
        self.0
    }

    fn ask_save_path(&mut self, _suggested: Option<&Path>) -> Option<PathBuf> {
        None
    }
}

/// Process-scoped collaborators a window needs for one operation.
pub struct WindowEnv<'a> {
    pub settings: &'a mut AppSettings,
    pub syntax: &'a Rc<SyntaxResources>,
    pub codec: &'a dyn TextCodec,
    pub dialogs: &'a mut dyn DialogHost,
    pub ids: &'a IdAllocator,
    /// Another window currently shows a blocking modal dialog.
    pub another_dialog: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TabBarState {
    /// A pointer drag on the tab bar is in progress.
    pub grabbed: bool,
    /// Reordering and closing are disabled while files load.
    pub locked: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Negotiation {
    Close,
    Keep,
    CloseAll,
}

fn window_signals(options: &ViewOptions, record: &DocumentRecord) -> Vec<Signal> {
    let mut signals = Signal::CORE.to_vec();
    if options.status_bar {
        signals.push(Signal::StatusBar);
        if record.word_count.is_some() {
            signals.push(Signal::WordCount);
        }
    }
    if record.highlighter.is_some() {
        signals.extend(Signal::HIGHLIGHT);
    }
    signals
}

fn another_dialog_banner() -> Notification {
    Notification::warning("Another window has a modal dialog!")
        .with_detail("Please attend to that window or just close its dialog!")
}

pub struct WindowController {
    id: WindowId,
    tabs: TabContainer,
    options: ViewOptions,
    geometry: WindowGeometry,
    font: FontSpec,
    tab_wrap_around: bool,
    last_opened_path: Option<PathBuf>,
    pending_loads: usize,
    huge_files_skipped: bool,
    banner: Option<Notification>,
    modal: Option<DialogKind>,
    tab_bar: TabBarState,
    close_scheduled: bool,
    events: Vec<WindowEvent>,
}

impl WindowController {
    pub fn new(id: WindowId, settings: &AppSettings) -> Self {
        Self {
            id,
            tabs: TabContainer::new(),
            options: ViewOptions::from_settings(settings),
            geometry: WindowGeometry {
                width: settings.window_size.width,
                height: settings.window_size.height,
                maximized: settings.start_maximized,
                full_screen: settings.start_full_screen,
            },
            font: settings.font.clone(),
            tab_wrap_around: settings.tab_wrap_around,
            last_opened_path: None,
            pending_loads: 0,
            huge_files_skipped: false,
            banner: None,
            modal: None,
            tab_bar: TabBarState::default(),
            close_scheduled: false,
            events: Vec::new(),
        }
    }

    pub fn id(&self) -> WindowId {
        self.id
    }

    pub fn tabs(&self) -> &TabContainer {
        &self.tabs
    }

    #[cfg(test)]
    pub(crate) fn tabs_mut_for_test(&mut self) -> &mut TabContainer {
        &mut self.tabs
    }

    pub fn options(&self) -> ViewOptions {
        self.options
    }

    pub(crate) fn set_view_options(&mut self, options: ViewOptions) {
        self.options = options;
    }

    pub fn geometry(&self) -> WindowGeometry {
        self.geometry
    }

    pub fn set_geometry(&mut self, geometry: WindowGeometry) {
        self.geometry = geometry;
    }

    pub fn font(&self) -> &FontSpec {
        &self.font
    }

    pub fn set_font(&mut self, font: FontSpec) {
        if self.font != font {
            self.font = font;
            self.emit(WindowEvent::FontChanged);
        }
    }

    pub fn last_opened_path(&self) -> Option<&Path> {
        self.last_opened_path.as_deref()
    }

    pub fn title(&self) -> String {
        text_ops::window_title(self.tabs.active())
    }

    pub fn take_events(&mut self) -> Vec<WindowEvent> {
        std::mem::take(&mut self.events)
    }

    fn emit(&mut self, event: WindowEvent) {
        self.events.push(event);
    }

    // --- Banner and dialogs ---

    pub fn banner(&self) -> Option<&Notification> {
        self.banner.as_ref()
    }

    pub fn show_banner(&mut self, notification: Notification) {
        debug!(window = self.id.0, title = %notification.title, "banner shown");
        self.banner = Some(notification.clone());
        self.emit(WindowEvent::BannerShown(notification));
    }

    pub fn close_banner(&mut self) {
        if self.banner.take().is_some() {
            self.emit(WindowEvent::BannerClosed);
        }
    }

    pub fn modal_dialog(&self) -> Option<DialogKind> {
        self.modal
    }

    pub fn open_modal(&mut self, kind: DialogKind) {
        self.modal = Some(kind);
    }

    pub fn close_modal(&mut self) {
        self.modal = None;
    }

    pub fn has_blocking_dialog(&self) -> bool {
        self.modal.is_some_and(DialogKind::blocks_other_windows)
    }

    // --- Tab bar pointer interaction ---

    pub fn tab_bar(&self) -> TabBarState {
        self.tab_bar
    }

    pub fn begin_tab_drag(&mut self) {
        if !self.tab_bar.locked {
            self.tab_bar.grabbed = true;
        }
    }

    /// Release any pointer grab held by the tab bar.
    pub fn finish_pointer_interaction(&mut self) {
        if self.tab_bar.grabbed {
            self.tab_bar.grabbed = false;
            self.emit(WindowEvent::PointerGrabReleased);
        }
    }

    pub fn schedule_close(&mut self) {
        if !self.close_scheduled {
            self.close_scheduled = true;
            self.emit(WindowEvent::CloseScheduled);
        }
    }

    pub fn is_close_scheduled(&self) -> bool {
        self.close_scheduled
    }

    // --- Loading ---

    pub fn pending_loads(&self) -> usize {
        self.pending_loads
    }

    pub fn is_loading(&self) -> bool {
        self.pending_loads > 0
    }

    /// Tab closing, reordering and most shortcuts wait for loads to finish.
    pub fn is_ready(&self) -> bool {
        !self.is_loading()
    }

    pub fn begin_load(&mut self) {
        if self.pending_loads == 0 {
            self.close_banner();
            self.tab_bar.locked = true;
            self.emit(WindowEvent::LoadingChanged(true));
        }
        self.pending_loads += 1;
    }

    /// Merge a finished load. `writable_holders` lists every tab, in any
    /// window, that has the same file open and editable.
    pub fn complete_load(
        &mut self,
        completion: LoadCompletion,
        writable_holders: &[(WindowId, DocumentId)],
        env: &mut WindowEnv<'_>,
    ) {
        let LoadCompletion { request, outcome } = completion;
        match outcome {
            LoadOutcome::Loaded { text, encoding, size_bytes } => {
                self.add_text(&request, &text, &encoding, size_bytes, writable_holders, env);
            }
            LoadOutcome::Oversized => {
                info!(window = self.id.0, path = %request.path.display(), "file too large, not opened");
                self.huge_files_skipped = true;
            }
            LoadOutcome::Missing => {
                self.show_banner(
                    Notification::error("File not found!").with_detail(request.path.display().to_string()),
                );
            }
            LoadOutcome::Failed(reason) => {
                warn!(window = self.id.0, path = %request.path.display(), %reason, "load failed");
                self.show_banner(Notification::error("Cannot be opened!").with_detail(reason));
            }
        }

        self.pending_loads = self.pending_loads.saturating_sub(1);
        if self.pending_loads == 0 {
            self.tab_bar.locked = false;
            self.emit(WindowEvent::LoadingChanged(false));
            if std::mem::take(&mut self.huge_files_skipped) {
                self.show_banner(Notification::warning("Huge file(s) not opened!").with_detail(format!(
                    "MultiPad does not open files larger than {} MiB.",
                    env.settings.max_file_size_mib
                )));
            }
        }
    }

    fn add_text(
        &mut self,
        request: &LoadRequest,
        text: &str,
        encoding: &str,
        size_bytes: u64,
        writable_holders: &[(WindowId, DocumentId)],
        env: &mut WindowEnv<'_>,
    ) {
        let multiple = matches!(request.mode, LoadMode::Open { multiple: true });

        let (index, reuse) = match request.mode.target() {
            Some(target) => match self.tabs.index_of(target) {
                Some(index) => (index, true),
                None => {
                    debug!(window = self.id.0, doc = target.0, "target tab gone, result dropped");
                    return;
                }
            },
            None => {
                let current = match self.tabs.active_index() {
                    Some(index) => index,
                    None => self.create_empty_tab(!multiple, env.ids),
                };
                if self.tabs.get(current).is_some_and(DocumentRecord::is_blank) {
                    (current, true)
                } else {
                    (self.create_empty_tab(!multiple, env.ids), false)
                }
            }
        };

        let id = self.id;
        let options = self.options;
        let Some(record) = self.tabs.get_mut(index) else {
            return;
        };
        let previous_cursor = matches!(request.mode, LoadMode::Reload { .. }).then_some(record.cursor);
        record.set_loaded_text(text, encoding);
        if let Some(cursor) = previous_cursor {
            record.cursor = record.text.clamp(cursor);
        }
        record.file_path = Some(request.path.clone());
        record.file_size_bytes = size_bytes;
        record.program_language = detect_language(&request.path);
        let doc = record.id;
        record.read_only = writable_holders.iter().any(|&(w, d)| !(w == id && d == doc));
        let signals = window_signals(&options, record);
        record.bind(id, &signals);
        let read_only = record.read_only;
        let tab_text = text_ops::tab_text(record);

        self.last_opened_path = Some(request.path.clone());
        if env.settings.recent_opened {
            env.settings.add_recent_file(&request.path);
        }
        if options.syntax_highlighting {
            self.enable_highlighting(index, env.syntax, env.settings);
        }

        info!(
            window = id.0,
            doc = doc.0,
            path = %request.path.display(),
            encoding,
            read_only,
            reused = reuse,
            "file loaded"
        );
        self.emit(WindowEvent::TabTextChanged { document: doc, text: tab_text });
        if (!multiple || reuse) && self.tabs.active_index() == Some(index) {
            let title = self.title();
            self.emit(WindowEvent::TitleChanged(title));
            self.relay_action_state(env.settings);
            if options.status_bar {
                self.emit(WindowEvent::StatusBarChanged(doc));
            }
        }
    }

    /// Ask about unsaved changes in the active tab, then hand back the tab
    /// and the file to re-read. None when there is nothing to reload or the
    /// user kept the document.
    pub fn prepare_reload(&mut self, env: &mut WindowEnv<'_>) -> Option<(DocumentId, PathBuf)> {
        if !self.is_ready() {
            return None;
        }
        let index = self.tabs.active_index()?;
        if self.negotiate_unsaved(index, false, env) != Negotiation::Close {
            return None;
        }
        let record = self.tabs.get(index)?;
        Some((record.id, record.file_path.clone()?))
    }

    /// Untitled documents just take the encoding for their next save; files
    /// are re-decoded after negotiation and their path is returned.
    pub fn prepare_enforce_encoding(
        &mut self,
        encoding: &str,
        env: &mut WindowEnv<'_>,
    ) -> Option<(DocumentId, PathBuf)> {
        let index = self.tabs.active_index()?;
        let record = self.tabs.get_mut(index)?;
        if record.is_untitled() {
            record.encoding = encoding.to_string();
            let doc = record.id;
            if self.options.status_bar {
                self.emit(WindowEvent::StatusBarChanged(doc));
            }
            return None;
        }
        if !self.is_ready() || self.negotiate_unsaved(index, false, env) != Negotiation::Close {
            return None;
        }
        let record = self.tabs.get(index)?;
        Some((record.id, record.file_path.clone()?))
    }

    // --- Tab creation and switching ---

    /// Open an empty tab after the active one.
    pub fn new_tab(&mut self, env: &mut WindowEnv<'_>) -> usize {
        let set_current = !self.is_loading();
        self.create_empty_tab(set_current, env.ids)
    }

    fn create_empty_tab(&mut self, set_current: bool, ids: &IdAllocator) -> usize {
        let mut record = DocumentRecord::new(ids.next_document());
        record.display = self.options.display_state();
        let signals = window_signals(&self.options, &record);
        record.bind(self.id, &signals);
        let doc = record.id;

        let at = self.tabs.active_index().map_or(0, |i| i + 1);
        let index = self.tabs.insert(record, at);
        if set_current {
            self.tabs.set_active(index, Instant::now());
        }
        debug!(window = self.id.0, doc = doc.0, index, "tab created");
        index
    }

    /// Activate a tab (tab bar click). The switch is reported after the
    /// debounce period by `poll`.
    pub fn set_active_tab(&mut self, index: usize) -> bool {
        self.tabs.set_active(index, Instant::now())
    }

    pub fn next_tab(&mut self) -> bool {
        if !self.is_ready() {
            return false;
        }
        match self.tabs.next_index(self.tab_wrap_around) {
            Some(index) => self.tabs.set_active(index, Instant::now()),
            None => false,
        }
    }

    pub fn previous_tab(&mut self) -> bool {
        if !self.is_ready() {
            return false;
        }
        match self.tabs.previous_index(self.tab_wrap_around) {
            Some(index) => self.tabs.set_active(index, Instant::now()),
            None => false,
        }
    }

    pub fn first_tab(&mut self) -> bool {
        self.is_ready() && self.tabs.set_active(0, Instant::now())
    }

    pub fn last_tab(&mut self) -> bool {
        self.is_ready() && !self.tabs.is_empty() && self.tabs.set_active(self.tabs.len() - 1, Instant::now())
    }

    pub fn move_tab(&mut self, from: usize, to: usize) -> bool {
        self.is_ready() && self.tabs.move_tab(from, to)
    }

    /// Drive timers: debounced tab switch and script output.
    pub fn poll(&mut self, now: Instant, settings: &AppSettings) -> Option<TabSwitch> {
        self.poll_processes();
        let switch = self.tabs.poll_switch(now)?;
        self.on_tab_switch(switch, settings);
        Some(switch)
    }

    fn on_tab_switch(&mut self, switch: TabSwitch, settings: &AppSettings) {
        self.close_banner();
        debug!(window = self.id.0, index = switch.index, doc = switch.document.0, "tab switched");
        self.emit(WindowEvent::CurrentTabChanged {
            index: switch.index,
            document: switch.document,
        });
        let title = self.title();
        self.emit(WindowEvent::TitleChanged(title));
        let state = self.relay_action_state(settings);
        self.emit(WindowEvent::UndoAvailable(state.undo));
        self.emit(WindowEvent::RedoAvailable(state.redo));
        if self.options.status_bar {
            self.emit(WindowEvent::StatusBarChanged(switch.document));
        }
    }

    /// Report the active tab's action state when that tab is bound to this
    /// window.
    fn relay_action_state(&mut self, settings: &AppSettings) -> ActionState {
        let state = self.action_state(settings);
        let id = self.id;
        if self.tabs.active().is_some_and(|d| d.is_bound(id, Signal::ActionState)) {
            self.emit(WindowEvent::ActionStateChanged(state));
        }
        state
    }

    pub fn action_state(&self, settings: &AppSettings) -> ActionState {
        let count = self.tabs.len();
        let Some(record) = self.tabs.active() else {
            return ActionState::default();
        };
        let path = record.path();
        ActionState {
            save: record.is_modified(),
            reload: path.is_some(),
            undo: record.text.is_undo_available(),
            redo: record.text.is_redo_available(),
            detach: count > 1,
            next_prev: count > 1,
            close_other: count > 1,
            run_visible: settings.execute_scripts
                && record.program_language.is_some_and(is_script_language)
                && path.is_some_and(process::is_executable),
            editable: !record.read_only,
        }
    }

    // --- Closing ---

    /// Close tabs strictly right of `left` and strictly left of `right`
    /// (None = open end), right to left. Returns true when the user aborted
    /// or the window is busy loading.
    pub fn close_range(&mut self, left: Option<usize>, right: Option<usize>, env: &mut WindowEnv<'_>) -> bool {
        if !self.is_ready() {
            return true;
        }
        let mut right = right.map(|r| r.min(self.tabs.len()));
        let mut no_to_all = false;
        let mut aborted = false;
        let mut closed = 0usize;

        while !self.tabs.is_empty() {
            let index = match right {
                Some(0) => break,
                Some(r) => r - 1,
                None => self.tabs.len() - 1,
            };
            if left.is_some_and(|l| l >= index) {
                break;
            }
            if !no_to_all {
                let candidates = index + 1 - left.map_or(0, |l| l + 1);
                match self.negotiate_unsaved(index, candidates > 1, env) {
                    Negotiation::Close => {}
                    Negotiation::Keep => {
                        aborted = true;
                        break;
                    }
                    Negotiation::CloseAll => no_to_all = true,
                }
            }
            self.discard_tab(index);
            closed += 1;
            if let Some(r) = right.as_mut() {
                *r -= 1;
            }
        }

        info!(window = self.id.0, ?left, closed, aborted, remaining = self.tabs.len(), "close range finished");
        aborted
    }

    pub fn close_tab(&mut self, index: usize, env: &mut WindowEnv<'_>) -> bool {
        if index >= self.tabs.len() {
            return false;
        }
        self.close_range(index.checked_sub(1), Some(index + 1), env)
    }

    pub fn close_all(&mut self, env: &mut WindowEnv<'_>) -> bool {
        self.close_range(None, None, env)
    }

    pub fn close_next(&mut self, index: usize, env: &mut WindowEnv<'_>) -> bool {
        self.close_range(Some(index), None, env)
    }

    pub fn close_previous(&mut self, index: usize, env: &mut WindowEnv<'_>) -> bool {
        self.close_range(None, Some(index), env)
    }

    /// Close everything right of `index`, then, unless aborted, everything
    /// left of it.
    pub fn close_other(&mut self, index: usize, env: &mut WindowEnv<'_>) -> bool {
        if self.close_range(Some(index), None, env) {
            return true;
        }
        self.close_range(None, Some(index), env)
    }

    fn negotiate_unsaved(&mut self, index: usize, allow_no_to_all: bool, env: &mut WindowEnv<'_>) -> Negotiation {
        let Some(record) = self.tabs.get(index) else {
            return Negotiation::Close;
        };
        let reason = if record.is_modified() {
            UnsavedReason::Modified
        } else if record.path().is_some_and(|p| !p.is_file()) {
            UnsavedReason::FileRemoved
        } else {
            return Negotiation::Close;
        };
        let prompt = UnsavedPrompt {
            document: record.id,
            index,
            title: text_ops::tab_text(record),
            reason,
            allow_no_to_all: allow_no_to_all && self.tabs.len() > 1,
        };
        if env.another_dialog {
            self.show_banner(another_dialog_banner());
            return Negotiation::Keep;
        }

        self.tabs.set_active(index, Instant::now());
        self.modal = Some(DialogKind::UnsavedPrompt);
        let choice = env.dialogs.ask_unsaved(&prompt);
        self.modal = None;
        debug!(window = self.id.0, doc = prompt.document.0, ?reason, ?choice, "unsaved changes answered");

        match choice {
            SaveChoice::Save => match self.save_at(index, false, true, env) {
                Ok(()) => Negotiation::Close,
                Err(_) => Negotiation::Keep,
            },
            SaveChoice::Discard => Negotiation::Close,
            SaveChoice::Cancel => Negotiation::Keep,
            SaveChoice::NoToAll if prompt.allow_no_to_all => Negotiation::CloseAll,
            SaveChoice::NoToAll => Negotiation::Close,
        }
    }

    /// Remove and destroy a tab: bindings are cut, the engine and any
    /// running script go with the record.
    fn discard_tab(&mut self, index: usize) {
        let Some(mut record) = self.tabs.remove(index) else {
            return;
        };
        record.unbind(self.id);
        record.disable_highlighting();
        debug!(window = self.id.0, doc = record.id.0, index, "tab closed");
        drop(record);
        if self.tabs.is_empty() {
            self.emit(WindowEvent::TabsEmptied);
            let title = self.title();
            self.emit(WindowEvent::TitleChanged(title));
        }
    }

    // --- Saving ---

    pub fn save(&mut self, env: &mut WindowEnv<'_>) -> Result<()> {
        let index = self.tabs.active_index().ok_or_else(|| AppError::Save("no document".into()))?;
        self.save_at(index, false, false, env)
    }

    pub fn save_as(&mut self, env: &mut WindowEnv<'_>) -> Result<()> {
        let index = self.tabs.active_index().ok_or_else(|| AppError::Save("no document".into()))?;
        self.save_at(index, true, false, env)
    }

    /// Write a tab to disk. Inside close negotiation `keep_syntax` is set and
    /// the highlighter is left alone even if the file name changes language.
    fn save_at(&mut self, index: usize, save_as: bool, keep_syntax: bool, env: &mut WindowEnv<'_>) -> Result<()> {
        if !self.is_ready() {
            return Err(AppError::Save("files are still loading".into()));
        }
        let record = self.tabs.get(index).ok_or_else(|| AppError::Save("no document".into()))?;
        let current_path = record.file_path.clone();
        let text = record.text.text();
        let encoding = record.encoding.clone();

        let path = match current_path {
            Some(path) if !save_as && path.exists() => path,
            current => {
                if env.another_dialog {
                    self.show_banner(another_dialog_banner());
                    return Err(AppError::AnotherDialog);
                }
                let suggested = current.or_else(|| self.last_opened_path.clone());
                self.modal = Some(DialogKind::SaveFile);
                let chosen = env.dialogs.ask_save_path(suggested.as_deref());
                self.modal = None;
                chosen.ok_or_else(|| AppError::Save("no file name given".into()))?
            }
        };

        let written = env
            .codec
            .encode(&text, &encoding)
            .and_then(|bytes| fs::write(&path, bytes).map_err(AppError::from));
        if let Err(e) = written {
            warn!(window = self.id.0, path = %path.display(), error = %e, "save failed");
            self.show_banner(Notification::error("Cannot be saved!").with_detail(e.to_string()));
            return Err(e);
        }
        let size = fs::metadata(&path).map(|m| m.len()).unwrap_or(0);

        let id = self.id;
        let record = self.tabs.get_mut(index).ok_or_else(|| AppError::Save("no document".into()))?;
        record.set_modified(false);
        record.file_path = Some(path.clone());
        record.file_size_bytes = size;
        let language_changed = if keep_syntax {
            false
        } else {
            let previous = record.program_language;
            record.program_language = detect_language(&path);
            previous != record.program_language
        };
        let doc = record.id;
        let tab_text = text_ops::tab_text(record);

        self.last_opened_path = Some(path.clone());
        env.settings.add_recent_file(&path);
        if language_changed {
            self.disable_highlighting(index);
            if self.options.syntax_highlighting {
                self.enable_highlighting(index, env.syntax, env.settings);
            }
        }

        info!(window = id.0, doc = doc.0, path = %path.display(), encoding = %encoding, "saved");
        self.emit(WindowEvent::ModificationChanged { document: doc, modified: false });
        self.emit(WindowEvent::TabTextChanged { document: doc, text: tab_text });
        if self.tabs.active_index() == Some(index) {
            let title = self.title();
            self.emit(WindowEvent::TitleChanged(title));
            self.relay_action_state(env.settings);
        }
        Ok(())
    }

    /// Lift the read-only state set when the file was already open elsewhere.
    pub fn make_editable(&mut self, settings: &AppSettings) -> bool {
        if !self.is_ready() {
            return false;
        }
        let Some(record) = self.tabs.active_mut() else {
            return false;
        };
        record.read_only = false;
        self.relay_action_state(settings);
        true
    }

    // --- Syntax highlighting ---

    /// Create the engine for a tab if its language and size allow it.
    pub fn enable_highlighting(&mut self, index: usize, syntax: &Rc<SyntaxResources>, settings: &AppSettings) -> bool {
        let id = self.id;
        let Some(record) = self.tabs.get_mut(index) else {
            return false;
        };
        if record.highlighter.is_some() {
            return true;
        }
        let Some(language) = record.program_language else {
            return false;
        };
        let visible = record
            .viewport
            .clamp(record.text.block_count())
            .unwrap_or(BlockRange::single(0));
        let request = HighlightRequest {
            language,
            visible,
            theme: settings.current_syntax_theme(),
            size_bytes: record.file_size_bytes,
            max_size_bytes: settings.max_highlight_size_bytes(),
        };
        let Some(engine) = HighlighterEngine::enable(syntax, &record.text, request) else {
            return false;
        };
        record.highlighter = Some(engine);
        record.refresh_brackets();
        if record.bound_window() == Some(id) {
            for signal in Signal::HIGHLIGHT {
                record.add_signal(signal);
            }
        }
        let doc = record.id;
        self.emit(WindowEvent::RepaintRequested { document: doc, range: visible });
        self.emit(WindowEvent::OverlaysChanged(doc));
        true
    }

    pub fn disable_highlighting(&mut self, index: usize) {
        let Some(record) = self.tabs.get_mut(index) else {
            return;
        };
        if record.highlighter.is_none() {
            return;
        }
        record.disable_highlighting();
        for signal in Signal::HIGHLIGHT {
            record.remove_signal(signal);
        }
        let doc = record.id;
        self.emit(WindowEvent::OverlaysChanged(doc));
    }

    /// The window's highlighting toggle, applied to every tab.
    pub fn set_highlighting(&mut self, on: bool, syntax: &Rc<SyntaxResources>, settings: &AppSettings) {
        self.options.syntax_highlighting = on;
        for index in 0..self.tabs.len() {
            if on {
                self.enable_highlighting(index, syntax, settings);
            } else {
                self.disable_highlighting(index);
            }
        }
    }

    // --- Other view toggles ---

    pub fn set_line_numbers(&mut self, on: bool) {
        self.options.line_numbers = on;
        self.apply_display_state();
    }

    pub fn set_jump_bar(&mut self, on: bool) {
        self.options.jump_bar = on;
        self.apply_display_state();
    }

    pub fn set_word_wrap(&mut self, on: bool) {
        self.options.word_wrap = on;
        self.apply_display_state();
    }

    pub fn set_auto_indent(&mut self, on: bool) {
        self.options.auto_indent = on;
        self.apply_display_state();
    }

    fn apply_display_state(&mut self) {
        let display = self.options.display_state();
        for record in self.tabs.iter_mut() {
            record.display = display;
            if display.line_numbers {
                record.selections.current_line = vec![text_ops::current_line_overlay(&record.text, record.cursor)];
            } else {
                record.selections.current_line.clear();
            }
        }
    }

    pub fn set_status_bar(&mut self, on: bool) {
        self.options.status_bar = on;
        let id = self.id;
        let options = self.options;
        for record in self.tabs.iter_mut() {
            let signals = window_signals(&options, record);
            record.bind(id, &signals);
        }
        if let Some(doc) = self.tabs.active().map(|d| d.id).filter(|_| on) {
            self.emit(WindowEvent::StatusBarChanged(doc));
        }
    }

    // --- Editing, viewport and cursor routing ---

    fn bound_index(&self, doc: DocumentId) -> Option<usize> {
        let index = self.tabs.index_of(doc)?;
        (self.tabs.get(index)?.bound_window() == Some(self.id)).then_some(index)
    }

    /// Apply a text change from the editor. Ignored for documents not bound
    /// to this window.
    pub fn on_edit(&mut self, doc: DocumentId, start: TextPos, end: TextPos, inserted: &str) -> Option<BlockEdit> {
        let index = self.bound_index(doc)?;
        let record = self.tabs.get_mut(index)?;
        if record.read_only {
            return None;
        }
        let was_modified = record.is_modified();
        let edit = record.apply_edit(start, end, inserted);
        self.after_text_change(index, was_modified);
        Some(edit)
    }

    pub fn undo(&mut self) -> Option<BlockEdit> {
        let index = self.tabs.active_index()?;
        let record = self.tabs.get_mut(index)?;
        let was_modified = record.is_modified();
        record.selections.search.clear();
        let edit = record.undo()?;
        self.after_text_change(index, was_modified);
        Some(edit)
    }

    pub fn redo(&mut self) -> Option<BlockEdit> {
        let index = self.tabs.active_index()?;
        let record = self.tabs.get_mut(index)?;
        let was_modified = record.is_modified();
        let edit = record.redo()?;
        self.after_text_change(index, was_modified);
        Some(edit)
    }

    fn after_text_change(&mut self, index: usize, was_modified: bool) {
        let id = self.id;
        let is_active = self.tabs.active_index() == Some(index);
        let shows_current_line = self.options.shows_current_line();
        let Some(record) = self.tabs.get_mut(index) else {
            return;
        };
        let doc = record.id;
        let mut events = Vec::new();
        let mut overlays_changed = false;

        if record.is_bound(id, Signal::ViewportFormat)
            && let Some(range) = record.viewport.clamp(record.text.block_count())
            && let Some(engine) = record.highlighter.as_mut()
        {
            if engine.rehighlight_range(&record.text, range) > 0 {
                events.push(WindowEvent::RepaintRequested { document: doc, range });
            }
        }
        let modified = record.is_modified();
        if record.is_bound(id, Signal::Modification) && modified != was_modified {
            events.push(WindowEvent::ModificationChanged { document: doc, modified });
            events.push(WindowEvent::TabTextChanged {
                document: doc,
                text: text_ops::tab_text(record),
            });
            if is_active {
                events.push(WindowEvent::TitleChanged(text_ops::window_title(Some(&*record))));
            }
        }
        if record.is_bound(id, Signal::UndoRedo) && is_active {
            events.push(WindowEvent::UndoAvailable(record.text.is_undo_available()));
            events.push(WindowEvent::RedoAvailable(record.text.is_redo_available()));
        }
        if record.is_bound(id, Signal::SearchHighlight) && !record.search_text.is_empty() {
            record.selections.search = text_ops::search_overlays(&record.text, &record.search_text, record.viewport);
            overlays_changed = true;
        }
        if record.is_bound(id, Signal::BracketMatch) {
            record.refresh_brackets();
            overlays_changed = true;
        }
        if shows_current_line {
            record.selections.current_line = vec![text_ops::current_line_overlay(&record.text, record.cursor)];
            overlays_changed = true;
        }
        if record.is_bound(id, Signal::WordCount) {
            record.remove_signal(Signal::WordCount);
            events.push(WindowEvent::StatusBarChanged(doc));
        } else if record.is_bound(id, Signal::StatusBar) {
            events.push(WindowEvent::StatusBarChanged(doc));
        }
        if overlays_changed {
            events.push(WindowEvent::OverlaysChanged(doc));
        }
        self.events.extend(events);
    }

    /// The editor scrolled, resized or changed its block count. Highlights
    /// the newly visible blocks only and returns how many were computed.
    pub fn on_viewport(&mut self, doc: DocumentId, range: BlockRange) -> usize {
        let id = self.id;
        let Some(index) = self.bound_index(doc) else {
            return 0;
        };
        let Some(record) = self.tabs.get_mut(index) else {
            return 0;
        };
        record.viewport = range;
        let mut recomputed = 0;
        let mut events = Vec::new();
        if record.is_bound(id, Signal::ViewportFormat)
            && let Some(clamped) = range.clamp(record.text.block_count())
            && let Some(engine) = record.highlighter.as_mut()
        {
            recomputed = engine.rehighlight_range(&record.text, clamped);
            if recomputed > 0 {
                events.push(WindowEvent::RepaintRequested { document: doc, range: clamped });
            }
        }
        if record.is_bound(id, Signal::SearchHighlight) && !record.search_text.is_empty() {
            record.selections.search = text_ops::search_overlays(&record.text, &record.search_text, range);
            events.push(WindowEvent::OverlaysChanged(doc));
        }
        self.events.extend(events);
        recomputed
    }

    pub fn on_cursor(&mut self, doc: DocumentId, pos: TextPos) {
        let id = self.id;
        let shows_current_line = self.options.shows_current_line();
        let Some(index) = self.bound_index(doc) else {
            return;
        };
        let Some(record) = self.tabs.get_mut(index) else {
            return;
        };
        record.cursor = record.text.clamp(pos);
        if record.is_bound(id, Signal::BracketMatch) {
            record.refresh_brackets();
        }
        if shows_current_line {
            record.selections.current_line = vec![text_ops::current_line_overlay(&record.text, record.cursor)];
        }
        let status = record.is_bound(id, Signal::StatusBar);
        self.emit(WindowEvent::OverlaysChanged(doc));
        if status {
            self.emit(WindowEvent::StatusBarChanged(doc));
        }
    }

    /// Set the active tab's search text and highlight its visible matches.
    pub fn set_search_text(&mut self, text: &str) {
        let Some(record) = self.tabs.active_mut() else {
            return;
        };
        record.search_text = text.to_string();
        record.selections.search = if text.is_empty() {
            Vec::new()
        } else {
            text_ops::search_overlays(&record.text, text, record.viewport)
        };
        let doc = record.id;
        self.emit(WindowEvent::OverlaysChanged(doc));
    }

    /// Count the active tab's words and keep the count live in the status
    /// bar until the next edit.
    pub fn count_words(&mut self) -> Option<usize> {
        let status_bar = self.options.status_bar;
        let record = self.tabs.active_mut()?;
        let count = text_ops::word_count(&record.text.text());
        record.word_count = Some(count);
        if status_bar {
            record.add_signal(Signal::WordCount);
        }
        let doc = record.id;
        self.emit(WindowEvent::WordCountChanged { document: doc, count });
        Some(count)
    }

    // --- Scripts ---

    /// Run the active tab's file as a script.
    pub fn run_process(&mut self, settings: &AppSettings) -> Result<()> {
        if self.has_blocking_dialog() {
            return Err(AppError::AnotherDialog);
        }
        self.close_banner();
        if !settings.execute_scripts {
            return Err(AppError::NotRunnable("script execution is disabled".into()));
        }
        let index = self
            .tabs
            .active_index()
            .ok_or_else(|| AppError::NotRunnable("no document".into()))?;

        let running = self.tabs.get_mut(index).is_some_and(DocumentRecord::has_running_process);
        if running {
            self.show_banner(
                Notification::warning("Another process is running in this tab!")
                    .with_detail("Only one process is allowed per tab."),
            );
            return Err(AppError::ProcessRunning);
        }

        let record = self
            .tabs
            .get_mut(index)
            .ok_or_else(|| AppError::NotRunnable("no document".into()))?;
        let script = record
            .file_path
            .clone()
            .filter(|p| record.program_language.is_some_and(is_script_language) && process::is_executable(p))
            .ok_or_else(|| AppError::NotRunnable("not an executable script".into()))?;

        match ScriptProcess::spawn(&script, &settings.execute_command) {
            Ok(child) => {
                record.process = Some(child);
                Ok(())
            }
            Err(e) => {
                self.show_banner(Notification::error("Cannot run the script!").with_detail(e.to_string()));
                Err(e)
            }
        }
    }

    pub fn kill_process(&mut self) -> Result<()> {
        match self.tabs.active_mut().and_then(|d| d.process.as_mut()) {
            Some(process) => process.kill(),
            None => Ok(()),
        }
    }

    /// Collect script output and free the slots of finished scripts.
    pub fn poll_processes(&mut self) {
        let mut events = Vec::new();
        for record in self.tabs.iter_mut() {
            if record.process.is_none() {
                continue;
            }
            if record.collect_process_output() > 0 {
                events.push(WindowEvent::ProcessOutput(record.id));
            }
            record.has_running_process();
        }
        self.events.extend(events);
    }

    // --- Transfer hooks ---

    /// Detaching: cut the bindings, release the tab bar's pointer grab and
    /// only then take the record out of the container.
    pub(crate) fn release_tab(&mut self, index: usize) -> Option<DocumentRecord> {
        let id = self.id;
        let record = self.tabs.get_mut(index)?;
        record.unbind(id);
        self.finish_pointer_interaction();
        let record = self.tabs.remove(index)?;
        if self.tabs.is_empty() {
            self.emit(WindowEvent::TabsEmptied);
        }
        Some(record)
    }

    /// Attaching: insert, bind to this window and rebuild what depends on
    /// this window's toggles. The record and its engine are kept as they are
    /// unless this window has highlighting switched off.
    pub(crate) fn adopt_tab(
        &mut self,
        mut record: DocumentRecord,
        at: usize,
        syntax: &Rc<SyntaxResources>,
        settings: &AppSettings,
    ) -> usize {
        let id = self.id;
        let options = self.options;
        record.display = options.display_state();
        let signals = window_signals(&options, &record);
        record.bind(id, &signals);
        let doc = record.id;
        let path = record.file_path.clone();

        let index = self.tabs.insert(record, at);
        self.tabs.set_active(index, Instant::now());
        if options.syntax_highlighting {
            self.enable_highlighting(index, syntax, settings);
        } else {
            self.disable_highlighting(index);
        }

        if let Some(record) = self.tabs.get_mut(index) {
            if !record.search_text.is_empty() {
                record.selections.search = text_ops::search_overlays(&record.text, &record.search_text, record.viewport);
            }
            if record.highlighter.is_some() {
                record.refresh_brackets();
            }
            if options.shows_current_line() {
                record.selections.current_line = vec![text_ops::current_line_overlay(&record.text, record.cursor)];
            }
            let text = text_ops::tab_text(record);
            self.events.push(WindowEvent::TabTextChanged { document: doc, text });
        }
        if path.is_some() {
            self.last_opened_path = path;
        }
        self.emit(WindowEvent::OverlaysChanged(doc));
        index
    }
}
