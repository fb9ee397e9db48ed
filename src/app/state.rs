use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, warn};

use crate::app::controllers::transfer;
use crate::app::controllers::window::{DialogHost, WindowController, WindowEnv};
use crate::app::domain::document::{IdAllocator, WindowId};
use crate::app::domain::settings::{AppSettings, FontSpec, WindowSize};
use crate::app::infrastructure::error::{Result, TransferError};
use crate::app::registry::WindowRegistry;
use crate::app::services::loader::{LoadMode, LoadRequest, Loader, TextCodec};
use crate::app::services::syntax::SyntaxResources;

/// Process-wide coordinator: settings, the window registry and the services
/// shared by every window.
pub struct App<L: Loader> {
    settings: AppSettings,
    registry: WindowRegistry,
    syntax: Rc<SyntaxResources>,
    codec: Arc<dyn TextCodec>,
    loader: L,
    dialogs: Box<dyn DialogHost>,
    ids: IdAllocator,
    next_ticket: u64,
}

impl<L: Loader> App<L> {
    pub fn new(settings: AppSettings, loader: L, codec: Arc<dyn TextCodec>, dialogs: Box<dyn DialogHost>) -> Self {
        Self {
            settings,
            registry: WindowRegistry::new(),
            syntax: Rc::new(SyntaxResources::load_defaults()),
            codec,
            loader,
            dialogs,
            ids: IdAllocator::new(),
            next_ticket: 1,
        }
    }

    pub fn settings(&self) -> &AppSettings {
        &self.settings
    }

    pub fn registry(&self) -> &WindowRegistry {
        &self.registry
    }

    pub fn window(&self, id: WindowId) -> Option<&WindowController> {
        self.registry.get(id)
    }

    pub fn loader_mut(&mut self) -> &mut L {
        &mut self.loader
    }

    /// Run `f` against one window with its operation environment.
    pub fn with_window<R>(
        &mut self,
        id: WindowId,
        f: impl FnOnce(&mut WindowController, &mut WindowEnv<'_>) -> R,
    ) -> Option<R> {
        let another_dialog = self.registry.has_blocking_dialog_except(id);
        let window = self.registry.get_mut(id)?;
        let mut env = WindowEnv {
            settings: &mut self.settings,
            syntax: &self.syntax,
            codec: self.codec.as_ref(),
            dialogs: self.dialogs.as_mut(),
            ids: &self.ids,
            another_dialog,
        };
        Some(f(window, &mut env))
    }

    pub fn create_window(&mut self, with_tab: bool) -> WindowId {
        let window = WindowController::new(self.ids.next_window(), &self.settings);
        let id = self.registry.insert(window);
        if with_tab {
            self.with_window(id, |w, env| w.new_tab(env));
        }
        info!(window = id.0, "window created");
        id
    }

    fn submit(&mut self, window: WindowId, path: PathBuf, forced_encoding: Option<String>, mode: LoadMode) {
        let ticket = self.next_ticket;
        self.next_ticket += 1;
        if let Some(w) = self.registry.get_mut(window) {
            w.begin_load();
        }
        self.loader.submit(LoadRequest {
            ticket,
            window,
            path,
            forced_encoding,
            mode,
        });
    }

    /// Queue files for loading into `window`. Directories are skipped.
    /// Returns the number of loads started.
    pub fn open_files(&mut self, window: WindowId, paths: &[PathBuf]) -> usize {
        let Some(w) = self.registry.get(window) else {
            return 0;
        };
        let paths: Vec<PathBuf> = paths
            .iter()
            .filter(|p| !p.is_dir())
            .map(|p| fs::canonicalize(p).unwrap_or_else(|_| p.clone()))
            .collect();
        let multiple = paths.len() > 1 || w.is_loading();
        for path in &paths {
            self.submit(window, path.clone(), None, LoadMode::Open { multiple });
        }
        debug!(window = window.0, count = paths.len(), multiple, "open requested");
        paths.len()
    }

    pub fn reload(&mut self, window: WindowId) -> bool {
        let Some((target, path)) = self.with_window(window, |w, env| w.prepare_reload(env)).flatten() else {
            return false;
        };
        self.submit(window, path, None, LoadMode::Reload { target });
        true
    }

    /// Re-read the active file with `encoding`. Untitled documents only take
    /// the encoding for their next save.
    pub fn enforce_encoding(&mut self, window: WindowId, encoding: &str) -> bool {
        let Some((target, path)) = self
            .with_window(window, |w, env| w.prepare_enforce_encoding(encoding, env))
            .flatten()
        else {
            return false;
        };
        self.submit(window, path, Some(encoding.to_string()), LoadMode::EnforceEncoding { target });
        true
    }

    pub fn detach_tab(&mut self, window: WindowId, index: usize) -> std::result::Result<WindowId, TransferError> {
        transfer::detach_tab(&mut self.registry, window, index, &self.settings, &self.syntax, &self.ids)
    }

    pub fn drop_tab(&mut self, target: WindowId, payload: &str) -> std::result::Result<usize, TransferError> {
        transfer::drop_tab(&mut self.registry, target, payload, &self.settings, &self.syntax)
    }

    pub fn set_highlighting(&mut self, window: WindowId, on: bool) {
        if let Some(w) = self.registry.get_mut(window) {
            w.set_highlighting(on, &self.syntax, &self.settings);
        }
    }

    /// Apply a font to the settings and to every open window.
    pub fn set_font(&mut self, font: FontSpec) {
        self.registry.set_font(&font);
        self.settings.font = font;
    }

    /// Close a window after negotiating its unsaved tabs. Returns false when
    /// the user kept something open.
    pub fn close_window(&mut self, id: WindowId) -> bool {
        let Some(aborted) = self.with_window(id, |w, env| w.close_all(env)) else {
            return true;
        };
        if aborted {
            return false;
        }
        if let Some(window) = self.registry.remove(id) {
            let geometry = window.geometry();
            if self.settings.remember_window_size {
                if !geometry.maximized && !geometry.full_screen {
                    self.settings.window_size = WindowSize {
                        width: geometry.width,
                        height: geometry.height,
                    };
                }
                self.settings.start_maximized = geometry.maximized;
                self.settings.start_full_screen = geometry.full_screen;
            }
        }
        info!(window = id.0, remaining = self.registry.len(), "window closed");
        true
    }

    /// Close every window in creation order; stops at the first one the
    /// user keeps open.
    pub fn quit(&mut self) -> bool {
        for id in self.registry.ids() {
            if !self.registry.contains(id) {
                continue;
            }
            if !self.close_window(id) {
                info!(window = id.0, "quit cancelled");
                return false;
            }
        }
        true
    }

    pub fn save_settings(&self) -> Result<()> {
        self.save_settings_to(&AppSettings::get_config_path())
    }

    pub fn save_settings_to(&self, path: &Path) -> Result<()> {
        self.settings.save_to(path)
    }

    pub fn is_loading(&self) -> bool {
        self.registry.iter().any(WindowController::is_loading)
    }

    /// One turn of the event loop: merge finished loads, fire debounced tab
    /// switches, collect script output and close windows emptied by a drop.
    pub fn process_events(&mut self, now: Instant) {
        for completion in self.loader.poll() {
            let id = completion.request.window;
            if !self.registry.contains(id) {
                debug!(window = id.0, ticket = completion.request.ticket, "load finished for closed window");
                continue;
            }
            let holders = self.registry.writable_holders(&completion.request.path);
            self.with_window(id, |w, env| w.complete_load(completion, &holders, env));
        }

        for window in self.registry.iter_mut() {
            window.poll(now, &self.settings);
        }

        let emptied: Vec<WindowId> = self
            .registry
            .iter()
            .filter(|w| w.is_close_scheduled() && w.tabs().is_empty())
            .map(WindowController::id)
            .collect();
        for id in emptied {
            if self.registry.remove(id).is_none() {
                warn!(window = id.0, "scheduled close for unknown window");
            } else {
                info!(window = id.0, "emptied window closed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::controllers::window::{AutoAnswer, DialogKind, SaveChoice, WindowGeometry};
    use crate::app::domain::text::TextPos;
    use crate::app::services::loader::{BasicCodec, LoadOutcome, ManualLoader};
    use std::time::Duration;

    fn app(answer: SaveChoice) -> App<ManualLoader> {
        App::new(
            AppSettings::default(),
            ManualLoader::new(),
            Arc::new(BasicCodec),
            Box::new(AutoAnswer(answer)),
        )
    }

    fn loaded(text: &str) -> LoadOutcome {
        LoadOutcome::Loaded {
            text: text.to_string(),
            encoding: "UTF-8".into(),
            size_bytes: text.len() as u64,
        }
    }

    fn later() -> Instant {
        Instant::now() + Duration::from_secs(1)
    }

    fn tickets(app: &App<ManualLoader>) -> Vec<u64> {
        app.loader.pending().iter().map(|r| r.ticket).collect()
    }

    fn edit_active(app: &mut App<ManualLoader>, window: WindowId) {
        app.with_window(window, |w, _| {
            let doc = w.tabs().active().unwrap().id;
            w.on_edit(doc, TextPos::default(), TextPos::default(), "edit");
        });
    }

    #[test]
    fn test_out_of_order_completions_keep_active_tab() {
        let dir = tempfile::tempdir().unwrap();
        let paths: Vec<_> = ["a.txt", "b.txt", "c.txt"].iter().map(|n| dir.path().join(n)).collect();
        let mut app = app(SaveChoice::Cancel);
        let w = app.create_window(true);
        edit_active(&mut app, w);
        let first = app.window(w).unwrap().tabs().active().unwrap().id;

        assert_eq!(app.open_files(w, &paths), 3);
        assert!(app.is_loading());
        let t = tickets(&app);
        for ticket in [t[2], t[0], t[1]] {
            assert!(app.loader_mut().complete(ticket, loaded("x")));
            app.process_events(later());
            assert_eq!(app.window(w).unwrap().tabs().active().unwrap().id, first);
        }
        assert!(!app.is_loading());
        assert_eq!(app.window(w).unwrap().tabs().len(), 4);
    }

    #[test]
    fn test_single_open_reuses_blank_tab() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("only.txt");
        let mut app = app(SaveChoice::Cancel);
        let w = app.create_window(true);
        app.open_files(w, &[path]);
        let ticket = tickets(&app)[0];
        app.loader_mut().complete(ticket, loaded("hello"));
        app.process_events(later());
        let window = app.window(w).unwrap();
        assert_eq!(window.tabs().len(), 1);
        assert_eq!(window.title(), "only.txt");
    }

    #[test]
    fn test_reload_lands_in_requesting_tab_after_switch() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.txt");
        fs::write(&path, "AAA").unwrap();
        let mut app = app(SaveChoice::Cancel);
        let w = app.create_window(true);
        app.open_files(w, &[path]);
        let ticket = tickets(&app)[0];
        app.loader_mut().complete(ticket, loaded("AAA"));
        app.process_events(later());

        app.with_window(w, |win, env| win.new_tab(env));
        edit_active(&mut app, w);
        let (file_doc, work_doc) = {
            let tabs = app.window(w).unwrap().tabs();
            (tabs.get(0).unwrap().id, tabs.get(1).unwrap().id)
        };
        app.with_window(w, |win, _| win.set_active_tab(0));

        assert!(app.reload(w));
        app.with_window(w, |win, _| win.set_active_tab(1));
        let ticket = *tickets(&app).last().unwrap();
        app.loader_mut().complete(ticket, loaded("AAA reloaded"));
        app.process_events(later());

        let tabs = app.window(w).unwrap().tabs();
        assert_eq!(tabs.len(), 2);
        let work = tabs.get(1).unwrap();
        assert_eq!(work.id, work_doc);
        assert_eq!(work.text.text(), "edit");
        assert!(work.path().is_none());
        assert!(work.is_modified());
        let file = tabs.get(0).unwrap();
        assert_eq!(file.id, file_doc);
        assert_eq!(file.text.text(), "AAA reloaded");
        assert_eq!(tabs.active_index(), Some(1));
    }

    #[test]
    fn test_second_window_opens_read_only() {
        let path = PathBuf::from("/tmp/multipad-shared.txt");
        let mut app = app(SaveChoice::Cancel);
        let a = app.create_window(false);
        let b = app.create_window(false);
        for w in [a, b] {
            app.submit(w, path.clone(), None, LoadMode::Open { multiple: false });
            let ticket = *tickets(&app).last().unwrap();
            app.loader_mut().complete(ticket, loaded("shared"));
            app.process_events(later());
        }
        assert!(!app.window(a).unwrap().tabs().get(0).unwrap().read_only);
        assert!(app.window(b).unwrap().tabs().get(0).unwrap().read_only);
    }

    #[test]
    fn test_completion_for_closed_window_is_dropped() {
        let mut app = app(SaveChoice::Cancel);
        let a = app.create_window(true);
        let b = app.create_window(true);
        app.submit(a, PathBuf::from("/tmp/late.txt"), None, LoadMode::Open { multiple: false });
        let ticket = tickets(&app)[0];
        assert!(!app.close_window(a));
        assert!(app.registry.remove(a).is_some());
        app.loader_mut().complete(ticket, loaded("late"));
        app.process_events(later());
        assert!(app.window(a).is_none());
        assert_eq!(app.window(b).unwrap().tabs().len(), 1);
    }

    #[test]
    fn test_close_window_remembers_normal_geometry() {
        let mut app = app(SaveChoice::Discard);
        let w = app.create_window(true);
        app.with_window(w, |win, _| {
            win.set_geometry(WindowGeometry {
                width: 1024,
                height: 640,
                maximized: false,
                full_screen: false,
            })
        });
        edit_active(&mut app, w);
        assert!(app.close_window(w));
        assert!(app.registry().is_empty());
        assert_eq!(app.settings().window_size, WindowSize { width: 1024, height: 640 });
    }

    #[test]
    fn test_maximized_close_keeps_flags_not_size() {
        let mut app = app(SaveChoice::Discard);
        let w = app.create_window(true);
        app.with_window(w, |win, _| {
            win.set_geometry(WindowGeometry {
                width: 3000,
                height: 2000,
                maximized: true,
                full_screen: false,
            })
        });
        assert!(app.close_window(w));
        assert_eq!(app.settings().window_size, WindowSize::default());
        assert!(app.settings().start_maximized);
        assert!(!app.settings().start_full_screen);

        let w = app.create_window(true);
        assert!(app.window(w).unwrap().geometry().maximized);
        app.with_window(w, |win, _| {
            win.set_geometry(WindowGeometry {
                width: 800,
                height: 600,
                maximized: false,
                full_screen: true,
            })
        });
        assert!(app.close_window(w));
        assert!(!app.settings().start_maximized);
        assert!(app.settings().start_full_screen);
    }

    #[test]
    fn test_quit_stops_at_kept_window() {
        let mut app = app(SaveChoice::Cancel);
        let a = app.create_window(true);
        let b = app.create_window(true);
        let c = app.create_window(true);
        edit_active(&mut app, b);

        assert!(!app.quit());
        assert!(app.window(a).is_none());
        assert!(app.window(b).is_some());
        assert!(app.window(c).is_some());
    }

    #[test]
    fn test_modal_dialog_elsewhere_blocks_close() {
        let mut app = app(SaveChoice::Discard);
        let a = app.create_window(true);
        let b = app.create_window(true);
        edit_active(&mut app, b);
        app.with_window(a, |w, _| w.open_modal(DialogKind::Preferences));

        assert!(!app.close_window(b));
        let banner = app.window(b).unwrap().banner().unwrap();
        assert_eq!(banner.title, "Another window has a modal dialog!");

        app.with_window(a, |w, _| w.close_modal());
        assert!(app.close_window(b));
    }

    #[test]
    fn test_drop_closes_emptied_source_window() {
        let mut app = app(SaveChoice::Cancel);
        let a = app.create_window(true);
        let b = app.create_window(true);
        let moved = app.window(a).unwrap().tabs().get(0).unwrap().id;

        assert_eq!(app.drop_tab(b, &format!("{}+0", a.0)), Ok(1));
        app.process_events(later());
        assert!(app.window(a).is_none());
        assert_eq!(app.window(b).unwrap().tabs().get(1).unwrap().id, moved);
    }

    #[test]
    fn test_detach_creates_registered_window() {
        let mut app = app(SaveChoice::Cancel);
        let a = app.create_window(true);
        app.with_window(a, |w, env| w.new_tab(env));
        let created = app.detach_tab(a, 1).unwrap();
        assert_eq!(app.registry().ids(), vec![a, created]);
        assert_eq!(app.window(created).unwrap().tabs().len(), 1);
    }

    #[test]
    fn test_font_applies_everywhere() {
        let mut app = app(SaveChoice::Cancel);
        let a = app.create_window(false);
        let font = FontSpec { family: "Hack".into(), point_size: 12 };
        app.set_font(font.clone());
        assert_eq!(app.settings().font, font);
        assert_eq!(app.window(a).unwrap().font(), &font);
    }

    #[test]
    fn test_settings_written_to_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("settings.json");
        let app = app(SaveChoice::Cancel);
        app.save_settings_to(&path).unwrap();
        assert_eq!(AppSettings::load_from(&path), *app.settings());
    }
}
