use std::path::Path;

use tracing::debug;

use crate::app::controllers::window::WindowController;
use crate::app::domain::document::{DocumentId, WindowId};
use crate::app::domain::settings::FontSpec;

/// Every open window, in creation order. Lookups always go through the id so
/// a window closed in the meantime is simply not found.
#[derive(Default)]
pub struct WindowRegistry {
    windows: Vec<WindowController>,
}

impl WindowRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.windows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }

    pub fn insert(&mut self, window: WindowController) -> WindowId {
        let id = window.id();
        debug!(window = id.0, "window registered");
        self.windows.push(window);
        id
    }

    pub fn remove(&mut self, id: WindowId) -> Option<WindowController> {
        let pos = self.position(id)?;
        debug!(window = id.0, "window unregistered");
        Some(self.windows.remove(pos))
    }

    pub fn contains(&self, id: WindowId) -> bool {
        self.position(id).is_some()
    }

    pub fn get(&self, id: WindowId) -> Option<&WindowController> {
        self.windows.iter().find(|w| w.id() == id)
    }

    pub fn get_mut(&mut self, id: WindowId) -> Option<&mut WindowController> {
        self.windows.iter_mut().find(|w| w.id() == id)
    }

    /// Snapshot of the ids, for loops that may close windows as they go.
    pub fn ids(&self) -> Vec<WindowId> {
        self.windows.iter().map(WindowController::id).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &WindowController> {
        self.windows.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut WindowController> {
        self.windows.iter_mut()
    }

    /// Two distinct windows, mutably. None if either is gone or `a == b`.
    pub fn pair_mut(&mut self, a: WindowId, b: WindowId) -> Option<(&mut WindowController, &mut WindowController)> {
        if a == b {
            return None;
        }
        let ia = self.position(a)?;
        let ib = self.position(b)?;
        if ia < ib {
            let (left, right) = self.windows.split_at_mut(ib);
            Some((&mut left[ia], &mut right[0]))
        } else {
            let (left, right) = self.windows.split_at_mut(ia);
            Some((&mut right[0], &mut left[ib]))
        }
    }

    fn position(&self, id: WindowId) -> Option<usize> {
        self.windows.iter().position(|w| w.id() == id)
    }

    /// Tabs in any window that have `path` open and editable.
    pub fn writable_holders(&self, path: &Path) -> Vec<(WindowId, DocumentId)> {
        self.windows
            .iter()
            .flat_map(|w| {
                w.tabs()
                    .records()
                    .iter()
                    .filter(|d| !d.read_only && d.path() == Some(path))
                    .map(move |d| (w.id(), d.id))
            })
            .collect()
    }

    /// Whether a window other than `id` shows a dialog that blocks prompts
    /// elsewhere.
    pub fn has_blocking_dialog_except(&self, id: WindowId) -> bool {
        self.windows.iter().any(|w| w.id() != id && w.has_blocking_dialog())
    }

    pub fn set_font(&mut self, font: &FontSpec) {
        for window in &mut self.windows {
            window.set_font(font.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::controllers::window::DialogKind;
    use crate::app::test_support::Fixture;

    #[test]
    fn test_pair_mut_both_orders() {
        let fx = Fixture::new();
        let mut registry = WindowRegistry::new();
        let a = registry.insert(fx.window());
        let b = registry.insert(fx.window());

        let (x, y) = registry.pair_mut(a, b).unwrap();
        assert_eq!((x.id(), y.id()), (a, b));
        let (x, y) = registry.pair_mut(b, a).unwrap();
        assert_eq!((x.id(), y.id()), (b, a));
        assert!(registry.pair_mut(a, a).is_none());
        assert!(registry.pair_mut(a, WindowId(999)).is_none());
    }

    #[test]
    fn test_remove_keeps_order() {
        let fx = Fixture::new();
        let mut registry = WindowRegistry::new();
        let ids: Vec<_> = (0..3).map(|_| registry.insert(fx.window())).collect();
        assert!(registry.remove(ids[1]).is_some());
        assert!(registry.remove(ids[1]).is_none());
        assert_eq!(registry.ids(), vec![ids[0], ids[2]]);
        assert!(!registry.contains(ids[1]));
    }

    #[test]
    fn test_writable_holders_skip_read_only() {
        let mut fx = Fixture::new();
        let mut registry = WindowRegistry::new();
        let path = Path::new("/tmp/holders.txt");

        let mut first = fx.window();
        fx.load_into(&mut first, path, "x");
        let mut second = fx.window();
        fx.load_into(&mut second, path, "x");
        second.tabs_mut_for_test().get_mut(0).unwrap().read_only = true;

        let first_id = registry.insert(first);
        registry.insert(second);
        let holders = registry.writable_holders(path);
        assert_eq!(holders.len(), 1);
        assert_eq!(holders[0].0, first_id);
        assert!(registry.writable_holders(Path::new("/tmp/other")).is_empty());
    }

    #[test]
    fn test_blocking_dialog_ignores_own_and_process_dialogs() {
        let fx = Fixture::new();
        let mut registry = WindowRegistry::new();
        let a = registry.insert(fx.window());
        let b = registry.insert(fx.window());

        registry.get_mut(a).unwrap().open_modal(DialogKind::ProcessOutput);
        assert!(!registry.has_blocking_dialog_except(b));

        registry.get_mut(a).unwrap().open_modal(DialogKind::Preferences);
        assert!(registry.has_blocking_dialog_except(b));
        assert!(!registry.has_blocking_dialog_except(a));
    }

    #[test]
    fn test_font_broadcast() {
        let fx = Fixture::new();
        let mut registry = WindowRegistry::new();
        registry.insert(fx.window());
        registry.insert(fx.window());
        let font = FontSpec { family: "Serif".into(), point_size: 14 };
        registry.set_font(&font);
        assert!(registry.iter().all(|w| w.font() == &font));
    }
}
