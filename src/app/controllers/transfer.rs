//! Moving a live tab between windows.
//!
//! A transfer never recreates the document: the same `DocumentRecord`
//! (text, undo history, highlighter engine) leaves one container and enters
//! another. In between it belongs to no window and no signal reaches it.

use std::rc::Rc;

use tracing::{debug, info};

use crate::app::controllers::window::{ViewOptions, WindowController};
use crate::app::domain::document::{DocumentRecord, IdAllocator, WindowId};
use crate::app::domain::messages::DragPayload;
use crate::app::domain::settings::AppSettings;
use crate::app::infrastructure::error::TransferError;
use crate::app::registry::WindowRegistry;
use crate::app::services::syntax::SyntaxResources;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferPhase {
    Attached,
    Detaching,
    Unowned,
    Attaching,
}

fn enter(phase: TransferPhase, record: &DocumentRecord) {
    debug!(?phase, doc = record.id.0, owner = ?record.bound_window(), "tab transfer");
}

/// Strip overlays that belong to the old window's search and cursor state.
/// The destination recomputes them.
fn make_unowned(record: &mut DocumentRecord) {
    enter(TransferPhase::Unowned, record);
    record.selections.search.clear();
    record.selections.brackets.clear();
    record.selections.current_line.clear();
}

fn release_grab(registry: &mut WindowRegistry, id: WindowId) {
    if let Some(window) = registry.get_mut(id) {
        window.finish_pointer_interaction();
    }
}

/// Move tab `index` of `source` into a new window. The new window starts
/// with the source window's toggles; wrap and indent follow the tab itself.
pub fn detach_tab(
    registry: &mut WindowRegistry,
    source: WindowId,
    index: usize,
    settings: &AppSettings,
    syntax: &Rc<SyntaxResources>,
    ids: &IdAllocator,
) -> Result<WindowId, TransferError> {
    let window = registry.get_mut(source).ok_or(TransferError::UnknownSource(source.0))?;
    let refused = if !window.is_ready() {
        Some(TransferError::NotReady)
    } else if window.tabs().len() < 2 {
        Some(TransferError::NothingToDetach)
    } else if index >= window.tabs().len() {
        Some(TransferError::InvalidIndex(index))
    } else {
        None
    };
    if let Some(e) = refused {
        window.finish_pointer_interaction();
        return Err(e);
    }

    if let Some(record) = window.tabs().get(index) {
        enter(TransferPhase::Detaching, record);
    }
    let options = window.options();
    let mut record = window.release_tab(index).ok_or(TransferError::InvalidIndex(index))?;
    make_unowned(&mut record);

    let mut target = WindowController::new(ids.next_window(), settings);
    target.set_view_options(ViewOptions {
        word_wrap: record.display.word_wrap,
        auto_indent: record.display.auto_indent,
        ..options
    });
    enter(TransferPhase::Attaching, &record);
    let doc = record.id;
    target.adopt_tab(record, 0, syntax, settings);
    if let Some(record) = target.tabs().get(0) {
        enter(TransferPhase::Attached, record);
    }

    let target = registry.insert(target);
    info!(doc = doc.0, from = source.0, to = target.0, "tab detached into new window");
    Ok(target)
}

/// Accept a tab dragged onto `target`. The payload names the source window
/// and index; `target`'s toggles govern the incoming tab. A source window
/// left without tabs is scheduled for closing.
pub fn drop_tab(
    registry: &mut WindowRegistry,
    target: WindowId,
    payload: &str,
    settings: &AppSettings,
    syntax: &Rc<SyntaxResources>,
) -> Result<usize, TransferError> {
    let payload = match payload.parse::<DragPayload>() {
        Ok(payload) => payload,
        Err(e) => {
            release_grab(registry, target);
            return Err(e);
        }
    };
    if payload.window == target {
        release_grab(registry, target);
        return Err(TransferError::SelfDrop);
    }
    let Some((dest, source)) = registry.pair_mut(target, payload.window) else {
        release_grab(registry, target);
        return Err(TransferError::UnknownSource(payload.window.0));
    };

    let refused = if !source.is_ready() || !dest.is_ready() {
        Some(TransferError::NotReady)
    } else if payload.index >= source.tabs().len() {
        Some(TransferError::InvalidIndex(payload.index))
    } else {
        None
    };
    if let Some(e) = refused {
        source.finish_pointer_interaction();
        dest.finish_pointer_interaction();
        return Err(e);
    }

    source.close_banner();
    dest.close_banner();
    if let Some(record) = source.tabs().get(payload.index) {
        enter(TransferPhase::Detaching, record);
    }
    let mut record = source
        .release_tab(payload.index)
        .ok_or(TransferError::InvalidIndex(payload.index))?;
    make_unowned(&mut record);

    enter(TransferPhase::Attaching, &record);
    let doc = record.id;
    let at = dest.tabs().active_index().map_or(0, |i| i + 1);
    let index = dest.adopt_tab(record, at, syntax, settings);
    if let Some(record) = dest.tabs().get(index) {
        enter(TransferPhase::Attached, record);
    }

    if source.tabs().is_empty() {
        source.schedule_close();
    }
    info!(doc = doc.0, from = payload.window.0, to = target.0, index, "tab dropped");
    Ok(index)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::domain::document::{DocumentId, Signal};
    use crate::app::domain::messages::WindowEvent;
    use crate::app::domain::text::TextPos;
    use crate::app::test_support::Fixture;
    use std::path::Path;

    fn setup(fx: &mut Fixture) -> (WindowRegistry, WindowId, WindowId) {
        let mut registry = WindowRegistry::new();
        let mut a = fx.window();
        fx.load_into(&mut a, Path::new("/tmp/one.py"), "def f(x):\n    return [x]\n");
        a.new_tab(&mut fx.env());
        let mut b = fx.window();
        b.new_tab(&mut fx.env());
        let a = registry.insert(a);
        let b = registry.insert(b);
        (registry, a, b)
    }

    fn first_id(registry: &WindowRegistry, window: WindowId) -> DocumentId {
        registry.get(window).unwrap().tabs().get(0).unwrap().id
    }

    #[test]
    fn test_drop_preserves_identity_and_engine() {
        let mut fx = Fixture::new();
        let (mut registry, a, b) = setup(&mut fx);
        let doc = first_id(&registry, a);
        let source = registry.get_mut(a).unwrap();
        source.on_cursor(doc, TextPos::new(0, 5));
        let brackets_before = source.tabs().get(0).unwrap().selections.brackets.clone();
        let stats_before = source.tabs().get(0).unwrap().highlighter.as_ref().unwrap().stats();
        assert_eq!(brackets_before.len(), 2);

        let payload = DragPayload { window: a, index: 0 }.to_string();
        let index = drop_tab(&mut registry, b, &payload, &fx.settings, &fx.syntax).unwrap();

        let dest = registry.get(b).unwrap();
        assert_eq!(index, 1);
        assert_eq!(dest.tabs().active_index(), Some(1));
        let record = dest.tabs().get(1).unwrap();
        assert_eq!(record.id, doc);
        assert_eq!(record.bound_window(), Some(b));
        assert!(record.is_bound(b, Signal::BracketMatch));
        assert_eq!(record.highlighter.as_ref().unwrap().stats(), stats_before);
        assert_eq!(record.selections.brackets, brackets_before);
        assert_eq!(registry.get(a).unwrap().tabs().len(), 1);
    }

    #[test]
    fn test_old_window_no_longer_routes_events() {
        let mut fx = Fixture::new();
        let (mut registry, a, b) = setup(&mut fx);
        let doc = first_id(&registry, a);
        drop_tab(&mut registry, b, &format!("{}+0", a.0), &fx.settings, &fx.syntax).unwrap();

        let source = registry.get_mut(a).unwrap();
        assert!(source.on_edit(doc, TextPos::default(), TextPos::default(), "x").is_none());
        let dest = registry.get_mut(b).unwrap();
        assert!(dest.on_edit(doc, TextPos::default(), TextPos::default(), "x").is_some());
    }

    #[test]
    fn test_destination_toggles_govern_drop() {
        let mut fx = Fixture::new();
        let (mut registry, a, b) = setup(&mut fx);
        let dest = registry.get_mut(b).unwrap();
        dest.set_highlighting(false, &fx.syntax, &fx.settings);
        dest.set_line_numbers(true);

        drop_tab(&mut registry, b, &format!("{}+0", a.0), &fx.settings, &fx.syntax).unwrap();
        let record = registry.get(b).unwrap().tabs().get(1).unwrap();
        assert!(record.highlighter.is_none());
        assert!(record.selections.brackets.is_empty());
        assert!(record.display.line_numbers);
        assert_eq!(record.selections.current_line.len(), 1);
        assert!(!record.is_bound(b, Signal::ViewportFormat));
    }

    #[test]
    fn test_emptied_source_is_scheduled_for_close() {
        let mut fx = Fixture::new();
        let (mut registry, a, b) = setup(&mut fx);
        registry.get_mut(a).unwrap().begin_tab_drag();
        drop_tab(&mut registry, b, &format!("{}+1", a.0), &fx.settings, &fx.syntax).unwrap();
        let source = registry.get_mut(a).unwrap();
        assert!(!source.is_close_scheduled());
        assert!(!source.tab_bar().grabbed);
        assert!(source.take_events().contains(&WindowEvent::PointerGrabReleased));

        drop_tab(&mut registry, b, &format!("{}+0", a.0), &fx.settings, &fx.syntax).unwrap();
        let source = registry.get(a).unwrap();
        assert!(source.tabs().is_empty());
        assert!(source.is_close_scheduled());
        assert_eq!(registry.get(b).unwrap().tabs().len(), 3);
    }

    #[test]
    fn test_bad_drops_are_rejected() {
        let mut fx = Fixture::new();
        let (mut registry, a, b) = setup(&mut fx);
        let before = registry.get(b).unwrap().tabs().len();

        let err = drop_tab(&mut registry, b, "garbage", &fx.settings, &fx.syntax).unwrap_err();
        assert!(matches!(err, TransferError::MalformedPayload(_)));
        let err = drop_tab(&mut registry, b, "+1", &fx.settings, &fx.syntax).unwrap_err();
        assert!(matches!(err, TransferError::MalformedPayload(_)));
        let err = drop_tab(&mut registry, b, &format!("{}+0", b.0), &fx.settings, &fx.syntax).unwrap_err();
        assert_eq!(err, TransferError::SelfDrop);
        let err = drop_tab(&mut registry, b, "9999+0", &fx.settings, &fx.syntax).unwrap_err();
        assert_eq!(err, TransferError::UnknownSource(9999));
        let err = drop_tab(&mut registry, b, &format!("{}+7", a.0), &fx.settings, &fx.syntax).unwrap_err();
        assert_eq!(err, TransferError::InvalidIndex(7));

        assert_eq!(registry.get(b).unwrap().tabs().len(), before);
        assert_eq!(registry.get(a).unwrap().tabs().len(), 2);
    }

    #[test]
    fn test_drop_refused_while_source_loads() {
        let mut fx = Fixture::new();
        let (mut registry, a, b) = setup(&mut fx);
        registry.get_mut(a).unwrap().begin_load();
        let err = drop_tab(&mut registry, b, &format!("{}+0", a.0), &fx.settings, &fx.syntax).unwrap_err();
        assert_eq!(err, TransferError::NotReady);
        assert_eq!(registry.get(a).unwrap().tabs().len(), 2);
    }

    #[test]
    fn test_detach_into_new_window() {
        let mut fx = Fixture::new();
        let (mut registry, a, _) = setup(&mut fx);
        let doc = first_id(&registry, a);
        let source = registry.get_mut(a).unwrap();
        source.set_word_wrap(false);
        source.set_line_numbers(true);
        source.set_active_tab(0);
        source.on_edit(doc, TextPos::new(1, 0), TextPos::new(1, 0), "# note\n");
        assert_eq!(source.count_words(), Some(6));

        let created = detach_tab(&mut registry, a, 0, &fx.settings, &fx.syntax, &fx.ids).unwrap();
        assert_eq!(registry.len(), 3);
        let window = registry.get(created).unwrap();
        let record = window.tabs().get(0).unwrap();
        assert_eq!(record.id, doc);
        assert!(record.is_highlighted());
        assert!(record.is_modified());
        assert_eq!(record.word_count, Some(6));
        assert_eq!(record.encoding, "UTF-8");
        assert_eq!(record.path(), Some(Path::new("/tmp/one.py")));
        assert_eq!(record.bound_window(), Some(created));
        assert!(window.options().line_numbers);
        assert!(!window.options().word_wrap);
        assert_eq!(window.last_opened_path(), Some(Path::new("/tmp/one.py")));
        assert_eq!(registry.get(a).unwrap().tabs().len(), 1);
    }

    #[test]
    fn test_detach_needs_two_tabs() {
        let mut fx = Fixture::new();
        let (mut registry, _, b) = setup(&mut fx);
        let err = detach_tab(&mut registry, b, 0, &fx.settings, &fx.syntax, &fx.ids).unwrap_err();
        assert_eq!(err, TransferError::NothingToDetach);
        let err = detach_tab(&mut registry, WindowId(4242), 0, &fx.settings, &fx.syntax, &fx.ids).unwrap_err();
        assert_eq!(err, TransferError::UnknownSource(4242));
        assert_eq!(registry.len(), 2);
    }
}
