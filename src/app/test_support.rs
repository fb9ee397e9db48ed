//! Shared fixtures for controller tests.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use crate::app::controllers::window::{DialogHost, SaveChoice, UnsavedPrompt, WindowController, WindowEnv};
use crate::app::domain::document::IdAllocator;
use crate::app::domain::settings::AppSettings;
use crate::app::services::loader::{BasicCodec, LoadCompletion, LoadMode, LoadOutcome, LoadRequest};
use crate::app::services::syntax::SyntaxResources;

thread_local! {
    static SYNTAX: Rc<SyntaxResources> = Rc::new(SyntaxResources::load_defaults());
}

/// Answers prompts from a queue (Cancel once it runs dry) and records them.
#[derive(Debug, Default)]
pub(crate) struct ScriptedDialogs {
    pub answers: VecDeque<SaveChoice>,
    pub prompts: Vec<UnsavedPrompt>,
    pub save_path: Option<PathBuf>,
}

impl DialogHost for ScriptedDialogs {
    fn ask_unsaved(&mut self, prompt: &UnsavedPrompt) -> SaveChoice {
        self.prompts.push(prompt.clone());
        self.answers.pop_front().unwrap_or(SaveChoice::Cancel)
    }

    fn ask_save_path(&mut self, _suggested: Option<&Path>) -> Option<PathBuf> {
        self.save_path.clone()
    }
}

pub(crate) struct Fixture {
    pub settings: AppSettings,
    pub syntax: Rc<SyntaxResources>,
    pub codec: BasicCodec,
    pub dialogs: ScriptedDialogs,
    pub ids: IdAllocator,
}

impl Fixture {
    pub fn new() -> Self {
        Self {
            settings: AppSettings::default(),
            syntax: SYNTAX.with(Rc::clone),
            codec: BasicCodec,
            dialogs: ScriptedDialogs::default(),
            ids: IdAllocator::new(),
        }
    }

    pub fn env(&mut self) -> WindowEnv<'_> {
        WindowEnv {
            settings: &mut self.settings,
            syntax: &self.syntax,
            codec: &self.codec,
            dialogs: &mut self.dialogs,
            ids: &self.ids,
            another_dialog: false,
        }
    }

    pub fn window(&self) -> WindowController {
        WindowController::new(self.ids.next_window(), &self.settings)
    }

    /// Open `text` as the content of `path` in `win`, as a single-file load.
    pub fn load_into(&mut self, win: &mut WindowController, path: &Path, text: &str) {
        win.begin_load();
        let completion = LoadCompletion {
            request: LoadRequest {
                ticket: 0,
                window: win.id(),
                path: path.to_path_buf(),
                forced_encoding: None,
                mode: LoadMode::Open { multiple: false },
            },
            outcome: LoadOutcome::Loaded {
                text: text.to_string(),
                encoding: "UTF-8".into(),
                size_bytes: text.len() as u64,
            },
        };
        win.complete_load(completion, &[], &mut self.env());
    }
}
