use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use tracing::warn;

use crate::app::infrastructure::error::AppError;

const MIB: u64 = 1024 * 1024;

/// Available syntax highlighting themes from syntect
/// Each theme has a display name and the internal syntect theme key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum SyntaxTheme {
    #[default]
    Base16OceanDark,
    Base16OceanLight,
    Base16EightiesDark,
    Base16MochaDark,
    SolarizedDark,
    SolarizedLight,
    InspiredGitHub,
}

impl SyntaxTheme {
    /// Get the syntect theme key for this theme
    pub fn theme_key(&self) -> &'static str {
        match self {
            Self::Base16OceanDark => "base16-ocean.dark",
            Self::Base16OceanLight => "base16-ocean.light",
            Self::Base16EightiesDark => "base16-eighties.dark",
            Self::Base16MochaDark => "base16-mocha.dark",
            Self::SolarizedDark => "Solarized (dark)",
            Self::SolarizedLight => "Solarized (light)",
            Self::InspiredGitHub => "InspiredGitHub",
        }
    }

    /// Get the display name for this theme
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Base16OceanDark => "Base16 Ocean Dark",
            Self::Base16OceanLight => "Base16 Ocean Light",
            Self::Base16EightiesDark => "Base16 Eighties Dark",
            Self::Base16MochaDark => "Base16 Mocha Dark",
            Self::SolarizedDark => "Solarized Dark",
            Self::SolarizedLight => "Solarized Light",
            Self::InspiredGitHub => "Inspired GitHub",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FontSpec {
    pub family: String,
    pub point_size: u32,
}

impl Default for FontSpec {
    fn default() -> Self {
        Self {
            family: "Monospace".to_string(),
            point_size: 10,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowSize {
    pub width: u32,
    pub height: u32,
}

impl Default for WindowSize {
    fn default() -> Self {
        Self { width: 700, height: 500 }
    }
}

/// Editor chrome configuration. Read at tab and window creation; only the
/// window geometry fields and the recent-files list are written back at
/// runtime.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppSettings {
    #[serde(default)]
    pub show_line_numbers: bool,

    #[serde(default = "default_true")]
    pub word_wrap: bool,

    #[serde(default = "default_true")]
    pub auto_indent: bool,

    #[serde(default)]
    pub show_status_bar: bool,

    #[serde(default = "default_true")]
    pub syntax_highlighting: bool,

    /// Documents larger than this are never syntax highlighted.
    #[serde(default = "default_max_highlight_size_mib")]
    pub max_highlight_size_mib: u64,

    /// Files larger than this are not opened at all.
    #[serde(default = "default_max_file_size_mib")]
    pub max_file_size_mib: u64,

    #[serde(default)]
    pub tab_wrap_around: bool,

    #[serde(default)]
    pub execute_scripts: bool,

    /// Prefix for the Run action, e.g. "sh" or "python3 -u". Empty runs
    /// the file itself.
    #[serde(default)]
    pub execute_command: String,

    #[serde(default)]
    pub dark_color_scheme: bool,

    #[serde(default = "default_syntax_theme_light")]
    pub syntax_theme_light: SyntaxTheme,

    #[serde(default = "default_syntax_theme_dark")]
    pub syntax_theme_dark: SyntaxTheme,

    #[serde(default)]
    pub font: FontSpec,

    #[serde(default = "default_true")]
    pub remember_window_size: bool,

    #[serde(default)]
    pub window_size: WindowSize,

    #[serde(default)]
    pub start_maximized: bool,

    #[serde(default)]
    pub start_full_screen: bool,

    #[serde(default = "default_true")]
    pub recent_opened: bool,

    #[serde(default = "default_recent_files_number")]
    pub recent_files_number: usize,

    #[serde(default)]
    pub recent_files: Vec<PathBuf>,
}

fn default_true() -> bool {
    true
}

fn default_max_highlight_size_mib() -> u64 {
    2
}

fn default_max_file_size_mib() -> u64 {
    500
}

fn default_syntax_theme_light() -> SyntaxTheme {
    SyntaxTheme::InspiredGitHub
}

fn default_syntax_theme_dark() -> SyntaxTheme {
    SyntaxTheme::Base16OceanDark
}

fn default_recent_files_number() -> usize {
    10
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            show_line_numbers: false,
            word_wrap: true,
            auto_indent: true,
            show_status_bar: false,
            syntax_highlighting: true,
            max_highlight_size_mib: default_max_highlight_size_mib(),
            max_file_size_mib: default_max_file_size_mib(),
            tab_wrap_around: false,
            execute_scripts: false,
            execute_command: String::new(),
            dark_color_scheme: false,
            syntax_theme_light: default_syntax_theme_light(),
            syntax_theme_dark: default_syntax_theme_dark(),
            font: FontSpec::default(),
            remember_window_size: true,
            window_size: WindowSize::default(),
            start_maximized: false,
            start_full_screen: false,
            recent_opened: true,
            recent_files_number: default_recent_files_number(),
            recent_files: Vec::new(),
        }
    }
}

impl AppSettings {
    /// Get the syntax theme for the current color scheme
    pub fn current_syntax_theme(&self) -> SyntaxTheme {
        if self.dark_color_scheme {
            self.syntax_theme_dark
        } else {
            self.syntax_theme_light
        }
    }

    pub fn max_highlight_size_bytes(&self) -> u64 {
        self.max_highlight_size_mib.saturating_mul(MIB)
    }

    pub fn max_file_size_bytes(&self) -> u64 {
        self.max_file_size_mib.saturating_mul(MIB)
    }

    /// Move `path` to the front of the recent-files list.
    pub fn add_recent_file(&mut self, path: &Path) {
        self.recent_files.retain(|p| p != path);
        self.recent_files.insert(0, path.to_path_buf());
        self.recent_files.truncate(self.recent_files_number);
    }

    /// Load settings from disk, or create default if not exists
    pub fn load() -> Self {
        Self::load_from(&Self::get_config_path())
    }

    pub fn load_from(config_path: &Path) -> Self {
        match fs::read_to_string(config_path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(settings) => settings,
                Err(e) => {
                    warn!(error = %e, "failed to parse settings, using defaults");
                    Self::default()
                }
            },
            Err(_) => Self::default(),
        }
    }

    /// Save settings to disk
    pub fn save(&self) -> Result<(), AppError> {
        self.save_to(&Self::get_config_path())
    }

    pub fn save_to(&self, config_path: &Path) -> Result<(), AppError> {
        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let json = serde_json::to_string_pretty(self)?;
        fs::write(config_path, json)?;

        Ok(())
    }

    /// Get config file path (cross-platform)
    pub fn get_config_path() -> PathBuf {
        let mut path = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
        path.push("multipad");
        path.push("settings.json");
        path
    }
}
