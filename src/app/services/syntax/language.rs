//! File name → language tag detection.

use std::path::Path;

const SHELL_DOTFILES: &[&str] = &[
    ".bashrc",
    ".bash_profile",
    ".xprofile",
    ".profile",
    ".bash_aliases",
    ".mkshrc",
    ".zprofile",
    ".zlogin",
    ".zshrc",
    ".zshenv",
];

const SCRIPT_LANGUAGES: &[&str] = &["sh", "python", "ruby", "lua", "perl"];

/// Infer the language tag of a file from its name.
/// Returns None when nothing is recognized.
pub fn detect_language(path: &Path) -> Option<&'static str> {
    let base = path.file_name()?.to_str()?;
    if base.ends_with(".sub") {
        return None;
    }

    if base.contains('.') {
        return by_ending(base);
    }

    match base {
        "PKGBUILD" => Some("sh"),
        "gtkrc" => Some("gtkrc"),
        _ if base.eq_ignore_ascii_case("makefile") => Some("makefile"),
        _ if base.eq_ignore_ascii_case("changelog") => Some("changelog"),
        _ => None,
    }
}

fn by_ending(base: &str) -> Option<&'static str> {
    let lower = base.to_ascii_lowercase();
    let ends = |suffixes: &[&str]| suffixes.iter().any(|s| base.ends_with(s));

    let lang = if ends(&[".cpp", ".h"]) {
        "cpp"
    } else if ends(&[".c"]) {
        "c"
    } else if ends(&[".sh"]) || SHELL_DOTFILES.contains(&base) {
        "sh"
    } else if ends(&[".rb"]) {
        "ruby"
    } else if ends(&[".lua"]) {
        "lua"
    } else if ends(&[".py"]) {
        "python"
    } else if ends(&[".pl"]) {
        "perl"
    } else if ends(&[".pro", ".pri"]) {
        "qmake"
    } else if ends(&[".tr", ".t", ".roff"]) {
        "troff"
    } else if ends(&[".xml", ".svg", ".qrc", ".rdf", ".docbook", ".fnx", ".ts", ".menu"]) {
        "xml"
    } else if ends(&[".css", ".qss"]) {
        "css"
    } else if ends(&[".desktop", ".desktop.in", ".directory"]) {
        "desktop"
    } else if ends(&[".js"]) {
        "javascript"
    } else if ends(&[".qml"]) {
        "qml"
    } else if lower.ends_with(".log") {
        "log"
    } else if ends(&[".php"]) {
        "php"
    } else if ends(&[".url"]) {
        "url"
    } else if ends(&[".diff", ".patch"]) {
        "diff"
    } else if ends(&[".srt"]) {
        "srt"
    } else if ends(&[".theme"]) {
        "theme"
    } else if ends(&[".rc"]) {
        "gtkrc"
    } else if lower.ends_with(".htm") || lower.ends_with(".html") {
        "html"
    } else if ends(&[".markdown", ".md", ".mkd"]) {
        "markdown"
    } else if base == "sources.list" || base == "sources.list.save" {
        "sourceslist"
    } else if lower.starts_with("makefile.") && !base.ends_with(".txt") {
        "makefile"
    } else if lower == "cmakelists.txt" {
        "cmake"
    } else {
        return None;
    };
    Some(lang)
}

/// Token used to look a language tag up in the syntax set.
/// Tags without a bundled grammar return None.
pub fn syntax_token(language: &str) -> Option<&'static str> {
    let token = match language {
        "cpp" => "cpp",
        "c" => "c",
        "sh" => "sh",
        "ruby" => "rb",
        "lua" => "lua",
        "python" => "py",
        "perl" => "pl",
        "xml" => "xml",
        "css" => "css",
        "javascript" => "js",
        "php" => "php",
        "diff" => "diff",
        "html" => "html",
        "markdown" => "md",
        "makefile" => "Makefile",
        _ => return None,
    };
    Some(token)
}

/// Languages the Run action can execute.
pub fn is_script_language(language: &str) -> bool {
    SCRIPT_LANGUAGES.contains(&language)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lang(name: &str) -> Option<&'static str> {
        detect_language(Path::new(name))
    }

    #[test]
    fn test_common_extensions() {
        assert_eq!(lang("/tmp/main.cpp"), Some("cpp"));
        assert_eq!(lang("a.c"), Some("c"));
        assert_eq!(lang("run.py"), Some("python"));
        assert_eq!(lang("README.md"), Some("markdown"));
        assert_eq!(lang("INDEX.HTML"), Some("html"));
        assert_eq!(lang("fix.patch"), Some("diff"));
    }

    #[test]
    fn test_special_basenames() {
        assert_eq!(lang("/home/u/.bashrc"), Some("sh"));
        assert_eq!(lang("PKGBUILD"), Some("sh"));
        assert_eq!(lang("Makefile"), Some("makefile"));
        assert_eq!(lang("makefile.am"), Some("makefile"));
        assert_eq!(lang("CMakeLists.txt"), Some("cmake"));
        assert_eq!(lang("ChangeLog"), Some("changelog"));
    }

    #[test]
    fn test_unrecognized() {
        assert_eq!(lang("notes.txt"), None);
        assert_eq!(lang("movie.sub"), None);
        assert_eq!(lang("LICENSE"), None);
    }

    #[test]
    fn test_tokens_and_scripts() {
        assert_eq!(syntax_token("python"), Some("py"));
        assert_eq!(syntax_token("srt"), None);
        assert!(is_script_language("sh"));
        assert!(!is_script_language("cpp"));
    }
}
