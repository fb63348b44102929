//! `key=value` settings file read at startup.

use std::path::Path;

use log::{debug, warn};

use crate::error::Result;
use crate::i18n::Language;

/// Settings kept between runs. Unknown keys are preserved when the file is
/// rewritten.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Settings {
    entries: Vec<(String, String)>,
}

impl Settings {
    /// Parses settings text. Blank lines, `#` comments and lines without `=`
    /// are ignored; a repeated key keeps its last value.
    pub fn parse(contents: &str) -> Self {
        let mut settings = Self::default();
        for (idx, line) in contents.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            match line.split_once('=') {
                Some((key, value)) => settings.set(key.trim(), value.trim()),
                None => debug!("settings line {} ignored: {line}", idx + 1),
            }
        }
        settings
    }

    /// Reads `path`. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!("no settings file at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        Ok(Self::parse(&crate::io::read_to_string(path)?))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        crate::io::write_string(path, &self.to_text())
    }

    pub fn to_text(&self) -> String {
        self.entries
            .iter()
            .map(|(k, v)| format!("{k}={v}\n"))
            .collect()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn set(&mut self, key: &str, value: &str) {
        match self.entries.iter_mut().find(|(k, _)| k == key) {
            Some(entry) => entry.1 = value.to_string(),
            None => self.entries.push((key.to_string(), value.to_string())),
        }
    }

    /// Interface language; unknown codes fall back to English.
    pub fn language(&self) -> Language {
        match self.get("language") {
            Some(code) => code.parse().unwrap_or_else(|_| {
                warn!("unknown language `{code}` in settings, using English");
                Language::English
            }),
            None => Language::English,
        }
    }

    pub fn set_language(&mut self, language: Language) {
        self.set("language", language.code());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_and_rewrite() {
        let mut s = Settings::parse("# comment\nlanguage = fr\n\ntheme=dark\nnonsense\n");
        assert_eq!(s.language(), Language::French);
        assert_eq!(s.get("theme"), Some("dark"));
        s.set_language(Language::English);
        assert_eq!(s.to_text(), "language=en\ntheme=dark\n");
    }

    #[test]
    fn unknown_language_falls_back() {
        let s = Settings::parse("language=xx\n");
        assert_eq!(s.language(), Language::English);
        assert_eq!(Settings::default().language(), Language::English);
    }

    #[test]
    fn missing_file_gives_defaults() {
        let dir = assert_fs::TempDir::new().unwrap();
        let s = Settings::load(&dir.path().join("settings.txt")).unwrap();
        assert_eq!(s, Settings::default());
    }
}
