//! Interface translations loaded from a `key;English;French` file.

use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use log::debug;

use crate::error::{Result, TopoError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Language {
    #[default]
    English,
    French,
}

impl Language {
    pub fn code(&self) -> &'static str {
        match self {
            Self::English => "en",
            Self::French => "fr",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Language {
    type Err = TopoError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "en" | "english" => Ok(Self::English),
            "fr" | "french" | "francais" | "français" => Ok(Self::French),
            _ => Err(TopoError::invalid("language", s, "expected `en` or `fr`")),
        }
    }
}

// English texts for every message the command line prints. A translation
// file only needs to provide what it wants to override.
const BUILTIN: &[(&str, &str)] = &[
    ("info.no_data", "You must load some data before drawing a map!"),
    ("info.no_map", "You must draw a map before saving it!"),
    ("error.io", "Error while accessing a file"),
    ("error.parse", "Error while reading input file... maybe something is wrong with it?"),
    ("error.parameter", "Is something wrong with the parameters?"),
    ("error.font", "No font available for labels"),
    ("error.render", "The map could not be rendered"),
    ("msg.loaded", "Data loaded"),
    ("msg.drawn", "Map drawn"),
    ("msg.saved", "Map saved to"),
    ("msg.initial_scale", "Initial scale"),
    ("msg.resize_ratio", "Resize ratio"),
    ("msg.language", "Language set to"),
    ("msg.unknown_command", "Unknown command"),
    ("msg.levels", "Contour levels"),
    (
        "msg.help",
        "Commands: load <file>, set <key> <value>, params, draw, save <file>, \
         lang <en|fr>, help, quit",
    ),
];

/// Translation table with a current language.
#[derive(Debug, Clone, Default)]
pub struct Translations {
    language: Language,
    entries: HashMap<String, (String, String)>,
}

impl Translations {
    /// Table holding only the built-in English texts.
    pub fn builtin(language: Language) -> Self {
        Self {
            language,
            entries: HashMap::new(),
        }
    }

    /// Parses `key;English;French` rows. Blank lines and `#` comments are
    /// skipped; fields beyond the third are ignored.
    pub fn parse(contents: &str, language: Language) -> Result<Self> {
        let mut entries = HashMap::new();
        for (idx, line) in contents.lines().enumerate() {
            if line.trim().is_empty() || line.trim_start().starts_with('#') {
                continue;
            }
            let fields: Vec<&str> = line.split(';').map(str::trim).collect();
            if fields.len() < 3 {
                return Err(TopoError::Parse {
                    line: idx + 1,
                    message: "expected key;English;French".to_string(),
                });
            }
            entries.insert(
                fields[0].to_string(),
                (fields[1].to_string(), fields[2].to_string()),
            );
        }
        debug!("loaded {} translations", entries.len());
        Ok(Self { language, entries })
    }

    pub fn load(path: &Path, language: Language) -> Result<Self> {
        Self::parse(&crate::io::read_to_string(path)?, language)
    }

    pub fn language(&self) -> Language {
        self.language
    }

    pub fn set_language(&mut self, language: Language) {
        self.language = language;
    }

    /// Text for `key` in the current language, falling back to English, then
    /// to the built-in text, then to the key itself.
    pub fn tr<'a>(&'a self, key: &'a str) -> &'a str {
        if let Some((en, fr)) = self.entries.get(key) {
            let text = match self.language {
                Language::English => en,
                Language::French => fr,
            };
            if !text.is_empty() {
                return text;
            }
            if !en.is_empty() {
                return en;
            }
        }
        BUILTIN
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, text)| *text)
            .unwrap_or(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TABLE: &str = "# key;en;fr\n\
        msg.drawn;Map drawn;Carte dessinée\n\
        msg.saved;Map saved to;\n\
        \n\
        custom;Hello;Bonjour;extra\n";

    #[test]
    fn french_lookup_with_fallbacks() {
        let t = Translations::parse(TABLE, Language::French).unwrap();
        assert_eq!(t.tr("msg.drawn"), "Carte dessinée");
        assert_eq!(t.tr("msg.saved"), "Map saved to");
        assert_eq!(t.tr("custom"), "Bonjour");
        assert_eq!(t.tr("info.no_map"), "You must draw a map before saving it!");
        assert_eq!(t.tr("no.such.key"), "no.such.key");
    }

    #[test]
    fn switch_language() {
        let mut t = Translations::parse(TABLE, Language::French).unwrap();
        t.set_language(Language::English);
        assert_eq!(t.tr("custom"), "Hello");
    }

    #[test]
    fn short_row_rejected() {
        let err = Translations::parse("ok;a;b\nbroken;only\n", Language::English).unwrap_err();
        match err {
            TopoError::Parse { line, .. } => assert_eq!(line, 2),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn language_codes() {
        assert_eq!("FR".parse::<Language>().unwrap(), Language::French);
        assert_eq!(Language::English.to_string(), "en");
        assert!("de".parse::<Language>().is_err());
    }
}
