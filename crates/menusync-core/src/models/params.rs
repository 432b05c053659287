use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ErrorKind;
use crate::store::CacheKey;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    Cs,
    En,
}

impl Language {
    /// ISO 639-1 code used by the API and in cache file names.
    pub fn code(&self) -> &'static str {
        match self {
            Language::Cs => "cs",
            Language::En => "en",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Language {
    type Err = ErrorKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cs" | "cz" | "czech" => Ok(Language::Cs),
            "en" | "english" => Ok(Language::En),
            other => Err(ErrorKind::Payload(format!("Unsupported language: {}", other))),
        }
    }
}

/// Selects the menu of one outlet in one language.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MenuParams {
    pub outlet_id: u32,
    pub language: Language,
}

impl MenuParams {
    pub fn new(outlet_id: u32, language: Language) -> Self {
        Self { outlet_id, language }
    }
}

impl CacheKey for MenuParams {
    fn cache_name(&self) -> String {
        format!("menu_{}_{}", self.outlet_id, self.language)
    }
}

/// Selects the info pages in one language.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InfoParams {
    pub language: Language,
}

impl CacheKey for InfoParams {
    fn cache_name(&self) -> String {
        format!("info_{}", self.language)
    }
}
