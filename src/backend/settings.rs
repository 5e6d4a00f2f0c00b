use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReaderMode {
    #[default]
    Vertical,
    Horizontal,
}

impl ReaderMode {
    pub fn toggled(self) -> Self {
        match self {
            ReaderMode::Vertical => ReaderMode::Horizontal,
            ReaderMode::Horizontal => ReaderMode::Vertical,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ImageQuality {
    #[default]
    High,
    DataSaver,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    pub theme: Theme,
    pub reader_mode: ReaderMode,
    pub image_quality: ImageQuality,
    pub auto_play: bool,
    pub show_page_numbers: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            theme: Theme::Light,
            reader_mode: ReaderMode::Vertical,
            image_quality: ImageQuality::High,
            auto_play: false,
            show_page_numbers: true,
        }
    }
}

/// Partial settings; `None` fields leave the current value alone.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SettingsPatch {
    pub theme: Option<Theme>,
    pub reader_mode: Option<ReaderMode>,
    pub image_quality: Option<ImageQuality>,
    pub auto_play: Option<bool>,
    pub show_page_numbers: Option<bool>,
}

impl SettingsPatch {
    pub fn reader_mode(mode: ReaderMode) -> Self {
        Self { reader_mode: Some(mode), ..Self::default() }
    }

    pub fn auto_play(enabled: bool) -> Self {
        Self { auto_play: Some(enabled), ..Self::default() }
    }
}

fn stored_field<T: DeserializeOwned>(map: &Map<String, Value>, key: &str, default: T) -> T {
    match map.get(key) {
        Some(value) => serde_json::from_value(value.clone()).unwrap_or_else(|e| {
            log::warn!("Ignoring stored setting {}: {}", key, e);
            default
        }),
        None => default,
    }
}

impl Settings {
    /// Reads a stored settings blob field by field, so one bad value only
    /// resets that field.
    pub fn from_stored(value: &Value) -> Self {
        let defaults = Settings::default();
        let Some(map) = value.as_object() else {
            log::warn!("Stored settings are not an object, using defaults");
            return defaults;
        };
        Self {
            theme: stored_field(map, "theme", defaults.theme),
            reader_mode: stored_field(map, "readerMode", defaults.reader_mode),
            image_quality: stored_field(map, "imageQuality", defaults.image_quality),
            auto_play: stored_field(map, "autoPlay", defaults.auto_play),
            show_page_numbers: stored_field(map, "showPageNumbers", defaults.show_page_numbers),
        }
    }

    pub fn merge(&mut self, patch: SettingsPatch) {
        if let Some(theme) = patch.theme {
            self.theme = theme;
        }
        if let Some(mode) = patch.reader_mode {
            self.reader_mode = mode;
        }
        if let Some(quality) = patch.image_quality {
            self.image_quality = quality;
        }
        if let Some(auto_play) = patch.auto_play {
            self.auto_play = auto_play;
        }
        if let Some(show) = patch.show_page_numbers {
            self.show_page_numbers = show;
        }
    }
}
