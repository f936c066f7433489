//! Explicit locale passed into formatting and unit conversion.
//!
//! The farm's language and measurement system travel with each request
//! instead of living in process-wide state.

use chrono::{DateTime, TimeZone};
use serde::{Deserialize, Serialize};

/// Unit system a farm displays values in. Serialized the way the weather
/// service expects its `units` parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Measurement {
    #[default]
    Metric,
    Imperial,
}

impl Measurement {
    pub fn as_str(&self) -> &'static str {
        match self {
            Measurement::Metric => "metric",
            Measurement::Imperial => "imperial",
        }
    }
}

/// Languages with translated labels. Unknown codes fall back to English.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Language {
    #[default]
    En,
    Es,
    Fr,
    Pt,
    De,
}

impl Language {
    // ---
    /// Parse a language preference such as `es` or `pt-BR`.
    pub fn from_code(code: &str) -> Self {
        // ---
        let primary = code
            .split(['-', '_'])
            .next()
            .unwrap_or_default()
            .to_ascii_lowercase();

        match primary.as_str() {
            "es" => Language::Es,
            "fr" => Language::Fr,
            "pt" => Language::Pt,
            "de" => Language::De,
            _ => Language::En,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Language::En => "en",
            Language::Es => "es",
            Language::Fr => "fr",
            Language::Pt => "pt",
            Language::De => "de",
        }
    }

    fn chrono_locale(&self) -> chrono::Locale {
        match self {
            Language::En => chrono::Locale::en_US,
            Language::Es => chrono::Locale::es_ES,
            Language::Fr => chrono::Locale::fr_FR,
            Language::Pt => chrono::Locale::pt_BR,
            Language::De => chrono::Locale::de_DE,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Locale {
    pub language: Language,
    pub measurement: Measurement,
}

impl Locale {
    // ---
    pub fn new(language: Language, measurement: Measurement) -> Self {
        Self {
            language,
            measurement,
        }
    }

    /// Placeholder shown where a reading has no usable value.
    pub fn no_data(&self) -> &'static str {
        match self.language {
            Language::En => "No data",
            Language::Es => "Sin datos",
            Language::Fr => "Pas de données",
            Language::Pt => "Sem dados",
            Language::De => "Keine Daten",
        }
    }

    /// Key used for weather values when the service reports no station name.
    pub fn weather_station(&self) -> &'static str {
        match self.language {
            Language::En => "Weather station",
            Language::Es => "Estación meteorológica",
            Language::Fr => "Station météo",
            Language::Pt => "Estação meteorológica",
            Language::De => "Wetterstation",
        }
    }

    /// Short month and two-digit day, ordered the way the language writes dates.
    pub fn short_date<Tz: TimeZone>(&self, time: &DateTime<Tz>) -> String
    where
        Tz::Offset: std::fmt::Display,
    {
        // ---
        let pattern = match self.language {
            Language::En => "%b %d",
            _ => "%d %b",
        };
        time.format_localized(pattern, self.language.chrono_locale())
            .to_string()
    }
}
