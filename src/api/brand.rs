//! Brand-voice preferences (`/api/brand/preferences`).

use serde::{Deserialize, Serialize};

use crate::generation::ToneParams;

/// Stored brand voice. `sample` holds up to two writing samples separated
/// by a newline.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrandPreferences {
    #[serde(default)]
    pub tone: String,
    #[serde(default)]
    pub style: String,
    #[serde(default)]
    pub sample: String,
}

impl BrandPreferences {
    /// Build from two separate writing samples.
    #[must_use]
    pub fn with_samples(tone: impl Into<String>, style: impl Into<String>, first: &str, second: &str) -> Self {
        Self { tone: tone.into(), style: style.into(), sample: format!("{first}\n{second}") }
    }

    /// The two writing samples; missing ones are empty.
    #[must_use]
    pub fn samples(&self) -> (&str, &str) {
        let mut parts = self.sample.splitn(2, '\n');
        let first = parts.next().unwrap_or("");
        let second = parts.next().unwrap_or("");
        (first, second)
    }
}

impl From<&BrandPreferences> for ToneParams {
    fn from(prefs: &BrandPreferences) -> Self {
        fn non_blank(v: &str) -> Option<String> {
            let v = v.trim();
            (!v.is_empty()).then(|| v.to_string())
        }
        Self { tone: non_blank(&prefs.tone), style: non_blank(&prefs.style), sample: non_blank(&prefs.sample) }
    }
}
