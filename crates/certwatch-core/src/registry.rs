//! Expected catalog entries per environment.
//!
//! The built-in registry mirrors the deployments the health check watches.
//! Titles are kept exactly as the business supplied them, punctuation
//! drift included; the differ's tolerant matching absorbs the variants.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// UI chrome rendered inside the catalog container that is never a real entry.
pub const NOISE_ENTRIES: &[&str] = &["Cancel", "Back", "Continue", "Select your Qualification..."];

/// True when `text` is known UI chrome rather than a catalog entry.
pub fn is_noise(text: &str) -> bool {
    let text = text.trim();
    NOISE_ENTRIES.iter().any(|n| n.eq_ignore_ascii_case(text))
}

/// One catalog entry a correct deployment must expose.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpectedEntry {
    /// Primary matching key.
    pub title: String,
    /// Secondary line checked for visibility only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtitle: Option<String>,
}

impl ExpectedEntry {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            subtitle: None,
        }
    }

    pub fn with_subtitle(mut self, subtitle: impl Into<String>) -> Self {
        self.subtitle = Some(subtitle.into());
        self
    }
}

/// A deployed environment and the catalog it is expected to render.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvironmentSpec {
    /// Display name, e.g. `DEMO`.
    pub name: String,
    pub base_url: String,
    pub expected: Vec<ExpectedEntry>,
    /// Select the first expected entry once the catalog is verified.
    #[serde(default = "default_select_first")]
    pub select_first: bool,
}

fn default_select_first() -> bool {
    true
}

impl EnvironmentSpec {
    pub fn new(name: impl Into<String>, base_url: impl Into<String>, expected: &[&str]) -> Self {
        Self {
            name: name.into(),
            base_url: base_url.into(),
            expected: expected.iter().map(|t| ExpectedEntry::new(*t)).collect(),
            select_first: true,
        }
    }

    /// Lowercase file-name stem used for this environment's artifacts.
    pub fn slug(&self) -> String {
        self.name.to_ascii_lowercase()
    }

    /// Primary test-result artifact (`<slug>-results.json`).
    pub fn results_path(&self, report_dir: &Path) -> PathBuf {
        report_dir.join(format!("{}-results.json", self.slug()))
    }

    /// Per-run summary artifact (`<slug>-certification-summary.json`).
    pub fn summary_path(&self, report_dir: &Path) -> PathBuf {
        report_dir.join(format!("{}-certification-summary.json", self.slug()))
    }

    pub fn screenshot_path(&self, report_dir: &Path) -> PathBuf {
        report_dir.join(format!(
            "{}-certification-dropdown-validated.png",
            self.slug()
        ))
    }
}

/// Look up an environment by name, ignoring ASCII case.
pub fn find_environment<'a>(envs: &'a [EnvironmentSpec], name: &str) -> Option<&'a EnvironmentSpec> {
    envs.iter().find(|e| e.name.eq_ignore_ascii_case(name))
}

/// The environments watched out of the box, with their production URLs.
pub fn builtin_environments() -> Vec<EnvironmentSpec> {
    vec![
        EnvironmentSpec::new(
            "DEMO",
            "https://demo.certified.io",
            &[
                "CHC52021 - Diploma of Community Services",
                "CHC43015 - Certificate IV in Ageing Support",
                "CPP20218 - Certificate II in Security Operations",
                "CPC30220 Certificate III in Carpentry",
            ],
        ),
        EnvironmentSpec::new(
            "EBC",
            "https://ebc.certified.io",
            &[
                "AUR31120 Certificate III in Heavy Commercial Vehicle Mechanical Technology",
                "CPC40920 Certificate IV in Plumbing and Services (Operations)",
                "AHC30921 Certificate III in Landscape Construction",
                "CPC32420 Certificate III in Plumbing",
                "Professional Web Development Certification",
                "AUR30620 Certificate III in Light Vehicle Mechanical Technology",
                "BSB50420 Diploma of Leadership and Management",
                "BSB60420 Advanced Diploma of Leadership and Management",
                "CPC30620 Certificate III in Painting and Decorating",
                "MEM30219 Certificate III in Engineering - Mechanical Trade",
                "MEM31922 Certificate III in Engineering - Fabrication Trade (Welding)",
                "CPC40920 Certificate IV in Plumbing and Services (Hydraulics)",
            ],
        ),
        EnvironmentSpec::new(
            "ETRAINING",
            "https://etraining.certified.io",
            &[
                "Certificate IV in Building and Construction",
                "CPC30220- Certificate III in Carpentry",
            ],
        ),
    ]
}
