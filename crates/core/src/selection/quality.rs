//! Quality profiles matched against release titles.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

const UHD_TOKENS: &[&str] = &["2160p", "4k", "uhd"];
const HD_TOKENS: &[&str] = &["720p", "1080p"];

#[derive(Debug, Error, PartialEq, Eq)]
#[error("Unknown quality profile: {0}")]
pub struct UnknownProfile(pub String);

/// Resolution constraint on a release title.
///
/// Matching is a case-insensitive substring test on the raw title.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum QualityProfile {
    #[default]
    Any,
    /// No 720p/1080p/2160p/4k/uhd tag. Untagged titles count as SD.
    #[serde(alias = "480p")]
    Sd,
    #[serde(rename = "hd-720p")]
    Hd720p,
    #[serde(rename = "hd-1080p", alias = "1080p")]
    Hd1080p,
    #[serde(rename = "hd-720p-1080p", alias = "720p")]
    Hd720p1080p,
    #[serde(alias = "2160p")]
    UltraHd,
    /// All of `must` and none of `must_not` appear in the title.
    Custom {
        #[serde(default)]
        must: Vec<String>,
        #[serde(default)]
        must_not: Vec<String>,
    },
}

fn contains_any(title: &str, tokens: &[&str]) -> bool {
    tokens.iter().any(|t| contains_tag(title, t))
}

/// Resolution tags ("720p") match anywhere; short word tags ("4k", "uhd")
/// only as a whole token so "4Kids" or "Thuder" do not count.
fn contains_tag(title: &str, tag: &str) -> bool {
    if tag.ends_with('p') && tag.starts_with(|c: char| c.is_ascii_digit()) {
        return title.contains(tag);
    }
    title
        .split(|c: char| !c.is_ascii_alphanumeric())
        .any(|word| word == tag)
}

impl QualityProfile {
    pub fn matches(&self, title: &str) -> bool {
        let title = title.to_lowercase();
        match self {
            QualityProfile::Any => true,
            QualityProfile::Sd => {
                !contains_any(&title, HD_TOKENS) && !contains_any(&title, UHD_TOKENS)
            }
            QualityProfile::Hd720p => title.contains("720p"),
            QualityProfile::Hd1080p => title.contains("1080p"),
            QualityProfile::Hd720p1080p => contains_any(&title, HD_TOKENS),
            QualityProfile::UltraHd => contains_any(&title, UHD_TOKENS),
            QualityProfile::Custom { must, must_not } => {
                must.iter().all(|t| title.contains(&t.to_lowercase()))
                    && !must_not.iter().any(|t| title.contains(&t.to_lowercase()))
            }
        }
    }

    /// Resolution label for a title: "2160p", "1080p", "720p" or "SD".
    pub fn detect(title: &str) -> &'static str {
        let title = title.to_lowercase();
        if contains_any(&title, UHD_TOKENS) {
            "2160p"
        } else if title.contains("1080p") {
            "1080p"
        } else if title.contains("720p") {
            "720p"
        } else {
            "SD"
        }
    }
}

impl FromStr for QualityProfile {
    type Err = UnknownProfile;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "any" => Ok(QualityProfile::Any),
            "sd" | "480p" => Ok(QualityProfile::Sd),
            "hd-720p" => Ok(QualityProfile::Hd720p),
            "hd-1080p" | "1080p" => Ok(QualityProfile::Hd1080p),
            "hd-720p-1080p" | "720p" => Ok(QualityProfile::Hd720p1080p),
            "ultra-hd" | "2160p" | "4k" => Ok(QualityProfile::UltraHd),
            _ => Err(UnknownProfile(s.to_string())),
        }
    }
}

impl fmt::Display for QualityProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            QualityProfile::Any => "any",
            QualityProfile::Sd => "sd",
            QualityProfile::Hd720p => "hd-720p",
            QualityProfile::Hd1080p => "hd-1080p",
            QualityProfile::Hd720p1080p => "hd-720p-1080p",
            QualityProfile::UltraHd => "ultra-hd",
            QualityProfile::Custom { .. } => "custom",
        };
        f.write_str(s)
    }
}
