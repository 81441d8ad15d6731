//! Trial Design
//!
//! Shared vocabulary for a Bell-type judgment experiment: the two questioning
//! axes, the two parties, the four measurement settings, the per-party frame
//! (language + tense) and the immutable `TrialCondition` each request is built from.

pub mod catalog;
pub mod generator;
pub mod identifier;
pub mod manifest;

use serde::{Deserialize, Serialize};
use std::fmt;

pub use catalog::ScenarioCatalog;
pub use generator::{DesignGenerator, DesignOutput, DesignParams, GenerationSummary};
pub use identifier::{decode, encode, DecodedIdentifier, DecodeStrategy};
pub use manifest::Manifest;

/// Questioning framework used to elicit a verdict (the "measurement basis").
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Axis {
    Primary,
    Secondary,
}

impl Axis {
    pub fn code(&self) -> char {
        match self {
            Axis::Primary => 'P',
            Axis::Secondary => 'S',
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Axis::Primary => "primary",
            Axis::Secondary => "secondary",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Party {
    A,
    B,
}

impl Party {
    pub const BOTH: [Party; 2] = [Party::A, Party::B];

    pub fn code(&self) -> &'static str {
        match self {
            Party::A => "A",
            Party::B => "B",
        }
    }

    /// Accepts the current codes plus the spellings older generators used.
    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "A" | "a" | "alice" | "Alice" => Some(Party::A),
            "B" | "b" | "bob" | "Bob" => Some(Party::B),
            _ => None,
        }
    }
}

/// One of the four (party A axis, party B axis) combinations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum MeasurementSetting {
    PP,
    PS,
    SP,
    SS,
}

impl MeasurementSetting {
    pub const ALL: [MeasurementSetting; 4] = [
        MeasurementSetting::PP,
        MeasurementSetting::PS,
        MeasurementSetting::SP,
        MeasurementSetting::SS,
    ];

    pub fn code(&self) -> &'static str {
        match self {
            MeasurementSetting::PP => "PP",
            MeasurementSetting::PS => "PS",
            MeasurementSetting::SP => "SP",
            MeasurementSetting::SS => "SS",
        }
    }

    /// Case-sensitive: salts are lowercase and must never read as a setting.
    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "PP" => Some(MeasurementSetting::PP),
            "PS" => Some(MeasurementSetting::PS),
            "SP" => Some(MeasurementSetting::SP),
            "SS" => Some(MeasurementSetting::SS),
            _ => None,
        }
    }

    pub fn axis(&self, party: Party) -> Axis {
        let (a, b) = match self {
            MeasurementSetting::PP => (Axis::Primary, Axis::Primary),
            MeasurementSetting::PS => (Axis::Primary, Axis::Secondary),
            MeasurementSetting::SP => (Axis::Secondary, Axis::Primary),
            MeasurementSetting::SS => (Axis::Secondary, Axis::Secondary),
        };
        match party {
            Party::A => a,
            Party::B => b,
        }
    }

    /// Position in `ALL`, used to index per-setting arrays.
    pub fn index(&self) -> usize {
        match self {
            MeasurementSetting::PP => 0,
            MeasurementSetting::PS => 1,
            MeasurementSetting::SP => 2,
            MeasurementSetting::SS => 3,
        }
    }
}

impl fmt::Display for MeasurementSetting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Which dimension(s) differ between the two compared parties.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CrossType {
    Mono,
    CrossLingual,
    CrossTemporal,
    CrossDimensional,
    CrossModel,
}

impl CrossType {
    pub const ALL: [CrossType; 5] = [
        CrossType::Mono,
        CrossType::CrossLingual,
        CrossType::CrossTemporal,
        CrossType::CrossDimensional,
        CrossType::CrossModel,
    ];

    pub fn tag(&self) -> &'static str {
        match self {
            CrossType::Mono => "mono",
            CrossType::CrossLingual => "xling",
            CrossType::CrossTemporal => "xtemp",
            CrossType::CrossDimensional => "xdim",
            CrossType::CrossModel => "xmodel",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        CrossType::ALL.into_iter().find(|c| c.tag() == tag)
    }
}

impl fmt::Display for CrossType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Per-party dimension values.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Frame {
    pub language: String,
    pub tense: String,
}

impl Frame {
    pub fn new(language: impl Into<String>, tense: impl Into<String>) -> Self {
        Self {
            language: language.into(),
            tense: tense.into(),
        }
    }

    /// Identifier token, e.g. `en-past`.
    pub fn tag(&self) -> String {
        format!("{}-{}", sanitize_tag(&self.language, 8), sanitize_tag(&self.tense, 8))
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.language, self.tense)
    }
}

/// Immutable description of one oracle request, fixed at design time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrialCondition {
    pub scenario: String,
    pub frame_a: Frame,
    pub frame_b: Frame,
    pub setting: MeasurementSetting,
    pub subject: Party,
    pub trial_index: u32,
    pub cross_type: CrossType,
    pub salt: String,
}

impl TrialCondition {
    /// Frame of the party this request is addressed to.
    pub fn subject_frame(&self) -> &Frame {
        match self.subject {
            Party::A => &self.frame_a,
            Party::B => &self.frame_b,
        }
    }

    pub fn subject_axis(&self) -> Axis {
        self.setting.axis(self.subject)
    }

    pub fn configuration_key(&self) -> ConfigurationKey {
        ConfigurationKey {
            scenario: self.scenario.clone(),
            frame_a: self.frame_a.clone(),
            frame_b: self.frame_b.clone(),
            cross_type: self.cross_type,
            source: None,
        }
    }
}

/// Identifies one Bell-test instance.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ConfigurationKey {
    pub scenario: String,
    pub frame_a: Frame,
    pub frame_b: Frame,
    pub cross_type: CrossType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

impl ConfigurationKey {
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }
}

impl fmt::Display for ConfigurationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {} {} vs {}", self.cross_type, self.scenario, self.frame_a, self.frame_b)?;
        if let Some(ref source) = self.source {
            write!(f, " @{}", source)?;
        }
        Ok(())
    }
}

/// Lowercase alphanumerics only, cut to `max` chars. Keeps tokens free of
/// the identifier delimiter.
pub fn sanitize_tag(raw: &str, max: usize) -> String {
    raw.chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .take(max)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_setting_axes() {
        assert_eq!(MeasurementSetting::PS.axis(Party::A), Axis::Primary);
        assert_eq!(MeasurementSetting::PS.axis(Party::B), Axis::Secondary);
        assert_eq!(MeasurementSetting::SP.axis(Party::A), Axis::Secondary);
        for (i, s) in MeasurementSetting::ALL.iter().enumerate() {
            assert_eq!(s.index(), i);
            assert_eq!(MeasurementSetting::from_code(s.code()), Some(*s));
        }
    }

    #[test]
    fn test_setting_codes_case_sensitive() {
        assert_eq!(MeasurementSetting::from_code("ps"), None);
    }

    #[test]
    fn test_legacy_party_codes() {
        assert_eq!(Party::from_code("alice"), Some(Party::A));
        assert_eq!(Party::from_code("b"), Some(Party::B));
        assert_eq!(Party::from_code("C"), None);
    }

    #[test]
    fn test_frame_tag_sanitized() {
        let frame = Frame::new("pt_BR", "Future Perfect");
        assert_eq!(frame.tag(), "ptbr-futurepe");
    }

    #[test]
    fn test_cross_type_tags() {
        for ct in CrossType::ALL {
            assert_eq!(CrossType::from_tag(ct.tag()), Some(ct));
        }
    }
}
