//! Condition Encoder/Decoder
//!
//! Identifiers are `_`-delimited token strings:
//!
//! `{cross}_{scenario}_{frameA}_{frameB}_{index:03}_{setting}_{subject}_{salt}`
//!
//! Decoding only needs to recover trial index, setting and subject, and it has
//! to accept the layouts older generators produced (extra round tags between
//! index and setting, numeric scenario tags, no subject token). It tries an
//! ordered list of strategies and the first hit wins.

use serde::{Deserialize, Serialize};

use super::{sanitize_tag, MeasurementSetting, Party, TrialCondition};

pub const DELIMITER: char = '_';
const SCENARIO_TAG_LEN: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DecodeStrategy {
    /// First numeric token, immediately followed by a setting code.
    NumericThenSetting,
    /// Any setting code, nearest numeric token before it.
    SettingScan,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedIdentifier {
    pub trial_index: u32,
    pub setting: MeasurementSetting,
    pub subject: Option<Party>,
    pub strategy: DecodeStrategy,
}

pub fn encode(condition: &TrialCondition) -> String {
    let mut scenario = sanitize_tag(&condition.scenario, SCENARIO_TAG_LEN);
    if scenario.is_empty() {
        scenario.push('s');
    }

    [
        condition.cross_type.tag().to_string(),
        scenario,
        condition.frame_a.tag(),
        condition.frame_b.tag(),
        format!("{:03}", condition.trial_index),
        condition.setting.code().to_string(),
        condition.subject.code().to_string(),
        condition.salt.clone(),
    ]
    .join(&DELIMITER.to_string())
}

/// `None` means no known layout matched; callers drop the trial and tally it.
pub fn decode(identifier: &str) -> Option<DecodedIdentifier> {
    let tokens: Vec<&str> = identifier.trim().split(DELIMITER).collect();

    const STRATEGIES: [fn(&[&str]) -> Option<DecodedIdentifier>; 2] =
        [numeric_then_setting, setting_scan];

    STRATEGIES.iter().find_map(|strategy| strategy(&tokens))
}

fn parse_index(token: &str) -> Option<u32> {
    if !token.is_empty() && token.chars().all(|c| c.is_ascii_digit()) {
        token.parse().ok()
    } else {
        None
    }
}

fn numeric_then_setting(tokens: &[&str]) -> Option<DecodedIdentifier> {
    let pos = tokens.iter().position(|t| parse_index(t).is_some())?;
    let trial_index = parse_index(tokens[pos])?;
    let setting = MeasurementSetting::from_code(tokens.get(pos + 1)?)?;

    let subject = match tokens.get(pos + 2) {
        Some(token) => Some(Party::from_code(token)?),
        None => None,
    };

    Some(DecodedIdentifier {
        trial_index,
        setting,
        subject,
        strategy: DecodeStrategy::NumericThenSetting,
    })
}

fn setting_scan(tokens: &[&str]) -> Option<DecodedIdentifier> {
    let (pos, setting) = tokens
        .iter()
        .enumerate()
        .find_map(|(i, t)| MeasurementSetting::from_code(t).map(|s| (i, s)))?;

    let trial_index = tokens[..pos].iter().rev().find_map(|t| parse_index(t))?;
    let subject = tokens[pos + 1..].iter().find_map(|t| Party::from_code(t));

    Some(DecodedIdentifier {
        trial_index,
        setting,
        subject,
        strategy: DecodeStrategy::SettingScan,
    })
}
