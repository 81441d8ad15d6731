//! Verdict Extractor
//!
//! Oracle responses arrive in whatever shape the model felt like: fenced
//! JSON, `Verdict: NTA` lines, or prose that mentions a label somewhere.
//! Parsers are tried in order and the first one that yields a verdict wins.
//! Extraction never fails loudly; an unparseable response becomes
//! `Unresolved` with an excerpt for the failure ledger.

use regex::Regex;
use serde::{Deserialize, Serialize};

use super::Verdict;
use crate::config::VerdictLabels;
use crate::error::Result;
use crate::utils::excerpt;

const VERDICT_KEYS: [&str; 5] = ["verdict", "judgment", "judgement", "label", "answer"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParseStrategy {
    /// `{"verdict": "..."}` somewhere in the text
    JsonPayload,
    /// `Verdict: ...` style line
    LabeledField,
    /// Exactly one of the two labels appears as a standalone word
    BareToken,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extraction {
    pub verdict: Verdict,
    pub strategy: Option<ParseStrategy>,
    /// Only set when nothing could be recovered
    pub excerpt: Option<String>,
}

pub struct VerdictExtractor {
    labels: VerdictLabels,
    excerpt_chars: usize,
    field_re: Regex,
    token_re: Regex,
}

impl VerdictExtractor {
    pub fn new(labels: VerdictLabels, excerpt_chars: usize) -> Result<Self> {
        let field_re = Regex::new(
            r#"(?im)^\W*(?:final\s+)?(?:verdict|judge?ment|label|answer)\W*?[:=]\s*["']?([^"'\n]*)"#,
        )?;
        let token_re = Regex::new(&format!(
            r"(?i)\b({}|{})\b",
            regex::escape(&labels.wrongful),
            regex::escape(&labels.not_wrongful)
        ))?;

        Ok(Self {
            labels,
            excerpt_chars,
            field_re,
            token_re,
        })
    }

    pub fn extract(&self, text: &str) -> Extraction {
        let strategies: [(ParseStrategy, fn(&Self, &str) -> Option<Verdict>); 3] = [
            (ParseStrategy::JsonPayload, Self::json_payload),
            (ParseStrategy::LabeledField, Self::labeled_field),
            (ParseStrategy::BareToken, Self::bare_token),
        ];

        for (strategy, parse) in strategies {
            if let Some(verdict) = parse(self, text) {
                return Extraction {
                    verdict,
                    strategy: Some(strategy),
                    excerpt: None,
                };
            }
        }

        Extraction {
            verdict: Verdict::Unresolved,
            strategy: None,
            excerpt: Some(excerpt(text, self.excerpt_chars)),
        }
    }

    /// Exact label match, ignoring case and surrounding punctuation.
    pub fn classify_label(&self, raw: &str) -> Option<Verdict> {
        let cleaned = raw.trim().trim_matches(|c: char| !c.is_alphanumeric() && c != '_');
        if cleaned.eq_ignore_ascii_case(&self.labels.wrongful) {
            Some(Verdict::Wrongful)
        } else if cleaned.eq_ignore_ascii_case(&self.labels.not_wrongful) {
            Some(Verdict::NotWrongful)
        } else {
            None
        }
    }

    fn json_payload(&self, text: &str) -> Option<Verdict> {
        let stripped = strip_markup(text);
        let start = stripped.find('{')?;
        let end = stripped.rfind('}')?;
        if end < start {
            return None;
        }
        let value: serde_json::Value = serde_json::from_str(&stripped[start..=end]).ok()?;
        find_verdict_field(&value).and_then(|raw| self.sole_label(raw))
    }

    /// Every labeled line must name exactly one label, and all of them the same one.
    fn labeled_field(&self, text: &str) -> Option<Verdict> {
        let stripped = strip_markup(text);
        let mut found: Option<Verdict> = None;
        for value in self.field_re.captures_iter(&stripped).filter_map(|c| c.get(1)) {
            match self.labels_in(value.as_str()).as_slice() {
                [] => continue,
                [verdict] => match found {
                    Some(prev) if prev != *verdict => return None,
                    _ => found = Some(*verdict),
                },
                _ => return None,
            }
        }
        found
    }

    fn bare_token(&self, text: &str) -> Option<Verdict> {
        self.sole_label(text)
    }

    fn sole_label(&self, text: &str) -> Option<Verdict> {
        match self.labels_in(text).as_slice() {
            [verdict] => Some(*verdict),
            _ => None,
        }
    }

    /// Distinct labels appearing as standalone words, in order of first appearance.
    fn labels_in(&self, text: &str) -> Vec<Verdict> {
        let mut found = Vec::new();
        for m in self.token_re.find_iter(text) {
            if let Some(verdict) = self.classify_label(m.as_str()) {
                if !found.contains(&verdict) {
                    found.push(verdict);
                }
            }
        }
        found
    }
}

/// Drops code fences and emphasis markers.
fn strip_markup(text: &str) -> String {
    text.lines()
        .filter(|line| !line.trim_start().starts_with("```"))
        .map(|line| line.replace(['*', '`'], ""))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Case-insensitive key search, depth-first through nested objects.
fn find_verdict_field(value: &serde_json::Value) -> Option<&str> {
    let obj = value.as_object()?;
    for (key, val) in obj {
        if VERDICT_KEYS.iter().any(|k| key.eq_ignore_ascii_case(k)) {
            if let Some(s) = val.as_str() {
                return Some(s);
            }
        }
    }
    obj.values().find_map(find_verdict_field)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extractor() -> VerdictExtractor {
        VerdictExtractor::new(VerdictLabels::default(), 40).unwrap()
    }

    #[test]
    fn test_fenced_json() {
        let text = "Here you go:\n```json\n{\"verdict\": \"YTA\", \"reason\": \"You lied.\"}\n```";
        let out = extractor().extract(text);
        assert_eq!(out.verdict, Verdict::Wrongful);
        assert_eq!(out.strategy, Some(ParseStrategy::JsonPayload));
        assert!(out.excerpt.is_none());
    }

    #[test]
    fn test_nested_json_key_case() {
        let text = r#"{"result": {"Verdict": "nta"}}"#;
        assert_eq!(extractor().extract(text).verdict, Verdict::NotWrongful);
    }

    #[test]
    fn test_ambiguous_json_falls_back() {
        // JSON field is unusable, the prose still names one label
        let text = r#"{"verdict": "unsure"} On reflection, NTA."#;
        let out = extractor().extract(text);
        assert_eq!(out.verdict, Verdict::NotWrongful);
        assert_eq!(out.strategy, Some(ParseStrategy::BareToken));
    }

    #[test]
    fn test_labeled_field_with_markdown() {
        let text = "Some reasoning about YTA and NTA framings.\n**Verdict:** YTA";
        let out = extractor().extract(text);
        assert_eq!(out.verdict, Verdict::Wrongful);
        assert_eq!(out.strategy, Some(ParseStrategy::LabeledField));
    }

    #[test]
    fn test_single_bare_label() {
        assert_eq!(extractor().extract("Honestly? nta.").verdict, Verdict::NotWrongful);
        assert_eq!(extractor().extract("YTA, YTA, definitely YTA").verdict, Verdict::Wrongful);
    }

    #[test]
    fn test_both_labels_unresolved() {
        let out = extractor().extract("Could be YTA, could be NTA.");
        assert_eq!(out.verdict, Verdict::Unresolved);
        assert!(out.excerpt.is_some());
    }

    #[test]
    fn test_no_label_unresolved_with_excerpt() {
        let text = "I would rather not judge this situation at all, it depends on many things.";
        let out = extractor().extract(text);
        assert_eq!(out.verdict, Verdict::Unresolved);
        assert_eq!(out.strategy, None);
        assert!(out.excerpt.unwrap().contains("chars truncated"));
    }

    #[test]
    fn test_label_inside_word_ignored() {
        assert_eq!(extractor().extract("MANTANTA").verdict, Verdict::Unresolved);
    }

    #[test]
    fn test_custom_labels() {
        let labels = VerdictLabels {
            wrongful: "WRONG".into(),
            not_wrongful: "NOT_WRONG".into(),
        };
        let ex = VerdictExtractor::new(labels, 40).unwrap();
        assert_eq!(ex.extract("It is NOT_WRONG.").verdict, Verdict::NotWrongful);
        assert_eq!(ex.extract("It is WRONG.").verdict, Verdict::Wrongful);
    }

    #[test]
    fn test_field_naming_both_labels_unresolved() {
        let out = extractor().extract(r#"{"verdict": "YTA or NTA"}"#);
        assert_eq!(out.verdict, Verdict::Unresolved);
        assert!(out.excerpt.is_some());

        let out = extractor().extract("Verdict: NTA/YTA, it depends");
        assert_eq!(out.verdict, Verdict::Unresolved);
        assert_eq!(out.strategy, None);
    }

    #[test]
    fn test_conflicting_field_lines_unresolved() {
        let out = extractor().extract("Verdict: YTA\nOn second thought...\nFinal verdict: NTA");
        assert_eq!(out.verdict, Verdict::Unresolved);
    }

    #[test]
    fn test_agreeing_field_lines_and_trailing_prose() {
        let text = "Verdict: NTA (not the villain here)\nFinal verdict: nta";
        let out = extractor().extract(text);
        assert_eq!(out.verdict, Verdict::NotWrongful);
        assert_eq!(out.strategy, Some(ParseStrategy::LabeledField));

        let out = extractor().extract(r#"{"verdict": "YTA."}"#);
        assert_eq!(out.verdict, Verdict::Wrongful);
        assert_eq!(out.strategy, Some(ParseStrategy::JsonPayload));
    }
}
