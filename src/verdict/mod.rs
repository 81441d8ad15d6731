//! Verdicts
//!
//! A verdict is kept as an explicit tri-state until it reaches the
//! statistics. Only `sign()` turns it into -1/0/+1.

pub mod extractor;

use serde::{Deserialize, Serialize};
use std::fmt;

pub use extractor::{Extraction, ParseStrategy, VerdictExtractor};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "i8", try_from = "i64")]
pub enum Verdict {
    Unresolved,
    /// The "wrongful" label, -1
    Wrongful,
    /// The "not wrongful" label, +1
    NotWrongful,
}

impl Verdict {
    pub fn sign(&self) -> i8 {
        match self {
            Verdict::Unresolved => 0,
            Verdict::Wrongful => -1,
            Verdict::NotWrongful => 1,
        }
    }

    pub fn is_resolved(&self) -> bool {
        !matches!(self, Verdict::Unresolved)
    }
}

impl From<Verdict> for i8 {
    fn from(v: Verdict) -> Self {
        v.sign()
    }
}

impl TryFrom<i64> for Verdict {
    type Error = String;

    fn try_from(v: i64) -> Result<Self, Self::Error> {
        match v {
            -1 => Ok(Verdict::Wrongful),
            0 => Ok(Verdict::Unresolved),
            1 => Ok(Verdict::NotWrongful),
            other => Err(format!("verdict must be -1, 0 or 1, got {}", other)),
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::Unresolved => f.write_str("unresolved"),
            Verdict::Wrongful => f.write_str("wrongful"),
            Verdict::NotWrongful => f.write_str("not_wrongful"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signs() {
        assert_eq!(Verdict::Wrongful.sign(), -1);
        assert_eq!(Verdict::NotWrongful.sign(), 1);
        assert_eq!(Verdict::Unresolved.sign(), 0);
        assert!(!Verdict::Unresolved.is_resolved());
    }

    #[test]
    fn test_serde_as_integer() {
        assert_eq!(serde_json::to_string(&Verdict::Wrongful).unwrap(), "-1");
        let v: Verdict = serde_json::from_str("1").unwrap();
        assert_eq!(v, Verdict::NotWrongful);
        assert!(serde_json::from_str::<Verdict>("2").is_err());
    }
}
