//! Instrument identities on the AREA400 flow loop.
//!
//! The loop carries two control valves (FIC-400B/C) and four flow meters
//! (FIT-400A/B/C/D). The historian records two position signals per valve:
//! the BLOCK1 output and the PID1 output.

use std::fmt;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// Control valve, identified by its loop letter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Valve {
    B,
    C,
}

impl Valve {
    pub const ALL: [Valve; 2] = [Valve::B, Valve::C];

    /// Instrument tag, e.g. `FIC-400B`.
    pub fn tag(self) -> &'static str {
        match self {
            Valve::B => "FIC-400B",
            Valve::C => "FIC-400C",
        }
    }

    /// Parse an instrument tag such as `FIC-400C` (case-insensitive).
    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|v| v.tag().eq_ignore_ascii_case(tag.trim()))
    }
}

impl fmt::Display for Valve {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Flow meter, identified by its loop letter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Meter {
    A,
    B,
    C,
    D,
}

impl Meter {
    pub const ALL: [Meter; 4] = [Meter::A, Meter::B, Meter::C, Meter::D];

    /// Instrument tag, e.g. `FIT-400A`.
    pub fn tag(self) -> &'static str {
        match self {
            Meter::A => "FIT-400A",
            Meter::B => "FIT-400B",
            Meter::C => "FIT-400C",
            Meter::D => "FIT-400D",
        }
    }

    /// Every meter except `self`, in tag order.
    pub fn others(self) -> impl Iterator<Item = Meter> {
        Self::ALL.into_iter().filter(move |m| *m != self)
    }
}

impl fmt::Display for Meter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Which of the two recorded valve-position signals to read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ValveSignal {
    /// BLOCK1 output.
    #[default]
    Block,
    /// PID1 output.
    Pid,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valve_tags_round_trip() {
        for valve in Valve::ALL {
            assert_eq!(Valve::from_tag(valve.tag()), Some(valve));
        }
        assert_eq!(Valve::from_tag("fic-400c"), Some(Valve::C));
        assert_eq!(Valve::from_tag("FIC-400A"), None);
    }

    #[test]
    fn test_meter_others_excludes_self() {
        let others: Vec<Meter> = Meter::B.others().collect();
        assert_eq!(others, vec![Meter::A, Meter::C, Meter::D]);
    }

    #[test]
    fn test_display_uses_tag() {
        assert_eq!(Meter::D.to_string(), "FIT-400D");
        assert_eq!(Valve::B.to_string(), "FIC-400B");
    }
}
