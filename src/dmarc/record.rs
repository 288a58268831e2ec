//-
// Copyright (c) 2024, Jason Lingle
//
// This file is part of Crymap.
//
// Crymap is free software: you can  redistribute it and/or modify it under the
// terms of  the GNU General Public  License as published by  the Free Software
// Foundation, either version  3 of the License, or (at  your option) any later
// version.
//
// Crymap is distributed  in the hope that  it will be useful,  but WITHOUT ANY
// WARRANTY; without  even the implied  warranty of MERCHANTABILITY  or FITNESS
// FOR  A PARTICULAR  PURPOSE.  See the  GNU General  Public  License for  more
// details.
//
// You should have received a copy of the GNU General Public License along with
// Crymap. If not, see <http://www.gnu.org/licenses/>.

//! The parts of a DMARC record (RFC 7489 § 6.3) which alignment depends on.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Deserialize, Serialize,
)]
#[serde(rename_all = "lowercase")]
pub enum AlignmentMode {
    #[default]
    #[serde(alias = "r")]
    Relaxed,
    #[serde(alias = "s")]
    Strict,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
#[error("alignment mode must be 'r', 's', 'relaxed', or 'strict'")]
pub struct InvalidAlignmentMode;

impl FromStr for AlignmentMode {
    type Err = InvalidAlignmentMode;

    /// Accepts both the `adkim=`/`aspf=` tag values and the spelled-out
    /// names, case-insensitively.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("r") || s.eq_ignore_ascii_case("relaxed") {
            Ok(Self::Relaxed)
        } else if s.eq_ignore_ascii_case("s")
            || s.eq_ignore_ascii_case("strict")
        {
            Ok(Self::Strict)
        } else {
            Err(InvalidAlignmentMode)
        }
    }
}

impl fmt::Display for AlignmentMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::Relaxed => write!(f, "relaxed"),
            Self::Strict => write!(f, "strict"),
        }
    }
}

/// The published DMARC policy of an organisational domain, as far as
/// identifier alignment is concerned.
///
/// Other fields of the record (requested disposition, reporting addresses,
/// etc.) are the business of whoever acts on the verdict.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Deserialize, Serialize,
)]
#[serde(default)]
pub struct Record {
    /// `aspf=`
    pub spf: AlignmentMode,
    /// `adkim=`
    pub dkim: AlignmentMode,
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn parse_alignment_mode() {
        assert_eq!(Ok(AlignmentMode::Relaxed), "r".parse());
        assert_eq!(Ok(AlignmentMode::Strict), "s".parse());
        assert_eq!(Ok(AlignmentMode::Strict), "Strict".parse());
        assert_eq!(Ok(AlignmentMode::Relaxed), "RELAXED".parse());
        assert_eq!(Err(InvalidAlignmentMode), "y".parse::<AlignmentMode>());
        assert_eq!(Err(InvalidAlignmentMode), "".parse::<AlignmentMode>());
    }

    #[test]
    fn record_defaults_to_relaxed() {
        let record = Record::default();
        assert_eq!(AlignmentMode::Relaxed, record.spf);
        assert_eq!(AlignmentMode::Relaxed, record.dkim);

        let record: Record = toml::from_str("spf = \"strict\"").unwrap();
        assert_eq!(AlignmentMode::Strict, record.spf);
        assert_eq!(AlignmentMode::Relaxed, record.dkim);

        let record: Record = toml::from_str("dkim = \"s\"").unwrap();
        assert_eq!(AlignmentMode::Relaxed, record.spf);
        assert_eq!(AlignmentMode::Strict, record.dkim);
    }
}
