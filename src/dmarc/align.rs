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

//! Identifier alignment (RFC 7489 § 3.1) and the DMARC verdict.
//!
//! Evaluation never fails. Whatever is missing or unusable among the inputs
//! simply cannot produce an aligned pass, so the verdict degrades to `fail`
//! (or `temperror` if some aligned mechanism could not reach a conclusion).

use std::fmt;

use log::debug;

use super::authres::{AuthResult, ResultValue};
use super::psl::{organisational_domain, PublicSuffixes};
use super::record::{AlignmentMode, Record};
use crate::support::dns::{self, Name};

/// The combined status of every aligned result of one mechanism.
///
/// Variants are ordered by precedence: when several aligned results
/// disagree, the greatest one wins.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MechanismStatus {
    /// No aligned result produced a conclusion.
    None,
    /// An aligned result failed. `softfail`, `neutral` and `permerror` all
    /// count as failure.
    Fail,
    /// An aligned result could not be evaluated due to a transient error.
    TempError,
    /// An aligned result passed.
    Pass,
}

impl MechanismStatus {
    fn from_result(value: ResultValue) -> Self {
        match value {
            ResultValue::Pass => Self::Pass,
            ResultValue::TempError => Self::TempError,
            ResultValue::None => Self::None,
            ResultValue::Fail
            | ResultValue::SoftFail
            | ResultValue::Neutral
            | ResultValue::PermError => Self::Fail,
        }
    }

    pub fn keyword(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Fail => "fail",
            Self::TempError => "temperror",
            Self::Pass => "pass",
        }
    }
}

impl fmt::Display for MechanismStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}

/// The aggregated outcome of one mechanism (SPF or DKIM).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MechanismVerdict {
    pub status: MechanismStatus,
    /// The alignment mode the mechanism was evaluated under.
    pub mode: AlignmentMode,
    /// The aligned identity which determined `status`, if any result was
    /// aligned.
    pub domain: Option<Name>,
    /// How many results of this mechanism were present, aligned or not.
    pub results: usize,
    /// How many of those were aligned with the From domain.
    pub aligned: usize,
}

impl MechanismVerdict {
    fn new(mode: AlignmentMode) -> Self {
        Self {
            status: MechanismStatus::None,
            mode,
            domain: None,
            results: 0,
            aligned: 0,
        }
    }

    fn add(&mut self, value: ResultValue, domain: Name) {
        self.aligned += 1;
        let status = MechanismStatus::from_result(value);
        if status > self.status || self.domain.is_none() {
            self.status = self.status.max(status);
            self.domain = Some(domain);
        }
    }
}

/// The DMARC verdict for one message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Verdict {
    /// The overall result: `pass`, `temperror` or `fail`.
    pub result: ResultValue,
    /// The domain of the message's From header.
    pub header_from: Name,
    pub spf: MechanismVerdict,
    pub dkim: MechanismVerdict,
}

impl Verdict {
    pub fn is_pass(&self) -> bool {
        ResultValue::Pass == self.result
    }
}

impl fmt::Display for Verdict {
    /// Formats the verdict as an RFC 8601 `resinfo`, e.g.
    /// `dmarc=pass (spf=pass dkim=none) header.from=example.com`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "dmarc={} (spf={}",
            self.result.keyword(),
            self.spf.status,
        )?;
        if let Some(ref domain) = self.spf.domain {
            write!(f, " {}", dns::display(domain))?;
        }
        if AlignmentMode::Strict == self.spf.mode {
            write!(f, " aspf=s")?;
        }
        write!(f, " dkim={}", self.dkim.status)?;
        if let Some(ref domain) = self.dkim.domain {
            write!(f, " {}", dns::display(domain))?;
        }
        if AlignmentMode::Strict == self.dkim.mode {
            write!(f, " adkim=s")?;
        }
        write!(f, ") header.from={}", dns::display(&self.header_from))
    }
}

/// Evaluate the DMARC result of a message whose From header names
/// `from_domain`, given the applicable DMARC `record` and the results of SPF
/// and DKIM verification.
///
/// `psl` is used to find organisational domains for relaxed alignment.
///
/// The verdict is `pass` if any aligned SPF or DKIM result passed;
/// otherwise `temperror` if any aligned result hit a temporary error;
/// otherwise `fail`. Results which are not aligned with `from_domain` are
/// ignored entirely, even if they passed.
pub fn evaluate_alignment<P: PublicSuffixes + ?Sized>(
    psl: &P,
    from_domain: &Name,
    record: &Record,
    results: &[AuthResult],
) -> Verdict {
    let from_domain = dns::canonicalise(from_domain.clone());
    let from_org_domain = organisational_domain(psl, &from_domain);

    let mut spf = MechanismVerdict::new(record.spf);
    let mut dkim = MechanismVerdict::new(record.dkim);

    for result in results {
        let (verdict, identity, mechanism) = match *result {
            AuthResult::Spf(ref r) => (&mut spf, r.identity(), "spf"),
            AuthResult::Dkim(ref r) => (&mut dkim, r.domain.as_str(), "dkim"),
        };
        verdict.results += 1;

        let Some(domain) = dns::parse_domain(identity) else {
            debug!(
                "Ignoring {mechanism}={} result for unusable identity {:?}",
                result.value(),
                identity,
            );
            continue;
        };

        if !is_aligned(
            psl,
            verdict.mode,
            &from_domain,
            from_org_domain.as_ref(),
            &domain,
        ) {
            debug!(
                "Ignoring {mechanism}={} result for {}: not aligned with {} \
                 ({})",
                result.value(),
                dns::display(&domain),
                dns::display(&from_domain),
                verdict.mode,
            );
            continue;
        }

        verdict.add(result.value(), domain);
    }

    let result = if MechanismStatus::Pass == spf.status
        || MechanismStatus::Pass == dkim.status
    {
        ResultValue::Pass
    } else if MechanismStatus::TempError == spf.status
        || MechanismStatus::TempError == dkim.status
    {
        ResultValue::TempError
    } else {
        ResultValue::Fail
    };

    Verdict {
        result,
        header_from: from_domain,
        spf,
        dkim,
    }
}

/// Determine whether `domain` is aligned with `from_domain` under `mode`.
///
/// `from_org_domain` is the organisational domain of `from_domain`, if it has
/// one.
pub fn is_aligned<P: PublicSuffixes + ?Sized>(
    psl: &P,
    mode: AlignmentMode,
    from_domain: &Name,
    from_org_domain: Option<&Name>,
    domain: &Name,
) -> bool {
    if dns::same_domain(from_domain, domain) {
        return true;
    }

    match mode {
        AlignmentMode::Strict => false,
        AlignmentMode::Relaxed => match (
            from_org_domain,
            organisational_domain(psl, domain),
        ) {
            (Some(a), Some(ref b)) => dns::same_domain(a, b),
            _ => false,
        },
    }
}
