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

//! Determining the domain a message claims to be from.
//!
//! RFC 7489 § 6.6.1 leaves the handling of pathological From headers to the
//! receiver. We take the strict route: anything other than exactly one From
//! field naming exactly one mailbox is an error, since there is then no single
//! identity to align against.

use itertools::Itertools;
use log::debug;
use thiserror::Error;

use super::psl::{organisational_domain, PublicSuffixes};
use crate::mime::header::{self, Address, HeaderSource};
use crate::support::dns::{self, Name};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum Error {
    #[error("message has {0} From headers")]
    AmbiguousSender(usize),
    #[error("message From header has multiple addresses")]
    MultipleSenders,
    #[error("message From header is invalid")]
    MalformedSender,
    #[error("message From address has invalid domain")]
    InvalidDomain,
    #[error("message From domain is a public suffix")]
    NoOrganisationalDomain,
}

/// The domains DMARC evaluation of a message is anchored to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FromDomain {
    /// The domain of the sole From address.
    pub domain: Name,
    /// The organisational domain of `domain`, under which the DMARC record
    /// is published.
    pub org_domain: Name,
}

/// Extract the From domain and its organisational domain from the header
/// fields of a message.
pub fn extract_domains<P, H>(psl: &P, headers: &H) -> Result<FromDomain, Error>
where
    P: PublicSuffixes + ?Sized,
    H: HeaderSource + ?Sized,
{
    let from_header = headers
        .field_values("From")
        .into_iter()
        .exactly_one()
        .map_err(|e| Error::AmbiguousSender(e.count()))?;

    let from_addresses = header::parse_address_list(from_header)
        .ok_or(Error::MalformedSender)?;

    let mailbox = match from_addresses
        .into_iter()
        .flat_map(Address::into_mailboxes)
        .exactly_one()
    {
        Ok(mailbox) => mailbox,
        Err(e) => {
            return Err(if 0 == e.count() {
                Error::MalformedSender
            } else {
                Error::MultipleSenders
            });
        },
    };

    if mailbox.addr.is_domain_literal() {
        return Err(Error::InvalidDomain);
    }

    let domain_text = mailbox.addr.domain_text();
    let domain = dns::parse_domain(&domain_text)
        .filter(|d| d.num_labels() >= 2)
        .ok_or(Error::InvalidDomain)?;
    let org_domain = organisational_domain(psl, &domain)
        .ok_or(Error::NoOrganisationalDomain)?;

    debug!(
        "From domain {} has organisational domain {}",
        dns::display(&domain),
        dns::display(&org_domain),
    );

    Ok(FromDomain { domain, org_domain })
}
