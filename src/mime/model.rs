//-
// Copyright (c) 2020, 2024, Jason Lingle
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

use std::borrow::Cow;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AddrSpec<'a> {
    pub local: Vec<Cow<'a, [u8]>>,
    /// The dot-separated parts of the domain, or a single element holding
    /// the bracketed text of a domain literal. Empty if the address had
    /// nothing after the `@`.
    pub domain: Vec<Cow<'a, [u8]>>,
}

impl AddrSpec<'_> {
    pub fn is_domain_literal(&self) -> bool {
        self.domain.first().is_some_and(|part| part.starts_with(b"["))
    }

    pub fn local_text(&self) -> String {
        join_parts(&self.local)
    }

    pub fn domain_text(&self) -> String {
        join_parts(&self.domain)
    }
}

fn join_parts(parts: &[Cow<'_, [u8]>]) -> String {
    let mut s = String::new();
    for part in parts {
        if !s.is_empty() {
            s.push('.');
        }
        s.push_str(&String::from_utf8_lossy(part));
    }
    s
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MailboxSpec<'a> {
    pub addr: AddrSpec<'a>,
    pub name: Vec<Cow<'a, [u8]>>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GroupSpec<'a> {
    pub name: Vec<Cow<'a, [u8]>>,
    pub boxes: Vec<MailboxSpec<'a>>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Address<'a> {
    Mailbox(MailboxSpec<'a>),
    Group(GroupSpec<'a>),
}

impl<'a> Address<'a> {
    /// The mailboxes this address denotes: itself, or the members of the
    /// group.
    pub fn into_mailboxes(self) -> Vec<MailboxSpec<'a>> {
        match self {
            Self::Mailbox(mailbox) => vec![mailbox],
            Self::Group(group) => group.boxes,
        }
    }
}
