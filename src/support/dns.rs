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

//! Domain name handling shared by the DMARC components.
//!
//! All names handed out by this module are in a canonical form: relative (no
//! trailing root label) and lower-case ASCII. Comparisons go through
//! `same_domain` so that they never depend on how `Name` treats FQDN-ness.

pub use hickory_proto::rr::Name;

/// Parse `s` as a domain name, accepting the relaxed syntax found in the wild
/// (e.g. underscores).
///
/// Returns `None` for empty input, the root domain, wildcard names, or
/// anything that is not a syntactically valid name.
pub fn parse_domain(s: &str) -> Option<Name> {
    let s = s.trim();
    if s.is_empty() || "." == s {
        return None;
    }

    let name = Name::from_str_relaxed(s).ok()?;
    if 0 == name.num_labels() || name.is_wildcard() {
        return None;
    }

    Some(canonicalise(name))
}

/// Put `name` into the canonical form used throughout this crate.
pub fn canonicalise(mut name: Name) -> Name {
    name.set_fqdn(false);
    name.to_lowercase()
}

/// Return the rightmost `labels` labels of `name`.
pub fn trim_to(name: &Name, labels: usize) -> Name {
    canonicalise(name.trim_to(labels))
}

/// Case-insensitive label-by-label comparison.
pub fn same_domain(a: &Name, b: &Name) -> bool {
    a.num_labels() == b.num_labels()
        && a.iter().zip(b.iter()).all(|(a, b)| a.eq_ignore_ascii_case(b))
}

/// Render `name` as ASCII without a trailing dot.
pub fn display(name: &Name) -> String {
    let mut s = name.to_ascii();
    if s.ends_with('.') {
        s.pop();
    }
    s
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn parse_and_compare() {
        let a = parse_domain("Mail.Example.COM").unwrap();
        let b = parse_domain("mail.example.com.").unwrap();
        assert!(same_domain(&a, &b));
        assert_eq!("mail.example.com", display(&a));
        assert_eq!("mail.example.com", display(&b));
        assert_eq!(3, a.num_labels());

        assert!(!same_domain(&a, &parse_domain("example.com").unwrap()));
        assert!(!same_domain(&a, &parse_domain("mail.example.org").unwrap()));
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!(parse_domain("").is_none());
        assert!(parse_domain("   ").is_none());
        assert!(parse_domain(".").is_none());
        assert!(parse_domain("*.example.com").is_none());
        assert!(parse_domain("*").is_none());
        assert!(parse_domain("_dmarc.example.com").is_some());
    }

    #[test]
    fn trimming() {
        let name = parse_domain("a.b.example.com").unwrap();
        assert_eq!("example.com", display(&trim_to(&name, 2)));
        assert_eq!("com", display(&trim_to(&name, 1)));
        assert_eq!("a.b.example.com", display(&trim_to(&name, 4)));
    }
}
