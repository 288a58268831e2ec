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

//! The "public suffix list" and organisational domain reduction.
//!
//! The source data is the list Mozilla maintains:
//! https://github.com/publicsuffix/list
//!
//! Nothing here touches the network. A `Psl` is loaded once (typically at
//! start-up) and is then an immutable lookup table which can be shared freely
//! between threads.
//!
//! ## Compiled format
//!
//! The compiled form is text to be git-friendly. The start of the data may
//! have lines beginning with `#`, which are skipped.
//!
//! The data is a tree walking down the ASCII domain labels from right to
//! left. Each line is one of the following:
//!
//! - Blank. No more records for this branch of the tree.
//! - A single token: a leaf node which is a plain rule.
//! - A triplet, separated by spaces:
//!   - The label for this level.
//!   - Flags, any combination of: '.' = this node is itself a public suffix;
//!     '*' = every domain one level below this node is a public suffix;
//!     '!' = this node is an exception to a wildcard rule above it, and is
//!     itself an organisational domain. No flags means the node only exists
//!     to hold children.
//!   - Length. A base-10 integer giving the byte length of the child block
//!     which follows, including its terminating blank line. If the current
//!     label does not match the branch's label, skip this many bytes.
//!
//! Siblings are sorted by label so that a lookup can stop as soon as it
//! passes the label it is looking for.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use bitflags::bitflags;
use log::warn;
use thiserror::Error;

use crate::support::dns::{self, Name};

/// The first line of every compiled file written by `Psl::to_compiled`.
pub const COMPILED_SIGNATURE: &str = "# crymap compiled public suffix list v1";

/// The capability of finding the public suffix of a domain.
///
/// Implementations must be pure: the same domain always yields the same
/// answer, and no I/O is performed.
pub trait PublicSuffixes {
    /// Returns the number of rightmost labels of `domain` which make up its
    /// public suffix.
    ///
    /// If no rule matches, the implicit `*` rule applies and the result is 1.
    /// The result may be greater than or equal to the number of labels in
    /// `domain`, which indicates that `domain` is itself a public suffix.
    fn suffix_labels(&self, domain: &Name) -> usize;
}

impl<F: Fn(&Name) -> usize> PublicSuffixes for F {
    fn suffix_labels(&self, domain: &Name) -> usize {
        self(domain)
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to read public suffix list {}: {}", .path.display(), .error)]
    Io {
        path: PathBuf,
        #[source]
        error: io::Error,
    },
    #[error("compiled public suffix list is corrupt near byte {0}")]
    Corrupt(usize),
}

/// A compiled public suffix list.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Psl {
    data: String,
}

impl Default for Psl {
    /// An empty list, under which only the implicit `*` rule applies.
    fn default() -> Self {
        Self {
            data: "\n".to_owned(),
        }
    }
}

impl Psl {
    /// Compile a list in Mozilla's `public_suffix_list.dat` format.
    ///
    /// Rules which cannot be converted to ASCII are logged and skipped.
    pub fn compile(source: &str) -> Self {
        Self {
            data: compile::compile(source),
        }
    }

    /// Load data previously produced by `to_compiled`.
    pub fn from_compiled(mut data: &str) -> Result<Self, Error> {
        while data.starts_with('#') {
            data = data.split_once('\n').map_or("", |s| s.1);
        }

        if check_block(data, 0)? != data.len() {
            return Err(Error::Corrupt(data.len()));
        }

        Ok(Self {
            data: data.to_owned(),
        })
    }

    /// Load a list from `path`, which may be in either Mozilla's format or
    /// the compiled format.
    pub fn load(path: &Path) -> Result<Self, Error> {
        let text = fs::read_to_string(path).map_err(|error| Error::Io {
            path: path.to_owned(),
            error,
        })?;
        if text.starts_with(COMPILED_SIGNATURE) {
            Self::from_compiled(&text)
        } else {
            Ok(Self::compile(&text))
        }
    }

    /// Render this list in the compiled format, including a header noting
    /// where the data came from.
    pub fn to_compiled(&self) -> String {
        format!(
            "{COMPILED_SIGNATURE}\n\
             # This is a compiled representation of the Mozilla Public Suffix\n\
             # List, which can be found here:\n\
             #   https://publicsuffix.org/list/public_suffix_list.dat\n\
             #\n\
             # This Data is subject to the terms of the Mozilla Public\n\
             # License, v. 2.0. If a copy of the MPL was not distributed with \
             this\n\
             # file, You can obtain one at https://mozilla.org/MPL/2.0/.\n\
             #\n\
             # Compiled on {date}.\n\
             {data}",
            date = chrono::Utc::now(),
            data = self.data,
        )
    }
}

impl PublicSuffixes for Psl {
    fn suffix_labels(&self, domain: &Name) -> usize {
        eval(&self.data, domain)
    }
}

/// Returns the "organisational domain" of `domain`: its public suffix plus
/// one more label.
///
/// Returns `None` if `domain` is itself a public suffix, since then there is
/// no label left to take.
pub fn organisational_domain<P: PublicSuffixes + ?Sized>(
    psl: &P,
    domain: &Name,
) -> Option<Name> {
    let labels = usize::from(domain.num_labels());
    let suffix = psl.suffix_labels(domain);
    if suffix >= labels {
        None
    } else {
        Some(dns::trim_to(domain, suffix + 1))
    }
}

bitflags! {
    struct RuleKind: u8 {
        const RULE = 1 << 0;
        const WILDCARD = 1 << 1;
        const EXCEPTION = 1 << 2;
    }
}

impl RuleKind {
    fn from_flags(flags: &str) -> Self {
        let mut kind = RuleKind::empty();
        for ch in flags.chars() {
            match ch {
                '.' => kind |= RuleKind::RULE,
                '*' => kind |= RuleKind::WILDCARD,
                '!' => kind |= RuleKind::EXCEPTION,
                _ => {},
            }
        }
        kind
    }

    fn write_flags(self, s: &mut String) {
        if self.contains(RuleKind::RULE) {
            s.push('.');
        }
        if self.contains(RuleKind::WILDCARD) {
            s.push('*');
        }
        if self.contains(RuleKind::EXCEPTION) {
            s.push('!');
        }
    }
}

mod compile {
    use std::fmt::Write as _;

    use super::*;

    struct Node {
        label: String,
        kind: RuleKind,
        children: Vec<Node>,
    }

    pub(super) fn compile(psl: &str) -> String {
        let tree = build_tree(psl);
        let mut data = String::new();
        for node in &tree {
            to_text(&mut data, node);
        }
        data.push('\n');
        data
    }

    fn build_tree(psl: &str) -> Vec<Node> {
        let mut nodes = Vec::<Node>::new();

        for line in psl.lines() {
            // Only the first token is significant; anything after whitespace
            // is a comment.
            let Some(line) = line.split_whitespace().next() else {
                continue;
            };
            if line.starts_with("//") {
                continue;
            }

            let (unicode_name, kind) = if let Some(rest) = line.strip_prefix('!')
            {
                (rest, RuleKind::EXCEPTION)
            } else if let Some(rest) = line.strip_prefix("*.") {
                (rest, RuleKind::WILDCARD)
            } else {
                (line, RuleKind::RULE)
            };

            let domain = match Name::from_utf8(unicode_name) {
                Ok(name) => dns::display(&name).to_ascii_lowercase(),
                Err(e) => {
                    warn!("Skipping unusable public suffix rule {line:?}: {e}");
                    continue;
                },
            };

            let mut search = &mut nodes;
            let num_labels = domain.split('.').count();
            for (i, label) in domain.rsplit('.').enumerate() {
                let node_kind = if i + 1 < num_labels {
                    RuleKind::empty()
                } else {
                    kind
                };

                let ix = match search.iter().position(|n| n.label == label) {
                    Some(ix) => {
                        search[ix].kind |= node_kind;
                        ix
                    },
                    None => {
                        search.push(Node {
                            label: label.to_owned(),
                            kind: node_kind,
                            children: Vec::new(),
                        });
                        search.len() - 1
                    },
                };

                search = &mut search[ix].children;
            }
        }

        sort_nodes(&mut nodes);
        nodes
    }

    fn sort_nodes(nodes: &mut [Node]) {
        nodes.sort_unstable_by(|a, b| a.label.cmp(&b.label));
        for node in nodes {
            sort_nodes(&mut node.children);
        }
    }

    fn to_text(s: &mut String, node: &Node) {
        s.push_str(&node.label);
        if node.children.is_empty() && RuleKind::RULE == node.kind {
            s.push('\n');
            return;
        }

        let mut children = String::new();
        for child in &node.children {
            to_text(&mut children, child);
        }
        children.push('\n');

        s.push(' ');
        node.kind.write_flags(s);
        let _ = writeln!(s, " {}", children.len());
        s.push_str(&children);
    }
}

/// Verify the structure of the block starting at `pos`, returning the
/// position just after its terminating blank line.
fn check_block(data: &str, mut pos: usize) -> Result<usize, Error> {
    loop {
        let Some((line, _)) = data[pos..].split_once('\n') else {
            return Err(Error::Corrupt(pos));
        };
        let line_end = pos + line.len() + 1;

        if line.is_empty() {
            return Ok(line_end);
        }

        let Some((_, info)) = line.split_once(' ') else {
            pos = line_end;
            continue;
        };

        let (flags, len) = info.split_once(' ').ok_or(Error::Corrupt(pos))?;
        if !flags.chars().all(|c| matches!(c, '.' | '*' | '!')) {
            return Err(Error::Corrupt(pos));
        }

        let end = len
            .parse::<usize>()
            .ok()
            .and_then(|len| line_end.checked_add(len))
            .filter(|&end| end <= data.len() && data.is_char_boundary(end))
            .ok_or(Error::Corrupt(pos))?;
        if check_block(data, line_end)? != end {
            return Err(Error::Corrupt(pos));
        }

        pos = end;
    }
}

fn eval(mut psl_data: &str, domain: &Name) -> usize {
    let domain_str = dns::display(domain).to_ascii_lowercase();
    let num_labels = usize::from(domain.num_labels());

    let mut suffix = None::<usize>;
    for (i, label) in domain_str.rsplit('.').enumerate() {
        let found_match = loop {
            let Some((line, rest)) = psl_data.split_once('\n') else {
                break None;
            };
            psl_data = rest;

            if line.is_empty() {
                break None;
            }

            let (branch_label, info) =
                line.split_once(' ').unwrap_or((line, ""));

            if branch_label > label {
                break None;
            }

            if branch_label < label {
                if let Some((_, len_str)) = info.split_once(' ') {
                    let len = len_str.parse::<usize>().unwrap_or(usize::MAX);
                    psl_data = psl_data.get(len..).unwrap_or("");
                }
                continue;
            }

            break Some(info);
        };

        // If we couldn't find a matching line, there's nothing left to search.
        let Some(info) = found_match else {
            break;
        };

        let kind = if info.is_empty() {
            RuleKind::RULE
        } else {
            RuleKind::from_flags(info.split_once(' ').map_or("", |s| s.0))
        };

        if kind.contains(RuleKind::EXCEPTION) {
            suffix = Some(i);
        } else if kind.contains(RuleKind::WILDCARD) && i + 2 <= num_labels {
            suffix = Some(i + 2);
        } else if kind.contains(RuleKind::RULE) {
            suffix = Some(i + 1);
        }

        // Leaf nodes have no children to search.
        if info.is_empty() {
            break;
        }
    }

    suffix.unwrap_or(1)
}

#[cfg(test)]
mod test {
    use super::*;

    fn dn(s: &str) -> Name {
        dns::parse_domain(s).unwrap()
    }

    fn org(psl: &Psl, s: &str) -> Option<String> {
        organisational_domain(psl, &dn(s)).map(|n| dns::display(&n))
    }

    fn example_psl() -> Psl {
        Psl::compile(
            "// ===BEGIN ICANN DOMAINS===\n\
             com\n\
             *.foo.com\n\
             \n\
             // jp\n\
             *.jp\n\
             *.hokkaido.jp\n\
             *.tokyo.jp\n\
             !pref.hokkaido.jp\n\
             !metro.tokyo.jp\n\
             kyoto.jp\n\
             京都.jp\n\
             uk\n\
             co.uk\n\
             org\n",
        )
    }

    #[test]
    fn psl_examples() {
        let psl = example_psl();
        println!("{}", psl.data);

        assert_eq!(Some("bar.com".to_owned()), org(&psl, "bar.com"));
        assert_eq!(Some("bar.com".to_owned()), org(&psl, "mail.bar.com"));
        assert_eq!(Some("foo.com".to_owned()), org(&psl, "foo.com"));
        assert_eq!(None, org(&psl, "bar.foo.com"));
        assert_eq!(
            Some("example.bar.foo.com".to_owned()),
            org(&psl, "example.bar.foo.com"),
        );
        assert_eq!(
            Some("foo.bar.hokkaido.jp".to_owned()),
            org(&psl, "foo.bar.hokkaido.jp"),
        );
        assert_eq!(
            Some("foo.bar.hokkaido.jp".to_owned()),
            org(&psl, "mail.foo.bar.hokkaido.jp"),
        );
        assert_eq!(None, org(&psl, "hokkaido.jp"));
        assert_eq!(
            Some("pref.hokkaido.jp".to_owned()),
            org(&psl, "pref.hokkaido.jp"),
        );
        assert_eq!(
            Some("pref.hokkaido.jp".to_owned()),
            org(&psl, "mail.pref.hokkaido.jp"),
        );

        assert_eq!(Some("foo.xyz".to_owned()), org(&psl, "foo.xyz"));
        assert_eq!(Some("foo.xyz".to_owned()), org(&psl, "mail.foo.xyz"));
        assert_eq!(None, org(&psl, "xyz"));
        assert_eq!(None, org(&psl, "org"));
        assert_eq!(None, org(&psl, "co.uk"));
    }

    #[test]
    fn test_organisational_domain() {
        let psl = example_psl();
        assert_eq!(None, org(&psl, "BAR.FOO.com"));
        assert_eq!(
            Some("x.bar.foo.com".to_owned()),
            org(&psl, "Mail.X.BAR.FOO.com"),
        );
        assert_eq!(Some("foo.co.uk".to_owned()), org(&psl, "foo.co.uk"));
        assert_eq!(Some("foo.co.uk".to_owned()), org(&psl, "mail.foo.co.uk"));
        assert_eq!(Some("z.zzz".to_owned()), org(&psl, "z.z.zzz"));
        assert_eq!(
            Some("example.org".to_owned()),
            org(&psl, "foo.example.org"),
        );
        assert_eq!(
            Some("foo.kyoto.jp".to_owned()),
            org(&psl, "mail.foo.kyoto.jp"),
        );
        assert_eq!(
            dns::canonicalise(Name::from_utf8("foo.京都.jp").unwrap()),
            organisational_domain(
                &psl,
                &dns::canonicalise(
                    Name::from_utf8("mail.foo.京都.jp").unwrap()
                ),
            )
            .unwrap(),
        );
    }

    #[test]
    fn rule_and_wildcard_on_same_node() {
        let psl = Psl::compile("ck\n*.ck\n!www.ck\n");
        assert_eq!(None, org(&psl, "ck"));
        assert_eq!(None, org(&psl, "foo.ck"));
        assert_eq!(Some("bar.foo.ck".to_owned()), org(&psl, "bar.foo.ck"));
        assert_eq!(Some("www.ck".to_owned()), org(&psl, "www.ck"));
        assert_eq!(Some("www.ck".to_owned()), org(&psl, "mail.www.ck"));
    }

    #[test]
    fn empty_list_applies_implicit_rule() {
        let psl = Psl::default();
        assert_eq!(1, psl.suffix_labels(&dn("a.b.c")));
        assert_eq!(Some("b.c".to_owned()), org(&psl, "a.b.c"));
        assert_eq!(None, org(&psl, "c"));
    }

    #[test]
    fn closures_are_suffix_lists() {
        let two = |_: &Name| 2usize;
        assert_eq!(
            Some("a.b.c".to_owned()),
            organisational_domain(&two, &dn("x.a.b.c")).map(|n| dns::display(&n)),
        );
        assert_eq!(None, organisational_domain(&two, &dn("b.c")));
    }

    #[test]
    fn compiled_round_trip() {
        let psl = example_psl();
        let compiled = psl.to_compiled();
        assert!(compiled.starts_with(COMPILED_SIGNATURE));
        assert_eq!(psl, Psl::from_compiled(&compiled).unwrap());
    }

    #[test]
    fn corrupt_compiled_data_rejected() {
        assert_matches!(Err(Error::Corrupt(_)), Psl::from_compiled("com . 99\n"));
        assert_matches!(Err(Error::Corrupt(_)), Psl::from_compiled("com"));
        assert_matches!(
            Err(Error::Corrupt(_)),
            Psl::from_compiled("com ? 1\n\n\n"),
        );
        assert_matches!(Ok(_), Psl::from_compiled("com . 1\n\n\n"));
    }

    #[test]
    fn load_either_format() {
        let dir = tempfile::tempdir().unwrap();

        let source_path = dir.path().join("public_suffix_list.dat");
        fs::write(&source_path, "// comment\norg\n*.example.org\n").unwrap();
        let from_source = Psl::load(&source_path).unwrap();
        assert_eq!(None, org(&from_source, "foo.example.org"));

        let compiled_path = dir.path().join("psl.txt");
        fs::write(&compiled_path, from_source.to_compiled()).unwrap();
        assert_eq!(from_source, Psl::load(&compiled_path).unwrap());

        assert_matches!(
            Err(Error::Io { .. }),
            Psl::load(&dir.path().join("nonexistent")),
        );
    }
}
