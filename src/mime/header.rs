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

//! Utilities for working with RFC 5322 header blocks and the address syntax
//! found in originator fields.

use std::borrow::Cow;
use std::str;

use lazy_static::lazy_static;
use nom::{
    branch::alt,
    bytes::complete::{is_a, is_not, take, take_while1},
    character::complete::char,
    combinator::{all_consuming, map, opt},
    error::ErrorKind,
    multi::{
        fold_many0, many0, many0_count, many1_count, separated_nonempty_list,
    },
    sequence::{delimited, pair, preceded, terminated, tuple},
    IResult,
};

pub use super::model::*;

lazy_static! {
    /// Matches one complete header field, including any folded continuation
    /// lines. Group 1 is the field name. Group 2 is the raw value, not
    /// including the line ending which terminates it.
    pub static ref FULL_HEADER_LINE: regex::bytes::Regex =
        regex::bytes::Regex::new(
            r"(?m-u)^([!-9;-~]+)[ \t]*:([^\r\n]*(?:\r?\n[ \t][^\r\n]*)*)"
        )
        .unwrap();
    static ref END_OF_HEADER: regex::bytes::Regex =
        regex::bytes::Regex::new(r"(?-u)(?:^|\n)\r?\n").unwrap();
}

/// Anything that can list the raw values of the header fields of a message.
pub trait HeaderSource {
    /// Returns the raw value of every field called `name` (compared
    /// case-insensitively), in the order the fields occur.
    fn field_values(&self, name: &str) -> Vec<&[u8]>;
}

/// The fields of a message's header block, in their original order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct HeaderBlock<'a> {
    fields: Vec<(&'a str, &'a [u8])>,
}

impl<'a> HeaderBlock<'a> {
    /// Parse the header block at the start of `message`.
    ///
    /// The block ends at the first empty line, or the end of `message` if
    /// there is none. Lines which are not syntactically header fields are
    /// skipped. Folded values are returned with their line breaks intact.
    pub fn parse(message: &'a [u8]) -> Self {
        let block = END_OF_HEADER
            .find(message)
            .map_or(message, |m| &message[..m.start()]);

        let fields = FULL_HEADER_LINE
            .captures_iter(block)
            .filter_map(|m| {
                let name = str::from_utf8(m.get(1)?.as_bytes()).ok()?;
                Some((name, m.get(2)?.as_bytes()))
            })
            .collect();

        Self { fields }
    }

    pub fn fields(&self) -> &[(&'a str, &'a [u8])] {
        &self.fields
    }
}

impl HeaderSource for HeaderBlock<'_> {
    fn field_values(&self, name: &str) -> Vec<&[u8]> {
        self.fields
            .iter()
            .filter(|&&(n, _)| n.eq_ignore_ascii_case(name))
            .map(|&(_, v)| v)
            .collect()
    }
}

impl<N: AsRef<str>, V: AsRef<[u8]>> HeaderSource for [(N, V)] {
    fn field_values(&self, name: &str) -> Vec<&[u8]> {
        self.iter()
            .filter(|(n, _)| AsRef::<str>::as_ref(n).eq_ignore_ascii_case(name))
            .map(|(_, v)| AsRef::<[u8]>::as_ref(v))
            .collect()
    }
}

/// Parse the value of an address-list field such as `From`.
///
/// Returns `None` if the value is not a valid address list. The obsolete
/// syntax of RFC 5322 § 4.4 is accepted.
pub fn parse_address_list(i: &[u8]) -> Option<Vec<Address<'_>>> {
    all_consuming(address_list)(i).ok().map(|(_, list)| list)
}

// RFC 5322 3.2.1 "quoted-pair", including the 8-bit clean "obsolete" syntax
fn quoted_pair(i: &[u8]) -> IResult<&[u8], &[u8]> {
    preceded(char('\\'), take(1usize))(i)
}

// RFC 5322 3.2.2 "Folding white space".
// The formal syntax describes the folding syntax itself, but we see values
// before unfolding, so we just treat the line-ending characters as simple
// whitespace.
fn fws(i: &[u8]) -> IResult<&[u8], &[u8]> {
    map(is_a(" \t\r\n"), |_| &b" "[..])(i)
}

// RFC 5322 3.2.2 "Comment text".
fn ctext(i: &[u8]) -> IResult<&[u8], &[u8]> {
    is_not("()\\ \t\r\n")(i)
}

/// The deepest comment nesting accepted. Anything deeper fails the whole
/// parse instead of recursing further.
const MAX_COMMENT_DEPTH: u32 = 64;

// RFC 5322 3.2.2 "Comment content".
// The original definition includes FWS in the comment syntax instead of here,
// which makes it a lot more complicated.
fn ccontent(i: &[u8], depth: u32) -> IResult<&[u8], ()> {
    alt((
        map(ctext, |_| ()),
        map(quoted_pair, |_| ()),
        map(fws, |_| ()),
        |i| nested_comment(i, depth + 1),
    ))(i)
}

// RFC 5322 3.2.2 "Comment".
fn comment(i: &[u8]) -> IResult<&[u8], ()> {
    nested_comment(i, 1)
}

// Comments are recursive, so the depth is tracked to keep hostile input from
// exhausting the stack.
fn nested_comment(i: &[u8], depth: u32) -> IResult<&[u8], ()> {
    if depth > MAX_COMMENT_DEPTH {
        return Err(nom::Err::Failure((i, ErrorKind::TooLarge)));
    }

    map(
        delimited(
            char('('),
            many0_count(|i| ccontent(i, depth)),
            char(')'),
        ),
        |_| (),
    )(i)
}

// RFC 5322 3.2.2 "Comment or folding white space".
fn cfws(i: &[u8]) -> IResult<&[u8], ()> {
    map(many0_count(alt((map(fws, |_| ()), comment))), |_| ())(i)
}

// RFC 5322 3.2.3 "Atom text"
// Amended by RFC 6532 to include all non-ASCII characters
fn atext(i: &[u8]) -> IResult<&[u8], &[u8]> {
    take_while1(|ch| {
        matches!(ch,
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' |
            b'!' | b'#'..=b'\'' | b'*' | b'+' | b'-' | b'/' | b'=' | b'?' |
            b'^' | b'_' | b'`' | b'{'..=b'~' |
            0x80..=0xFF)
    })(i)
}

// RFC 5322 3.2.3 "Atom"
fn atom(i: &[u8]) -> IResult<&[u8], &[u8]> {
    delimited(opt(cfws), atext, opt(cfws))(i)
}

// RFC 5322 3.2.4 "Quoted [string] text"
// Amended by RFC 6532 to include all non-ASCII characters
fn qtext(i: &[u8]) -> IResult<&[u8], &[u8]> {
    is_not(" \t\r\n\\\"")(i)
}

// RFC 5322 3.2.4 "Quoted [string] content"
// As with comments, FWS is moved into the content.
fn qcontent(i: &[u8]) -> IResult<&[u8], &[u8]> {
    alt((qtext, quoted_pair, fws))(i)
}

// RFC 5322 3.2.4 "Quoted string"
fn quoted_string(i: &[u8]) -> IResult<&[u8], Cow<'_, [u8]>> {
    delimited(
        pair(opt(cfws), char('"')),
        fold_many0(
            qcontent,
            Cow::Borrowed(&[] as &[u8]),
            |mut acc: Cow<[u8]>, item| {
                if acc.is_empty() {
                    acc = Cow::Borrowed(item);
                } else {
                    acc.to_mut().extend_from_slice(item);
                }
                acc
            },
        ),
        pair(char('"'), opt(cfws)),
    )(i)
}

// RFC 5322 3.2.5 "word"
fn word(i: &[u8]) -> IResult<&[u8], Cow<'_, [u8]>> {
    alt((map(atom, Cow::Borrowed), quoted_string))(i)
}

// Not formally specified, but part of the `obs-phrase` grammar. Only CFWS at
// the end needs handling since there is always a preceding token that allows
// CFWS.
fn obs_dot(i: &[u8]) -> IResult<&[u8], Cow<'_, [u8]>> {
    terminated(map(char('.'), |_| Cow::Borrowed(&b"."[..])), opt(cfws))(i)
}

// RFC 5322 3.2.5 "phrase", plus "obsolete phrase" syntax which accounts for
// the '.' that many agents put unquoted into display names.
fn phrase(i: &[u8]) -> IResult<&[u8], Vec<Cow<'_, [u8]>>> {
    map(pair(word, many0(alt((word, obs_dot)))), |(head, mut tail)| {
        tail.insert(0, head);
        tail
    })(i)
}

// RFC 5322 3.4.1 local part of address
// Formally, this is `dot-atom / quoted-string / obs-local-part`, with
// `obs-local-part` being `word *("." word)`. Any dot-atom or quoted-string
// conforms to obs-local-part, so we just parse that.
fn local_part(i: &[u8]) -> IResult<&[u8], Vec<Cow<'_, [u8]>>> {
    separated_nonempty_list(char('.'), word)(i)
}

// RFC 5322 4.4 obsolete domain format, which encompasses dot-atom
fn obs_domain(i: &[u8]) -> IResult<&[u8], Vec<Cow<'_, [u8]>>> {
    separated_nonempty_list(char('.'), map(atom, Cow::Borrowed))(i)
}

// RFC 5322 3.4.1 domain name text
// Amended by RFC 6532 to include all non-ASCII
fn dtext(i: &[u8]) -> IResult<&[u8], &[u8]> {
    is_not("[]\\ \t\r\n")(i)
}

fn dcontent(i: &[u8]) -> IResult<&[u8], &[u8]> {
    alt((dtext, quoted_pair, fws))(i)
}

// RFC 5322 3.4.1 domain literal, returned with its brackets
fn domain_literal(i: &[u8]) -> IResult<&[u8], Vec<u8>> {
    map(
        delimited(
            pair(opt(cfws), char('[')),
            fold_many0(dcontent, vec![b'['], |mut acc: Vec<u8>, item| {
                acc.extend_from_slice(item);
                acc
            }),
            pair(char(']'), opt(cfws)),
        ),
        |mut res| {
            res.push(b']');
            res
        },
    )(i)
}

// RFC 5322 3.4.1 domain
fn domain(i: &[u8]) -> IResult<&[u8], Vec<Cow<'_, [u8]>>> {
    alt((obs_domain, map(domain_literal, |v| vec![Cow::Owned(v)])))(i)
}

// RFC 5322 3.4.1 address specification
// The domain is optional here so that a missing domain can be reported as
// such rather than as a syntax error.
fn addr_spec(i: &[u8]) -> IResult<&[u8], AddrSpec<'_>> {
    map(
        pair(
            local_part,
            preceded(char('@'), terminated(opt(domain), opt(cfws))),
        ),
        |(local, domain)| AddrSpec {
            local,
            domain: domain.unwrap_or_default(),
        },
    )(i)
}

// RFC 5322 4.4 obsolete routing information
// We just discard all this
fn obs_route(i: &[u8]) -> IResult<&[u8], ()> {
    map(
        tuple((
            many0_count(alt((
                map(fws, |_| ()),
                comment,
                map(char(','), |_| ()),
            ))),
            char('@'),
            domain,
            many0_count(preceded(
                pair(char(','), opt(cfws)),
                opt(preceded(char('@'), domain)),
            )),
            char(':'),
        )),
        |_| (),
    )(i)
}

// RFC 5322 3.4 angle-delimited address, including the 4.4 obsolete routing
// information.
fn angle_addr(i: &[u8]) -> IResult<&[u8], AddrSpec<'_>> {
    delimited(
        tuple((opt(cfws), char('<'), opt(obs_route))),
        addr_spec,
        pair(char('>'), opt(cfws)),
    )(i)
}

// RFC 5322 3.4 mailbox
fn mailbox(i: &[u8]) -> IResult<&[u8], MailboxSpec<'_>> {
    map(
        alt((
            pair(opt(phrase), angle_addr),
            map(addr_spec, |a| (None, a)),
        )),
        |(name, addr)| MailboxSpec {
            name: name.unwrap_or_default(),
            addr,
        },
    )(i)
}

// Used in obsolete list syntax
fn obs_list_delim(i: &[u8]) -> IResult<&[u8], ()> {
    map(many1_count(tuple((opt(cfws), char(','), opt(cfws)))), |_| ())(i)
}

// RFC 5322 3.4 mailbox list, including 4.4 obsolete syntax
fn mailbox_list(i: &[u8]) -> IResult<&[u8], Vec<MailboxSpec<'_>>> {
    delimited(
        opt(obs_list_delim),
        separated_nonempty_list(obs_list_delim, mailbox),
        opt(obs_list_delim),
    )(i)
}

// RFC 5322 3.4 group
fn group(i: &[u8]) -> IResult<&[u8], GroupSpec<'_>> {
    map(
        pair(
            terminated(phrase, char(':')),
            terminated(
                opt(mailbox_list),
                tuple((opt(cfws), char(';'), opt(cfws))),
            ),
        ),
        |(name, boxes)| GroupSpec {
            name,
            boxes: boxes.unwrap_or_default(),
        },
    )(i)
}

// RFC 5322 3.4 address
fn address(i: &[u8]) -> IResult<&[u8], Address<'_>> {
    alt((map(mailbox, Address::Mailbox), map(group, Address::Group)))(i)
}

// RFC 5322 3.4 address list, including 4.4 obsolete syntax
fn address_list(i: &[u8]) -> IResult<&[u8], Vec<Address<'_>>> {
    delimited(
        opt(obs_list_delim),
        separated_nonempty_list(obs_list_delim, address),
        opt(obs_list_delim),
    )(i)
}

#[cfg(test)]
mod test {
    use super::*;

    fn mailboxes(s: &str) -> Vec<(String, String, String)> {
        parse_address_list(s.as_bytes())
            .unwrap()
            .into_iter()
            .flat_map(Address::into_mailboxes)
            .map(|m| {
                let name = m
                    .name
                    .iter()
                    .map(|p| String::from_utf8_lossy(p).into_owned())
                    .collect::<Vec<_>>()
                    .join(" ");
                (name, m.addr.local_text(), m.addr.domain_text())
            })
            .collect()
    }

    fn mb(name: &str, local: &str, domain: &str) -> (String, String, String) {
        (name.to_owned(), local.to_owned(), domain.to_owned())
    }

    #[test]
    fn parse_simple_addresses() {
        assert_eq!(
            vec![mb("", "test", "example.org")],
            mailboxes("test@example.org"),
        );
        assert_eq!(
            vec![mb("", "test", "example.org")],
            mailboxes(" <test@example.org>"),
        );
        assert_eq!(
            vec![mb("Foo Bar", "foo", "example.com")],
            mailboxes(" Foo Bar <foo@example.com>"),
        );
        assert_eq!(
            vec![mb("J . Random", "jr", "mail.example.com")],
            mailboxes("J. Random <jr@mail.example.com>"),
        );
        assert_eq!(
            vec![mb("", "first.last", "example.com")],
            mailboxes("first.last@example.com (Some comment)"),
        );
        assert_eq!(
            vec![mb("", "quoted local", "example.com")],
            mailboxes("\"quoted local\"@example.com"),
        );
    }

    #[test]
    fn parse_multiple_addresses() {
        assert_eq!(
            vec![
                mb("Smith, John", "js", "example.com"),
                mb("", "other", "example.org"),
            ],
            mailboxes("\"Smith, John\" <js@example.com>, other@example.org"),
        );
        assert_eq!(
            vec![mb("", "a", "b.c"), mb("", "d", "e.f")],
            mailboxes(", a@b.c ,, d@e.f,"),
        );
    }

    #[test]
    fn parse_groups() {
        let list = parse_address_list(b"undisclosed-recipients:;").unwrap();
        assert_eq!(1, list.len());
        let Address::Group(ref group) = list[0] else {
            panic!("not a group: {list:?}");
        };
        assert!(group.boxes.is_empty());

        assert_eq!(
            vec![mb("", "a", "example.com"), mb("B", "b", "example.com")],
            mailboxes("Friends: a@example.com, B <b@example.com>;"),
        );
    }

    #[test]
    fn parse_obsolete_route() {
        assert_eq!(
            vec![mb("", "user", "example.com")],
            mailboxes("<@route.example,@other.example:user@example.com>"),
        );
    }

    #[test]
    fn parse_odd_domains() {
        let list = parse_address_list(b"user@[192.0.2.1]").unwrap();
        let Address::Mailbox(ref mailbox) = list[0] else {
            panic!("not a mailbox: {list:?}");
        };
        assert!(mailbox.addr.is_domain_literal());
        assert_eq!("[192.0.2.1]", mailbox.addr.domain_text());

        assert_eq!(vec![mb("", "test", "")], mailboxes("<test@>"));
        assert_eq!(vec![mb("", "test", "org")], mailboxes("<test@org>"));
    }

    #[test]
    fn reject_invalid_address_lists() {
        assert_eq!(None, parse_address_list(b""));
        assert_eq!(None, parse_address_list(b"   "));
        assert_eq!(None, parse_address_list(b"foo"));
        assert_eq!(None, parse_address_list(b"<foo@example.com"));
        assert_eq!(None, parse_address_list(b"foo@example.com>"));
    }

    #[test]
    fn comment_nesting_is_bounded() {
        let nested = |n: usize| {
            format!("a@example.org {}{}", "(".repeat(n), ")".repeat(n))
        };

        assert_eq!(
            vec![mb("", "a", "example.org")],
            mailboxes(&nested(MAX_COMMENT_DEPTH as usize)),
        );
        assert_eq!(
            None,
            parse_address_list(
                nested(MAX_COMMENT_DEPTH as usize + 1).as_bytes()
            ),
        );
        assert_eq!(None, parse_address_list(nested(100_000).as_bytes()));
    }

    #[test]
    fn parse_header_block() {
        let message = b"Received: from somewhere\r\n\
                        \tby somewhere else\r\n\
                        From: Foo <foo@example.com>\r\n\
                        Subject: hello\r\n\
                        from: second@example.com\r\n\
                        \r\n\
                        From: not@a.header\r\n";
        let block = HeaderBlock::parse(message);

        assert_eq!(4, block.fields().len());
        assert_eq!("Received", block.fields()[0].0);
        assert_eq!(
            &b" from somewhere\r\n\tby somewhere else"[..],
            block.fields()[0].1,
        );
        assert_eq!(
            vec![&b" Foo <foo@example.com>"[..], &b" second@example.com"[..]],
            block.field_values("FROM"),
        );
        assert_eq!(vec![&b" hello"[..]], block.field_values("subject"));
        assert!(block.field_values("To").is_empty());
    }

    #[test]
    fn header_block_without_body() {
        let block = HeaderBlock::parse(b"From: a@b.c\nTo: d@e.f");
        assert_eq!(
            vec![&b" a@b.c"[..]],
            block.field_values("From"),
        );
        assert_eq!(vec![&b" d@e.f"[..]], block.field_values("to"));

        let block = HeaderBlock::parse(b"\r\nFrom: a@b.c\r\n");
        assert!(block.fields().is_empty());
    }

    #[test]
    fn header_pairs_are_header_sources() {
        let headers = [("From", "a@b.c"), ("to", "d@e.f"), ("FROM", "g@h.i")];
        assert_eq!(
            vec![&b"a@b.c"[..], &b"g@h.i"[..]],
            headers[..].field_values("from"),
        );
    }
}
