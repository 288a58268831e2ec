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

//! Authentication results (RFC 8601) consumed and produced by DMARC
//! evaluation.

use std::borrow::Cow;
use std::fmt::{self, Write as _};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::align::Verdict;
use super::extract::Error;

/// The result keywords shared by SPF (RFC 7208 § 2.6), DKIM and DMARC.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ResultValue {
    None,
    Neutral,
    Pass,
    Fail,
    SoftFail,
    TempError,
    PermError,
}

impl ResultValue {
    pub const ALL: [ResultValue; 7] = [
        ResultValue::None,
        ResultValue::Neutral,
        ResultValue::Pass,
        ResultValue::Fail,
        ResultValue::SoftFail,
        ResultValue::TempError,
        ResultValue::PermError,
    ];

    pub fn keyword(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Neutral => "neutral",
            Self::Pass => "pass",
            Self::Fail => "fail",
            Self::SoftFail => "softfail",
            Self::TempError => "temperror",
            Self::PermError => "permerror",
        }
    }
}

impl fmt::Display for ResultValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("unknown authentication result {0:?}")]
pub struct UnknownResultValue(pub String);

impl FromStr for ResultValue {
    type Err = UnknownResultValue;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|v| v.keyword().eq_ignore_ascii_case(s))
            .ok_or_else(|| UnknownResultValue(s.to_owned()))
    }
}

/// The outcome of an SPF check on one message.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct SpfResult {
    pub value: ResultValue,
    /// The domain of the `MAIL FROM` address. Empty for the null reverse
    /// path.
    #[serde(default)]
    pub from: String,
    /// The `HELO`/`EHLO` identity.
    #[serde(default)]
    pub helo: String,
}

impl SpfResult {
    /// The identity SPF actually authenticated: the `MAIL FROM` domain, or
    /// the `HELO` identity if there was no `MAIL FROM` domain.
    pub fn identity(&self) -> &str {
        if self.from.trim().is_empty() {
            &self.helo
        } else {
            &self.from
        }
    }
}

/// The outcome of verifying one DKIM signature.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct DkimResult {
    pub value: ResultValue,
    /// The signing domain (`d=` tag) of the signature.
    pub domain: String,
}

/// A single result produced by an upstream SPF or DKIM verifier.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(tag = "method", rename_all = "lowercase")]
pub enum AuthResult {
    Spf(SpfResult),
    Dkim(DkimResult),
}

impl AuthResult {
    pub fn value(&self) -> ResultValue {
        match *self {
            Self::Spf(ref r) => r.value,
            Self::Dkim(ref r) => r.value,
        }
    }
}

/// Render a complete `Authentication-Results` header field carrying `verdict`.
///
/// The result is CRLF-terminated and folded onto a continuation line.
pub fn format_authentication_results(
    authserv_id: &str,
    verdict: &Verdict,
) -> String {
    format_field(authserv_id, format_args!("{verdict}"))
}

/// Render a complete `Authentication-Results` header field reporting that
/// DMARC could not be evaluated because the From domain could not be
/// determined.
pub fn format_extraction_failure(authserv_id: &str, error: &Error) -> String {
    format_field(
        authserv_id,
        format_args!(
            "dmarc=permerror ({})",
            make_header_comment_safe(&error.to_string()),
        ),
    )
}

fn format_field(authserv_id: &str, resinfo: fmt::Arguments<'_>) -> String {
    let mut s = String::new();
    let _ = write!(
        s,
        "Authentication-Results: {authserv_id};\r\n\t{resinfo}\r\n",
        authserv_id = if authserv_id.is_empty() {
            Cow::Borrowed("localhost")
        } else {
            make_header_comment_safe(authserv_id)
        },
    );
    s
}

/// Strip anything from `s` which could break out of a header comment or
/// confuse a consumer of the header.
pub fn make_header_comment_safe(s: &str) -> Cow<'_, str> {
    const MAX_LEN: usize = 200;

    fn acceptable_char(c: char) -> bool {
        matches!(
            c, 'A'..='Z' | 'a'..='z' | '0'..='9' | ' '..='\'' | '*'..='/' |
            ':'..='?' | '_' | '@')
    }

    if s.len() <= MAX_LEN && s.chars().all(acceptable_char) {
        Cow::Borrowed(s)
    } else {
        let mut s = s.to_owned();
        s.retain(acceptable_char);
        if s.len() > MAX_LEN {
            // Won't panic since we've already filtered to ASCII
            s.truncate(MAX_LEN);
        }

        Cow::Owned(s)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn result_value_keywords() {
        for value in ResultValue::ALL {
            assert_eq!(Ok(value), value.to_string().parse());
            assert_eq!(Ok(value), value.keyword().to_uppercase().parse());
        }

        assert_eq!("softfail", ResultValue::SoftFail.to_string());
        assert_eq!("temperror", ResultValue::TempError.to_string());
        assert_eq!(
            Err(UnknownResultValue("policy".to_owned())),
            "policy".parse::<ResultValue>(),
        );
    }

    #[test]
    fn spf_identity_falls_back_to_helo() {
        let mut result = SpfResult {
            value: ResultValue::Pass,
            from: "bounces.example.com".to_owned(),
            helo: "mx.example.net".to_owned(),
        };
        assert_eq!("bounces.example.com", result.identity());

        result.from.clear();
        assert_eq!("mx.example.net", result.identity());

        result.from = " ".to_owned();
        assert_eq!("mx.example.net", result.identity());
    }

    #[test]
    fn deserialise_tagged_results() {
        #[derive(Deserialize)]
        struct Results {
            results: Vec<AuthResult>,
        }

        let parsed: Results = toml::from_str(
            r#"
            [[results]]
            method = "spf"
            value = "pass"
            helo = "mx.example.com"

            [[results]]
            method = "dkim"
            value = "temperror"
            domain = "example.com"
            "#,
        )
        .unwrap();

        assert_eq!(
            vec![
                AuthResult::Spf(SpfResult {
                    value: ResultValue::Pass,
                    from: String::new(),
                    helo: "mx.example.com".to_owned(),
                }),
                AuthResult::Dkim(DkimResult {
                    value: ResultValue::TempError,
                    domain: "example.com".to_owned(),
                }),
            ],
            parsed.results,
        );
    }

    #[test]
    fn format_header_fields() {
        let psl = super::super::psl::Psl::default();
        let verdict = super::super::align::evaluate_alignment(
            &psl,
            &crate::support::dns::parse_domain("example.com").unwrap(),
            &super::super::record::Record::default(),
            &[AuthResult::Dkim(DkimResult {
                value: ResultValue::Pass,
                domain: "mail.example.com".to_owned(),
            })],
        );

        assert_eq!(
            "Authentication-Results: mx.example.net;\r\n\
             \tdmarc=pass (spf=none dkim=pass mail.example.com) \
             header.from=example.com\r\n",
            format_authentication_results("mx.example.net", &verdict),
        );
        assert_eq!(
            "Authentication-Results: localhost;\r\n\
             \tdmarc=permerror (message has 2 From headers)\r\n",
            format_extraction_failure("", &Error::AmbiguousSender(2)),
        );
        assert_eq!(
            "Authentication-Results: mx.example.net;\r\n\
             \tdmarc=permerror (message From domain is a public suffix)\r\n",
            format_extraction_failure(
                "mx.example.net\r\n",
                &Error::NoOrganisationalDomain,
            ),
        );
    }

    #[test]
    fn header_comment_sanitisation() {
        assert_eq!("mx.example.com", make_header_comment_safe("mx.example.com"));
        assert_eq!("evil", make_header_comment_safe("e(v)i\r\nl"));
        assert_eq!(200, make_header_comment_safe(&"x".repeat(300)).len());
    }
}
