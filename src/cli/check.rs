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

use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use log::{error, info, warn};
use serde::Deserialize;
use structopt::StructOpt;

use crate::dmarc::{
    align::{evaluate_alignment, Verdict},
    authres::{
        format_authentication_results, format_extraction_failure, AuthResult,
    },
    extract::extract_domains,
    record::Record,
};
use crate::mime::header::HeaderBlock;
use crate::support::{
    dns, error::Error, sysexits::*, system_config::SystemConfig,
};

#[derive(StructOpt)]
pub(super) struct CheckSubcommand {
    /// The message to evaluate, or `-` to read it from standard input.
    ///
    /// Only the header block is examined.
    #[structopt(long, parse(from_os_str))]
    message: PathBuf,

    /// A TOML file holding the SPF and DKIM results for the message.
    ///
    /// Each result is an entry in the `results` array with a `method` of
    /// `spf` or `dkim` and a `value` such as `pass` or `temperror`. SPF
    /// results carry the `from` and `helo` identities; DKIM results carry
    /// the signing `domain`. A `[policy]` table with `spf` and `dkim`
    /// alignment modes overrides the configured defaults.
    #[structopt(long, parse(from_os_str))]
    results: PathBuf,
}

#[derive(Deserialize, Debug, Default)]
struct ResultsFile {
    #[serde(default)]
    policy: Option<Record>,
    #[serde(default)]
    results: Vec<AuthResult>,
}

pub(super) fn check(config: &SystemConfig, root: &Path, cmd: CheckSubcommand) {
    match run(config, root, &cmd) {
        Ok(verdict) => {
            info!(
                "{}: {}",
                cmd.message.display(),
                verdict,
            );
            print!(
                "{}",
                format_authentication_results(&config.authserv_id, &verdict),
            );
        },

        Err(Error::Extract(e)) => {
            warn!("{}: {}", cmd.message.display(), e);
            print!("{}", format_extraction_failure(&config.authserv_id, &e));
            EX_DATAERR.exit()
        },

        Err(e) => {
            error!("{}", e);
            e.sysexit().exit()
        },
    }
}

fn run(
    config: &SystemConfig,
    root: &Path,
    cmd: &CheckSubcommand,
) -> Result<Verdict, Error> {
    let psl = config.load_psl(root)?;
    let message = read_input(&cmd.message)?;
    let results = read_input(&cmd.results)?;
    let results = toml::from_slice::<ResultsFile>(&results).map_err(|e| {
        error!("Invalid results file '{}'", cmd.results.display());
        e
    })?;

    let from_domain = extract_domains(&psl, &HeaderBlock::parse(&message))?;
    let record = results.policy.unwrap_or(config.policy);
    info!(
        "{}: From domain {}, organisational domain {}, aspf={}, adkim={}",
        cmd.message.display(),
        dns::display(&from_domain.domain),
        dns::display(&from_domain.org_domain),
        record.spf,
        record.dkim,
    );

    Ok(evaluate_alignment(
        &psl,
        &from_domain.domain,
        &record,
        &results.results,
    ))
}

fn read_input(path: &Path) -> Result<Vec<u8>, Error> {
    let result = if Path::new("-") == path {
        let mut data = Vec::new();
        io::stdin().read_to_end(&mut data).map(|_| data)
    } else {
        fs::read(path)
    };

    result.map_err(|e| {
        error!("Unable to read '{}': {}", path.display(), e);
        e.into()
    })
}
