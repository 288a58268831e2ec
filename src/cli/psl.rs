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
use std::path::{Path, PathBuf};

use log::{error, info};
use structopt::StructOpt;

use crate::dmarc::psl::{organisational_domain, Psl};
use crate::support::{dns, sysexits::*, system_config::SystemConfig};

#[derive(StructOpt)]
pub(super) struct OrgDomainSubcommand {
    /// The domains to look up.
    #[structopt(required = true)]
    domains: Vec<String>,
}

#[derive(StructOpt)]
pub(super) struct CompilePslSubcommand {
    /// The list to compile, in the format of Mozilla's
    /// `public_suffix_list.dat`.
    #[structopt(parse(from_os_str))]
    input: PathBuf,

    /// Where to write the compiled list.
    #[structopt(parse(from_os_str))]
    output: PathBuf,
}

pub(super) fn org_domain(
    config: &SystemConfig,
    root: &Path,
    cmd: OrgDomainSubcommand,
) {
    let psl = match config.load_psl(root) {
        Ok(psl) => psl,
        Err(e) => {
            error!("{}", e);
            EX_CONFIG.exit()
        },
    };

    let mut all_ok = true;
    for domain in &cmd.domains {
        let line = describe_org_domain(&psl, domain).unwrap_or_else(|e| {
            all_ok = false;
            e
        });
        println!("{line}");
    }

    if !all_ok {
        EX_DATAERR.exit();
    }
}

fn describe_org_domain(psl: &Psl, domain: &str) -> Result<String, String> {
    let Some(name) = dns::parse_domain(domain) else {
        return Err(format!("{domain}: not a valid domain name"));
    };

    match organisational_domain(psl, &name) {
        Some(org) => Ok(format!(
            "{}: {}",
            dns::display(&name),
            dns::display(&org),
        )),
        None => Err(format!(
            "{}: is a public suffix and has no organisational domain",
            dns::display(&name),
        )),
    }
}

pub(super) fn compile_psl(cmd: CompilePslSubcommand) {
    let source = match fs::read_to_string(&cmd.input) {
        Ok(source) => source,
        Err(e) => {
            error!("Unable to read '{}': {}", cmd.input.display(), e);
            EX_NOINPUT.exit()
        },
    };

    let psl = Psl::compile(&source);
    if let Err(e) = fs::write(&cmd.output, psl.to_compiled()) {
        error!("Unable to write '{}': {}", cmd.output.display(), e);
        EX_CANTCREAT.exit();
    }

    info!(
        "Compiled '{}' into '{}'",
        cmd.input.display(),
        cmd.output.display(),
    );
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn describe_org_domains() {
        let psl = Psl::compile("uk\nco.uk\n");
        assert_eq!(
            Ok("mail.example.co.uk: example.co.uk".to_owned()),
            describe_org_domain(&psl, "Mail.Example.co.uk"),
        );
        assert_eq!(
            Err("co.uk: is a public suffix and has no organisational domain"
                .to_owned()),
            describe_org_domain(&psl, "co.uk"),
        );
        assert_eq!(
            Err(" : not a valid domain name".to_owned()),
            describe_org_domain(&psl, " "),
        );
    }

    #[test]
    fn compile_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("public_suffix_list.dat");
        let output = dir.path().join("psl.txt");
        fs::write(&input, "// comment\nuk\nco.uk\n").unwrap();

        compile_psl(CompilePslSubcommand {
            input,
            output: output.clone(),
        });

        let psl = Psl::load(&output).unwrap();
        assert_eq!(Psl::compile("uk\nco.uk\n"), psl);
    }
}
