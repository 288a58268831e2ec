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

use std::path::{Path, PathBuf};

use log::LevelFilter;
use structopt::StructOpt;

use crate::support::sysexits::*;
use crate::support::system_config::{SystemConfig, CONFIG_FILE_NAME};

#[derive(StructOpt)]
#[structopt(max_term_width = 80)]
struct Options {
    /// The path to `crymap-dmarc.toml`
    /// [default: /etc/crymap/crymap-dmarc.toml or
    /// /usr/local/etc/crymap/crymap-dmarc.toml]
    ///
    /// `logging.toml` is looked for in the same directory.
    #[structopt(long, parse(from_os_str))]
    config: Option<PathBuf>,

    /// Log debugging information, including every alignment decision, to
    /// standard error. `logging.toml` is ignored.
    #[structopt(short, long)]
    verbose: bool,

    #[structopt(subcommand)]
    command: Command,
}

#[derive(StructOpt)]
enum Command {
    /// Evaluate DMARC for a single message.
    ///
    /// The From domain is taken from the header of the message. The SPF and
    /// DKIM results, and optionally the alignment modes of the DMARC record,
    /// are read from a TOML file. The resulting `Authentication-Results`
    /// header is written to standard output.
    ///
    /// If the From domain cannot be determined, a `dmarc=permerror` result
    /// is written and the exit status is EX_DATAERR.
    Check(super::check::CheckSubcommand),
    /// Print the organisational domain of each domain given.
    OrgDomain(super::psl::OrgDomainSubcommand),
    /// Compile a public suffix list into Crymap's compact format.
    CompilePsl(super::psl::CompilePslSubcommand),
}

pub fn main() {
    // Clap exits with status 1 instead of EX_USAGE if we use the more concise
    // API
    let options = Options::from_clap(&match Options::clap().get_matches_safe()
    {
        Ok(matches) => matches,
        Err(
            e @ clap::Error {
                kind: clap::ErrorKind::HelpDisplayed,
                ..
            },
        )
        | Err(
            e @ clap::Error {
                kind: clap::ErrorKind::VersionDisplayed,
                ..
            },
        ) => {
            println!("{}", e.message);
            return;
        },
        Err(e) => {
            eprintln!("{}", e.message);
            EX_USAGE.exit()
        },
    });

    let config_path = options.config.unwrap_or_else(default_config_path);
    let root = config_path
        .parent()
        .map(Path::to_owned)
        .unwrap_or_default();

    init_logging(&root, options.verbose);

    let config = match SystemConfig::load(&config_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!(
                "Error in config file at '{}': {}",
                config_path.display(),
                e
            );
            EX_CONFIG.exit()
        },
    };

    match options.command {
        Command::Check(cmd) => super::check::check(&config, &root, cmd),
        Command::OrgDomain(cmd) => {
            super::psl::org_domain(&config, &root, cmd)
        },
        Command::CompilePsl(cmd) => super::psl::compile_psl(cmd),
    }
}

fn default_config_path() -> PathBuf {
    ["/etc/crymap", "/usr/local/etc/crymap"]
        .iter()
        .map(|dir| Path::new(dir).join(CONFIG_FILE_NAME))
        .find(|path| path.is_file())
        .unwrap_or_else(|| PathBuf::from(CONFIG_FILE_NAME))
}

fn init_logging(root: &Path, verbose: bool) {
    let log_config_file = root.join("logging.toml");
    if !verbose && log_config_file.is_file() {
        if let Err(e) = log4rs::init_file(
            &log_config_file,
            log4rs::config::Deserializers::new(),
        ) {
            eprintln!(
                "Failed to initialise logging from '{}': {}",
                log_config_file.display(),
                e
            );
            EX_CONFIG.exit()
        }
    } else {
        init_simple_log(if verbose {
            LevelFilter::Debug
        } else {
            LevelFilter::Info
        });
    }
}

/// Log to standard error at `level`.
///
/// Standard output is reserved for the results of commands.
fn init_simple_log(level: LevelFilter) {
    use log4rs::append::console::{ConsoleAppender, Target};
    use log4rs::config::{Appender, Config, Root};
    use log4rs::encode::pattern::PatternEncoder;

    let stderr = ConsoleAppender::builder()
        .target(Target::Stderr)
        .encoder(Box::new(PatternEncoder::new(
            "{d(%H:%M:%S%.3f)} [{l}][{t}] {m}{n}",
        )))
        .build();

    let config = Config::builder()
        .appender(Appender::builder().build("stderr", Box::new(stderr)))
        .build(Root::builder().appender("stderr").build(level));

    match config {
        Ok(config) => {
            // Only fails if a logger is already installed, in which case
            // that one is used.
            let _ = log4rs::init_config(config);
        },
        Err(e) => {
            eprintln!("Failed to initialise logging: {}", e);
            EX_SOFTWARE.exit()
        },
    }
}
