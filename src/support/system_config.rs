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

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::error::Error;
use crate::dmarc::psl::{self, Psl};
use crate::dmarc::record::Record;

/// The name of the configuration file within the configuration directory.
pub const CONFIG_FILE_NAME: &str = "crymap-dmarc.toml";

/// The system-wide configuration for DMARC evaluation.
///
/// This is stored in a file named `crymap-dmarc.toml`, typically under
/// `/usr/local/etc/crymap` or `/etc/crymap`.
#[derive(Clone, Debug, Deserialize, Serialize, Default, PartialEq, Eq)]
pub struct SystemConfig {
    /// The authentication service identifier to put at the start of
    /// generated `Authentication-Results` headers. This is usually the host
    /// name of the MTA.
    ///
    /// If empty, `localhost` is used.
    #[serde(default)]
    pub authserv_id: String,

    /// Where to find the public suffix list.
    #[serde(default)]
    pub psl: PslConfig,

    /// The alignment modes to assume when evaluating a message whose DMARC
    /// record is not otherwise known.
    #[serde(default)]
    pub policy: Record,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct PslConfig {
    /// The path to the public suffix list, either in Mozilla's format or the
    /// compiled format. Relative paths are resolved against the directory
    /// containing the configuration file.
    ///
    /// If unset, no public suffixes are known, and every domain is treated
    /// as though it were under a single-label suffix.
    pub path: Option<PathBuf>,
}

impl SystemConfig {
    /// Load the configuration from `path`.
    ///
    /// A nonexistent file is not an error; it just results in the default
    /// configuration.
    pub fn load(path: &Path) -> Result<Self, Error> {
        match fs::read_to_string(path) {
            Ok(text) => Ok(toml::from_str(&text)?),
            Err(e) if io::ErrorKind::NotFound == e.kind() => {
                Ok(Self::default())
            },
            Err(e) => Err(e.into()),
        }
    }

    /// Load the public suffix list named by this configuration, resolving
    /// relative paths against `root`.
    pub fn load_psl(&self, root: &Path) -> Result<Psl, psl::Error> {
        match self.psl.path {
            None => Ok(Psl::default()),
            Some(ref path) => Psl::load(&root.join(path)),
        }
    }
}
