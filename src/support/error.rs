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

use std::io;

use thiserror::Error;

use super::sysexits::*;
use crate::dmarc::{extract, psl};

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Toml(#[from] toml::de::Error),
    #[error(transparent)]
    Psl(#[from] psl::Error),
    #[error(transparent)]
    Extract(#[from] extract::Error),
}

impl Error {
    /// The exit status a command-line tool should report for this error.
    pub fn sysexit(&self) -> Sysexit {
        match *self {
            Error::Io(ref e) if io::ErrorKind::NotFound == e.kind() => {
                EX_NOINPUT
            },
            Error::Io(_) => EX_IOERR,
            Error::Toml(_) | Error::Extract(_) => EX_DATAERR,
            Error::Psl(_) => EX_CONFIG,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn sysexits() {
        assert_eq!(
            EX_NOINPUT,
            Error::from(io::Error::from(io::ErrorKind::NotFound)).sysexit(),
        );
        assert_eq!(
            EX_IOERR,
            Error::from(io::Error::from(io::ErrorKind::PermissionDenied))
                .sysexit(),
        );
        assert_eq!(
            EX_DATAERR,
            Error::from(extract::Error::MultipleSenders).sysexit(),
        );
        assert_eq!(EX_CONFIG, Error::from(psl::Error::Corrupt(0)).sysexit());
    }
}
