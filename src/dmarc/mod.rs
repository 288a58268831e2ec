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

//! DMARC (RFC 7489) policy evaluation.
//!
//! This covers the two decisions at the core of DMARC: which domain a message
//! claims to be from (`extract`), and whether the SPF and DKIM results for
//! the message are aligned with that domain (`align`). Fetching DMARC
//! records and acting on the verdict are the business of the caller.

pub mod align;
pub mod authres;
pub mod extract;
pub mod psl;
pub mod record;

pub use align::{evaluate_alignment, MechanismStatus, MechanismVerdict, Verdict};
pub use authres::{AuthResult, DkimResult, ResultValue, SpfResult};
pub use extract::{extract_domains, FromDomain};
pub use psl::{organisational_domain, Psl, PublicSuffixes};
pub use record::{AlignmentMode, Record};
