// Copyright 2026 Octave Online LLC
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//    http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Privilege-aware container entrypoint for a cron-style schedule supervisor.
//!
//! Two cooperating pieces run inside one container process tree:
//!
//! - The identity provisioner (this crate, the `dropcron` binary) runs once as
//!   root: it validates the `PUID`/`PGID` runtime identity, checks that the
//!   workspace is a real mount point, converges the system account database on
//!   the requested ids, and guarantees the schedule file exists.
//! - The schedule supervisor (an external binary such as supercronic) then
//!   replaces the entrypoint via exec and runs scheduled jobs as the
//!   provisioned non-root identity for the life of the container.
//!
//! Every precondition failure is terminal: one diagnostic on stderr, exit
//! status 1, operator fixes the configuration and restarts.

pub mod accounts;
pub mod config;
pub mod error;
pub mod handoff;
pub mod mounts;
pub mod schedule;

pub use config::RuntimeIdentity;
pub use error::ProvisionError;
