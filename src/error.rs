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

//! Failure taxonomy for the provisioning sequence.
//!
//! Every variant is terminal: the entrypoint prints the diagnostic once and
//! exits with status 1. Invocation errors mean the container was launched
//! wrong; environment-state errors mean the host side is misconfigured.

use std::io;
use std::path::PathBuf;
use std::process::ExitStatus;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProvisionError {
	// Invocation errors.
	#[error("must run as root: remove any user override from the container launch, the entrypoint drops to PUID/PGID itself")]
	NotRoot,
	#[error("required environment variable {0} is not set")]
	MissingVariable(&'static str),
	#[error("{name} must be a non-negative integer, got {value:?}")]
	InvalidVariable { name: &'static str, value: String },
	#[error("{0} must not be 0: scheduled jobs never run as root")]
	RootIdentity(&'static str),

	// Environment-state errors.
	#[error("workspace {} does not exist: bind-mount a host directory there", .0.display())]
	WorkspaceMissing(PathBuf),
	#[error("workspace {} exists but is not a directory", .0.display())]
	WorkspaceNotADirectory(PathBuf),
	#[error("workspace {} is a plain directory, not a mount point: bind-mount a host directory there", .0.display())]
	WorkspaceNotMounted(PathBuf),
	#[error("schedule path {} exists but is not a regular file", .0.display())]
	ScheduleNotAFile(PathBuf),

	// Wrapped lower-level failures, always with a detail naming the operation.
	#[error("{detail}: {source}")]
	Io {
		detail: String,
		#[source]
		source: io::Error,
	},
	#[error("{detail}: {source}")]
	Sys {
		detail: String,
		#[source]
		source: nix::Error,
	},
	#[error("{command} {}", describe_status(.status))]
	UnsuccessfulChild { command: String, status: ExitStatus },
}

impl ProvisionError {
	pub fn io(detail: impl Into<String>, source: io::Error) -> Self {
		Self::Io {
			detail: detail.into(),
			source,
		}
	}

	pub fn sys(detail: impl Into<String>, source: nix::Error) -> Self {
		Self::Sys {
			detail: detail.into(),
			source,
		}
	}
}

fn describe_status(status: &ExitStatus) -> String {
	use std::os::unix::process::ExitStatusExt;
	match status.code() {
		Some(code) => format!("exited unsuccessfully (code {code})"),
		None => match status.signal() {
			Some(signal) => format!("killed by signal {signal}"),
			None => "exited abnormally".to_string(),
		},
	}
}
