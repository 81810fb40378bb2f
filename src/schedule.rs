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

//! Guarantees the schedule file exists and is a regular file.
//!
//! A fresh file is written with the effective uid/gid switched to the runtime
//! identity, so there is never a root-owned intermediate that would need a
//! chown afterwards. An existing regular file is left byte-for-byte alone; the
//! supervisor owns its contents from then on.

use crate::config::{RuntimeIdentity, SCHEDULE_HEADER};
use crate::error::ProvisionError;
use nix::unistd::{setegid, seteuid, Gid, Uid};
use std::fs;
use std::io;
use std::io::Write;
use std::path::Path;

#[derive(Debug, PartialEq, Eq)]
enum ScheduleState {
	Missing,
	Regular,
	/// Exists but is a directory, device node, dangling symlink target, etc.
	NotAFile,
}

pub fn ensure(path: &Path, identity: RuntimeIdentity) -> Result<(), ProvisionError> {
	match schedule_state(path)? {
		ScheduleState::Regular => {
			tracing::info!(path = %path.display(), "schedule file already present");
			Ok(())
		}
		ScheduleState::NotAFile => Err(ProvisionError::ScheduleNotAFile(path.to_path_buf())),
		ScheduleState::Missing => {
			create_as(path, identity)?;
			tracing::info!(path = %path.display(), uid = identity.uid, "created empty schedule file");
			Ok(())
		}
	}
}

fn schedule_state(path: &Path) -> Result<ScheduleState, ProvisionError> {
	// Follows symlinks: a link pointing at a regular file is acceptable.
	match fs::metadata(path) {
		Ok(metadata) if metadata.is_file() => Ok(ScheduleState::Regular),
		Ok(_) => Ok(ScheduleState::NotAFile),
		Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(ScheduleState::Missing),
		Err(e) => Err(ProvisionError::io(format!("inspecting {}", path.display()), e)),
	}
}

/// Writes the header file with effective ids switched to the target identity,
/// restoring root before returning. The real ids stay root throughout, so the
/// restore cannot be refused.
fn create_as(path: &Path, identity: RuntimeIdentity) -> Result<(), ProvisionError> {
	setegid(Gid::from_raw(identity.gid))
		.map_err(|e| ProvisionError::sys(format!("switching effective gid to {}", identity.gid), e))?;
	if let Err(e) = seteuid(Uid::from_raw(identity.uid)) {
		let _ = setegid(Gid::from_raw(0));
		return Err(ProvisionError::sys(format!("switching effective uid to {}", identity.uid), e));
	}

	let written = write_header(path);

	let restored_uid = seteuid(Uid::from_raw(0));
	let restored_gid = setegid(Gid::from_raw(0));

	written.map_err(|e| ProvisionError::io(format!("creating {}", path.display()), e))?;
	restored_uid.map_err(|e| ProvisionError::sys("restoring effective uid", e))?;
	restored_gid.map_err(|e| ProvisionError::sys("restoring effective gid", e))?;
	Ok(())
}

fn write_header(path: &Path) -> io::Result<()> {
	let mut file = fs::OpenOptions::new().write(true).create_new(true).open(path)?;
	writeln!(file, "{SCHEDULE_HEADER}")
}
