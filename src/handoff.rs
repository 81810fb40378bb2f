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

//! One-way handoff to the schedule supervisor.
//!
//! The supervisor replaces this process image so it receives container
//! termination signals directly, with no intermediary left resident.

use crate::accounts::UserRecord;
use crate::config::SUPERVISOR_BIN;
use crate::error::ProvisionError;
use std::os::unix::process::CommandExt;
use std::path::{Path, PathBuf};
use std::process::Command;

/// A fully described supervisor invocation. Consuming it with
/// [`exec`](Self::exec) is terminal: on success no code after the call runs.
#[derive(Debug)]
pub struct Handoff {
	program: PathBuf,
	schedule: PathBuf,
	user: UserRecord,
}

impl Handoff {
	pub fn new(user: UserRecord, schedule: &Path) -> Self {
		Self {
			program: PathBuf::from(SUPERVISOR_BIN),
			schedule: schedule.to_path_buf(),
			user,
		}
	}

	/// Replaces the current process with the supervisor, running under the
	/// provisioned identity with its login environment set. Returns only if
	/// the exec itself failed.
	pub fn exec(self) -> ProvisionError {
		let program = self.program.clone();
		let mut command = self.into_command();
		let err = command.exec();
		ProvisionError::io(format!("executing {}", program.display()), err)
	}

	/// The concrete command: `<supervisor> <schedule-file>` as uid/gid of the
	/// provisioned account. Setting the uid also clears supplementary groups,
	/// so the job environment carries exactly the primary group.
	fn into_command(self) -> Command {
		let mut command = Command::new(&self.program);
		command
			.arg(&self.schedule)
			.uid(self.user.uid)
			.gid(self.user.gid)
			.env("HOME", &self.user.home)
			.env("USER", &self.user.name)
			.env("LOGNAME", &self.user.name)
			.env("SHELL", &self.user.shell);
		command
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::ffi::OsStr;

	fn sample_user() -> UserRecord {
		UserRecord {
			name: "dropcron".to_string(),
			uid: 5000,
			gid: 5000,
			home: PathBuf::from("/workspace"),
			shell: PathBuf::from("/bin/bash"),
		}
	}

	#[test]
	fn command_is_supervisor_with_schedule_argument() {
		let handoff = Handoff::new(sample_user(), Path::new("/workspace/crontab"));
		let command = handoff.into_command();
		assert_eq!(command.get_program(), OsStr::new("/usr/local/bin/supercronic"));
		let args: Vec<&OsStr> = command.get_args().collect();
		assert_eq!(args, vec![OsStr::new("/workspace/crontab")]);
	}

	#[test]
	fn command_sets_the_login_environment() {
		let handoff = Handoff::new(sample_user(), Path::new("/workspace/crontab"));
		let command = handoff.into_command();
		let env: Vec<(&OsStr, Option<&OsStr>)> = command.get_envs().collect();
		assert!(env.contains(&(OsStr::new("HOME"), Some(OsStr::new("/workspace")))));
		assert!(env.contains(&(OsStr::new("USER"), Some(OsStr::new("dropcron")))));
		assert!(env.contains(&(OsStr::new("LOGNAME"), Some(OsStr::new("dropcron")))));
		assert!(env.contains(&(OsStr::new("SHELL"), Some(OsStr::new("/bin/bash")))));
	}
}
