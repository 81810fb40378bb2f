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

//! Idempotent reconciliation of the system account database with the
//! requested runtime identity.
//!
//! The algorithm only talks to an [`AccountStore`], so it runs unchanged
//! against the real user/group database or an in-memory fake in tests.

use crate::config::{RuntimeIdentity, ACCOUNT_NAME, LOGIN_SHELL};
use crate::error::ProvisionError;
use nix::unistd::{Gid, Group, Uid, User};
use std::path::{Path, PathBuf};
use std::process::Command;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupRecord {
	pub name: String,
	pub gid: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRecord {
	pub name: String,
	pub uid: u32,
	pub gid: u32,
	pub home: PathBuf,
	pub shell: PathBuf,
}

/// Lookup, create, and update capabilities over the account database.
///
/// Lookups are by numeric ID: the record name is whatever the database
/// already holds, and [`update_user`](Self::update_user) is keyed by that
/// name so an existing account is repaired in place rather than duplicated.
pub trait AccountStore {
	fn group_by_gid(&self, gid: u32) -> Result<Option<GroupRecord>, ProvisionError>;
	fn create_group(&mut self, group: &GroupRecord) -> Result<(), ProvisionError>;
	fn user_by_uid(&self, uid: u32) -> Result<Option<UserRecord>, ProvisionError>;
	fn create_user(&mut self, user: &UserRecord) -> Result<(), ProvisionError>;
	fn update_user(&mut self, user: &UserRecord) -> Result<(), ProvisionError>;
}

/// Converges the account database on the target identity and returns the
/// effective user record.
///
/// A group with the target gid is reused as-is; a user with the target uid is
/// repaired in place (primary group, home, shell). Nothing is ever deleted,
/// so rerunning after a container restart converges instead of accumulating
/// duplicates.
pub fn provision(
	store: &mut dyn AccountStore,
	identity: RuntimeIdentity,
	workspace: &Path,
) -> Result<UserRecord, ProvisionError> {
	let group = match store.group_by_gid(identity.gid)? {
		Some(group) => {
			tracing::info!(gid = identity.gid, name = %group.name, "reusing existing group");
			group
		}
		None => {
			let group = GroupRecord {
				name: ACCOUNT_NAME.to_string(),
				gid: identity.gid,
			};
			store.create_group(&group)?;
			tracing::info!(gid = group.gid, name = %group.name, "created group");
			group
		}
	};

	let user = match store.user_by_uid(identity.uid)? {
		Some(existing) => {
			let target = UserRecord {
				name: existing.name.clone(),
				uid: identity.uid,
				gid: group.gid,
				home: workspace.to_path_buf(),
				shell: PathBuf::from(LOGIN_SHELL),
			};
			if existing == target {
				tracing::info!(uid = target.uid, name = %target.name, "user record already up to date");
			} else {
				store.update_user(&target)?;
				tracing::info!(uid = target.uid, name = %target.name, "updated existing user record");
			}
			target
		}
		None => {
			let user = UserRecord {
				name: ACCOUNT_NAME.to_string(),
				uid: identity.uid,
				gid: group.gid,
				home: workspace.to_path_buf(),
				shell: PathBuf::from(LOGIN_SHELL),
			};
			store.create_user(&user)?;
			tracing::info!(uid = user.uid, name = %user.name, "created user");
			user
		}
	};

	Ok(user)
}

/// The real account database: lookups through the C library, mutations
/// through the standard shadow utilities.
pub struct SystemAccounts;

impl AccountStore for SystemAccounts {
	fn group_by_gid(&self, gid: u32) -> Result<Option<GroupRecord>, ProvisionError> {
		let group = Group::from_gid(Gid::from_raw(gid))
			.map_err(|e| ProvisionError::sys(format!("looking up group {gid}"), e))?;
		Ok(group.map(|g| GroupRecord {
			name: g.name,
			gid: g.gid.as_raw(),
		}))
	}

	fn create_group(&mut self, group: &GroupRecord) -> Result<(), ProvisionError> {
		run(&["groupadd", "-g", &group.gid.to_string(), &group.name])
	}

	fn user_by_uid(&self, uid: u32) -> Result<Option<UserRecord>, ProvisionError> {
		let user = User::from_uid(Uid::from_raw(uid))
			.map_err(|e| ProvisionError::sys(format!("looking up user {uid}"), e))?;
		Ok(user.map(|u| UserRecord {
			name: u.name,
			uid: u.uid.as_raw(),
			gid: u.gid.as_raw(),
			home: u.dir,
			shell: u.shell,
		}))
	}

	fn create_user(&mut self, user: &UserRecord) -> Result<(), ProvisionError> {
		// -M: the workspace is the mounted home, not something to initialize.
		run(&[
			"useradd",
			"-M",
			"-u",
			&user.uid.to_string(),
			"-g",
			&user.gid.to_string(),
			"-d",
			&user.home.display().to_string(),
			"-s",
			&user.shell.display().to_string(),
			&user.name,
		])
	}

	fn update_user(&mut self, user: &UserRecord) -> Result<(), ProvisionError> {
		run(&[
			"usermod",
			"-g",
			&user.gid.to_string(),
			"-d",
			&user.home.display().to_string(),
			"-s",
			&user.shell.display().to_string(),
			&user.name,
		])
	}
}

/// Runs a utility to completion and maps a non-success exit onto an error
/// naming the full command line.
fn run(argv: &[&str]) -> Result<(), ProvisionError> {
	let status = Command::new(argv[0])
		.args(&argv[1..])
		.status()
		.map_err(|e| ProvisionError::io(format!("spawning {}", argv[0]), e))?;
	if status.success() {
		Ok(())
	} else {
		Err(ProvisionError::UnsuccessfulChild {
			command: argv.join(" "),
			status,
		})
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	/// In-memory account database. Counts mutations so tests can assert the
	/// no-op paths really are no-ops.
	#[derive(Default)]
	struct MemoryAccounts {
		groups: Vec<GroupRecord>,
		users: Vec<UserRecord>,
		mutations: usize,
	}

	impl AccountStore for MemoryAccounts {
		fn group_by_gid(&self, gid: u32) -> Result<Option<GroupRecord>, ProvisionError> {
			Ok(self.groups.iter().find(|g| g.gid == gid).cloned())
		}

		fn create_group(&mut self, group: &GroupRecord) -> Result<(), ProvisionError> {
			self.mutations += 1;
			self.groups.push(group.clone());
			Ok(())
		}

		fn user_by_uid(&self, uid: u32) -> Result<Option<UserRecord>, ProvisionError> {
			Ok(self.users.iter().find(|u| u.uid == uid).cloned())
		}

		fn create_user(&mut self, user: &UserRecord) -> Result<(), ProvisionError> {
			self.mutations += 1;
			self.users.push(user.clone());
			Ok(())
		}

		fn update_user(&mut self, user: &UserRecord) -> Result<(), ProvisionError> {
			self.mutations += 1;
			let existing = self
				.users
				.iter_mut()
				.find(|u| u.name == user.name)
				.expect("update_user for unknown name");
			*existing = user.clone();
			Ok(())
		}
	}

	fn identity(uid: u32, gid: u32) -> RuntimeIdentity {
		RuntimeIdentity { uid, gid }
	}

	#[test]
	fn fresh_store_gets_one_group_and_one_user() {
		let mut store = MemoryAccounts::default();
		let user = provision(&mut store, identity(5000, 5000), Path::new("/workspace")).unwrap();
		assert_eq!(store.groups, vec![GroupRecord { name: "dropcron".into(), gid: 5000 }]);
		assert_eq!(store.users.len(), 1);
		assert_eq!(user.name, "dropcron");
		assert_eq!(user.uid, 5000);
		assert_eq!(user.gid, 5000);
		assert_eq!(user.home, Path::new("/workspace"));
		assert_eq!(user.shell, Path::new("/bin/bash"));
	}

	#[test]
	fn provisioning_twice_accumulates_no_duplicates() {
		let mut store = MemoryAccounts::default();
		provision(&mut store, identity(5000, 5001), Path::new("/workspace")).unwrap();
		let mutations_after_first = store.mutations;
		provision(&mut store, identity(5000, 5001), Path::new("/workspace")).unwrap();
		assert_eq!(store.groups.len(), 1);
		assert_eq!(store.users.len(), 1);
		// Second run found everything converged and touched nothing.
		assert_eq!(store.mutations, mutations_after_first);
	}

	#[test]
	fn existing_group_is_reused_under_its_own_name() {
		let mut store = MemoryAccounts::default();
		store.groups.push(GroupRecord { name: "staff".into(), gid: 5000 });
		let user = provision(&mut store, identity(5000, 5000), Path::new("/workspace")).unwrap();
		assert_eq!(store.groups.len(), 1);
		assert_eq!(store.groups[0].name, "staff");
		assert_eq!(user.gid, 5000);
	}

	#[test]
	fn existing_user_is_repaired_in_place() {
		let mut store = MemoryAccounts::default();
		store.groups.push(GroupRecord { name: "dropcron".into(), gid: 5000 });
		store.users.push(UserRecord {
			name: "legacy".into(),
			uid: 5000,
			gid: 4000,
			home: PathBuf::from("/old/home"),
			shell: PathBuf::from("/bin/sh"),
		});
		let user = provision(&mut store, identity(5000, 5000), Path::new("/workspace")).unwrap();
		assert_eq!(store.users.len(), 1);
		// Name is retained; group, home, and shell converge on the target.
		assert_eq!(user.name, "legacy");
		assert_eq!(store.users[0].gid, 5000);
		assert_eq!(store.users[0].home, Path::new("/workspace"));
		assert_eq!(store.users[0].shell, Path::new("/bin/bash"));
	}

	#[test]
	fn changed_home_path_is_updated_on_rerun() {
		let mut store = MemoryAccounts::default();
		provision(&mut store, identity(5000, 5000), Path::new("/old/workspace")).unwrap();
		let user = provision(&mut store, identity(5000, 5000), Path::new("/workspace")).unwrap();
		assert_eq!(user.home, Path::new("/workspace"));
		assert_eq!(store.users[0].home, Path::new("/workspace"));
		assert_eq!(store.users.len(), 1);
	}
}
