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

use crate::error::ProvisionError;
use std::env;

/// Environment variable holding the numeric user ID for the runtime identity.
pub const PUID_VAR: &str = "PUID";

/// Environment variable holding the numeric group ID for the runtime identity.
pub const PGID_VAR: &str = "PGID";

/// Directory that must be bind-mounted into the container before startup.
/// Doubles as the home directory of the provisioned account.
pub const WORKSPACE_DIR: &str = "/workspace";

/// The schedule file consumed by the supervisor, fixed under the workspace.
pub const SCHEDULE_FILE: &str = "/workspace/crontab";

/// Header written into a freshly created schedule file.
pub const SCHEDULE_HEADER: &str = "# managed by container";

/// Conventional account name used when a fresh user or group record is created.
pub const ACCOUNT_NAME: &str = "dropcron";

/// Login shell assigned to the provisioned account.
pub const LOGIN_SHELL: &str = "/bin/bash";

/// The schedule supervisor binary, installed by the image build.
pub const SUPERVISOR_BIN: &str = "/usr/local/bin/supercronic";

/// The non-root (uid, gid) pair under which all scheduled jobs execute.
///
/// Read once from `PUID`/`PGID` at startup and never mutated afterwards.
/// There is no default: defaulting to 0 would silently run jobs as root.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuntimeIdentity {
	pub uid: u32,
	pub gid: u32,
}

impl RuntimeIdentity {
	/// Reads `PUID` and `PGID` from the process environment.
	pub fn from_env() -> Result<Self, ProvisionError> {
		Self::parse(read_var(PUID_VAR)?.as_deref(), read_var(PGID_VAR)?.as_deref())
	}

	/// Validates the raw variable values. Split out from [`Self::from_env`] so the
	/// rules are testable without touching the process environment.
	///
	/// # Examples
	///
	/// ```
	/// use dropcron::RuntimeIdentity;
	///
	/// let identity = RuntimeIdentity::parse(Some("5000"), Some("5000")).unwrap();
	/// assert_eq!(identity.uid, 5000);
	/// assert!(RuntimeIdentity::parse(Some("0"), Some("5000")).is_err());
	/// ```
	pub fn parse(puid: Option<&str>, pgid: Option<&str>) -> Result<Self, ProvisionError> {
		let uid = parse_id(PUID_VAR, puid)?;
		let gid = parse_id(PGID_VAR, pgid)?;
		Ok(Self { uid, gid })
	}
}

/// Distinguishes an unset variable from one set to a non-UTF-8 value: the
/// latter is still set, just invalid, and the diagnostic must say so.
fn read_var(name: &'static str) -> Result<Option<String>, ProvisionError> {
	match env::var_os(name) {
		None => Ok(None),
		Some(value) => match value.into_string() {
			Ok(value) => Ok(Some(value)),
			Err(raw) => Err(ProvisionError::InvalidVariable {
				name,
				value: raw.to_string_lossy().into_owned(),
			}),
		},
	}
}

/// Accepts only plain decimal digits: no signs, no whitespace, no symbolic
/// names. Anything else would risk misparse or injection when the value is
/// later passed to the account-management utilities.
fn parse_id(name: &'static str, value: Option<&str>) -> Result<u32, ProvisionError> {
	let value = value.ok_or(ProvisionError::MissingVariable(name))?;
	if value.is_empty() || !value.bytes().all(|b| b.is_ascii_digit()) {
		return Err(ProvisionError::InvalidVariable {
			name,
			value: value.to_string(),
		});
	}
	let id = value.parse::<u32>().map_err(|_| ProvisionError::InvalidVariable {
		name,
		value: value.to_string(),
	})?;
	if id == 0 {
		return Err(ProvisionError::RootIdentity(name));
	}
	Ok(id)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn accepts_distinct_nonzero_ids() {
		let identity = RuntimeIdentity::parse(Some("5000"), Some("5001")).unwrap();
		assert_eq!(identity, RuntimeIdentity { uid: 5000, gid: 5001 });
	}

	#[test]
	fn rejects_missing_values() {
		assert!(matches!(
			RuntimeIdentity::parse(None, Some("5000")),
			Err(ProvisionError::MissingVariable("PUID"))
		));
		assert!(matches!(
			RuntimeIdentity::parse(Some("5000"), None),
			Err(ProvisionError::MissingVariable("PGID"))
		));
	}

	#[test]
	fn rejects_non_numeric_values() {
		for bad in ["", "-1", "+1", " 5000", "5000 ", "root", "0x10", "1_000"] {
			assert!(
				matches!(
					RuntimeIdentity::parse(Some(bad), Some("5000")),
					Err(ProvisionError::InvalidVariable { name: "PUID", .. })
				),
				"expected {bad:?} to be rejected"
			);
		}
	}

	#[test]
	fn rejects_overflowing_values() {
		assert!(matches!(
			RuntimeIdentity::parse(Some("99999999999999999999"), Some("5000")),
			Err(ProvisionError::InvalidVariable { name: "PUID", .. })
		));
	}

	#[test]
	fn non_utf8_variable_is_invalid_not_missing() {
		use std::ffi::OsString;
		use std::os::unix::ffi::OsStringExt;
		let name = "DROPCRON_TEST_NON_UTF8";
		env::set_var(name, OsString::from_vec(vec![b'5', 0xff, 0xfe]));
		let result = read_var(name);
		env::remove_var(name);
		assert!(matches!(
			result,
			Err(ProvisionError::InvalidVariable { name: "DROPCRON_TEST_NON_UTF8", .. })
		));
	}

	#[test]
	fn unset_variable_reads_as_none() {
		assert!(read_var("DROPCRON_TEST_UNSET").unwrap().is_none());
	}

	#[test]
	fn rejects_root_ids() {
		assert!(matches!(
			RuntimeIdentity::parse(Some("0"), Some("5000")),
			Err(ProvisionError::RootIdentity("PUID"))
		));
		assert!(matches!(
			RuntimeIdentity::parse(Some("5000"), Some("0")),
			Err(ProvisionError::RootIdentity("PGID"))
		));
	}

	#[test]
	fn error_messages_name_the_variable() {
		let err = RuntimeIdentity::parse(Some("abc"), Some("5000")).unwrap_err();
		insta::assert_snapshot!(err.to_string(), @r#"PUID must be a non-negative integer, got "abc""#);
		let err = RuntimeIdentity::parse(Some("5000"), Some("0")).unwrap_err();
		insta::assert_snapshot!(err.to_string(), @"PGID must not be 0: scheduled jobs never run as root");
	}
}
