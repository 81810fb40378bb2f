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

//! Workspace precondition checks against the process mount table.
//!
//! An existing directory is not enough: the workspace must be the root of a
//! distinct mounted filesystem, otherwise scheduled jobs would silently write
//! into an ephemeral, non-persisted directory.

use crate::error::ProvisionError;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

const MOUNTINFO: &str = "/proc/self/mountinfo";

/// Verifies that `path` exists, is a directory, and is a mount point.
/// Each failure mode gets its own diagnostic.
pub fn check_workspace(path: &Path) -> Result<(), ProvisionError> {
	let metadata = match fs::metadata(path) {
		Ok(metadata) => metadata,
		Err(e) if e.kind() == io::ErrorKind::NotFound => {
			return Err(ProvisionError::WorkspaceMissing(path.to_path_buf()));
		}
		Err(e) => return Err(ProvisionError::io(format!("inspecting {}", path.display()), e)),
	};
	if !metadata.is_dir() {
		return Err(ProvisionError::WorkspaceNotADirectory(path.to_path_buf()));
	}
	if !is_mount_point(path)? {
		return Err(ProvisionError::WorkspaceNotMounted(path.to_path_buf()));
	}
	Ok(())
}

fn is_mount_point(path: &Path) -> Result<bool, ProvisionError> {
	let canonical = fs::canonicalize(path)
		.map_err(|e| ProvisionError::io(format!("resolving {}", path.display()), e))?;
	let mountinfo = fs::read_to_string(MOUNTINFO)
		.map_err(|e| ProvisionError::io(format!("reading {MOUNTINFO}"), e))?;
	let mounted = mount_points(&mountinfo).any(|mount| mount == canonical);
	Ok(mounted)
}

/// Yields the mount-point column of each mountinfo line.
///
/// Per proc(5) the mount point is the fifth whitespace-separated field, with
/// space, tab, newline, and backslash octal-escaped.
fn mount_points(mountinfo: &str) -> impl Iterator<Item = PathBuf> + '_ {
	mountinfo
		.lines()
		.filter_map(|line| line.split(' ').nth(4))
		.map(unescape_mount_path)
}

fn unescape_mount_path(field: &str) -> PathBuf {
	let mut bytes = field.bytes();
	let mut buf = Vec::with_capacity(field.len());
	while let Some(b) = bytes.next() {
		if b == b'\\' {
			let digits: Vec<u8> = (0..3).filter_map(|_| bytes.next()).collect();
			if digits.len() == 3 && digits.iter().all(|d| (b'0'..=b'7').contains(d)) {
				let value = digits.iter().fold(0u8, |acc, d| acc * 8 + (d - b'0'));
				buf.push(value);
				continue;
			}
			buf.push(b'\\');
			buf.extend_from_slice(&digits);
		} else {
			buf.push(b);
		}
	}
	PathBuf::from(String::from_utf8_lossy(&buf).into_owned())
}
