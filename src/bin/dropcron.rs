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

use clap::Parser;
use dropcron::accounts::{self, SystemAccounts};
use dropcron::config;
use dropcron::handoff::Handoff;
use dropcron::mounts;
use dropcron::schedule;
use dropcron::{ProvisionError, RuntimeIdentity};
use nix::unistd::Uid;
use std::path::Path;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(version, about = "Provisions a non-root runtime identity, then execs the schedule supervisor")]
struct Cli {
	/// Run every precondition check and provisioning step, then exit 0
	/// instead of exec'ing the supervisor. Still requires root.
	#[arg(long)]
	check: bool,
}

fn main() {
	let args = Cli::parse();
	tracing_subscriber::fmt()
		.with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
		.with_writer(std::io::stderr)
		.init();
	if let Err(err) = run(&args) {
		tracing::error!("{err}");
		std::process::exit(1);
	}
}

/// The provisioning sequence, strictly in order: root check, identity
/// validation, workspace checks, account reconciliation, schedule file,
/// handoff. The first failure aborts the container startup.
fn run(args: &Cli) -> Result<(), ProvisionError> {
	if !Uid::effective().is_root() {
		return Err(ProvisionError::NotRoot);
	}
	let identity = RuntimeIdentity::from_env()?;

	let workspace = Path::new(config::WORKSPACE_DIR);
	mounts::check_workspace(workspace)?;

	let user = accounts::provision(&mut SystemAccounts, identity, workspace)?;

	let schedule_path = Path::new(config::SCHEDULE_FILE);
	schedule::ensure(schedule_path, identity)?;

	if args.check {
		tracing::info!("all preconditions satisfied, exiting without supervisor handoff");
		return Ok(());
	}

	tracing::info!(
		uid = identity.uid,
		gid = identity.gid,
		schedule = %schedule_path.display(),
		"handing off to schedule supervisor"
	);
	// exec only returns on failure; the supervisor otherwise becomes this
	// process and its exit code becomes the container's.
	Err(Handoff::new(user, schedule_path).exec())
}

#[test]
fn test_cli() {
	fn cli(input: &str) -> Result<Cli, String> {
		Cli::try_parse_from(shlex::split(input).unwrap()).map_err(|e| format!("{e}"))
	}
	assert!(!cli("dropcron").unwrap().check);
	assert!(cli("dropcron --check").unwrap().check);
	assert!(cli("dropcron extra").is_err());
	assert!(cli("dropcron --unknown").is_err());
}
