// SPDX-License-Identifier: Apache-2.0

use bdfab::{DeviceFamily, DeviceLeaseTable};

use crate::ssh_executor::SshExecutor;
use crate::{fabric, CliError};

pub(crate) struct CommandDeploy;

impl CommandDeploy {
    pub(crate) const CMD: &str = "deploy";

    pub(crate) fn new_cmd() -> clap::Command {
        clap::Command::new(Self::CMD)
            .about("Run pre-flight checks then commit-check/apply/rollback a session's plan across its devices")
            .arg(clap::Arg::new("SESSION").required(true).index(1).help("Session id"))
            .arg(
                clap::Arg::new("EXECUTE")
                    .long("execute")
                    .action(clap::ArgAction::SetTrue)
                    .help("Actually ssh into each device instead of logging the commands that would run"),
            )
    }

    pub(crate) async fn handle(matches: &clap::ArgMatches) -> Result<(), CliError> {
        let id = fabric::parse_session_id(matches, "SESSION")?;
        let executor = SshExecutor { dry_run: !matches.get_flag("EXECUTE") };

        let mut fabric = fabric::open(matches);
        fabric::recover(&mut fabric, id).await?;
        let leases = DeviceLeaseTable::new();
        let result = fabric.deploy(id, DeviceFamily::Generic, &leases, &executor).await?;

        println!("deployment status: {:?}", result.status);
        for d in &result.device_results {
            println!(
                "  {:<20} commit_check={} applied={} rolled_back={}{}",
                d.device,
                d.commit_check_ok,
                d.applied,
                d.rolled_back,
                d.error.as_ref().map(|e| format!(" error={e}")).unwrap_or_default(),
            );
        }
        Ok(())
    }
}
