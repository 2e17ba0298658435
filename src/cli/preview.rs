// SPDX-License-Identifier: Apache-2.0

use bdfab::DeviceFamily;

use crate::{fabric, CliError};

pub(crate) struct CommandPreview;

impl CommandPreview {
    pub(crate) const CMD: &str = "preview";

    pub(crate) fn new_cmd() -> clap::Command {
        clap::Command::new(Self::CMD)
            .about("Compute the deployment plan for a session without touching any device")
            .arg(clap::Arg::new("SESSION").required(true).index(1).help("Session id"))
    }

    pub(crate) async fn handle(matches: &clap::ArgMatches) -> Result<(), CliError> {
        let id = fabric::parse_session_id(matches, "SESSION")?;

        let mut fabric = fabric::open(matches);
        fabric::recover(&mut fabric, id).await?;
        let plan = fabric.preview(id, DeviceFamily::Generic).await?;
        fabric.sessions.save(id).await?;

        println!("{}", serde_yaml::to_string(&plan)?);
        println!(
            "impact: {} endpoint(s) across {} device(s), downtime={}",
            plan.impact_summary.customer_endpoints_affected,
            plan.impact_summary.devices_touched,
            plan.impact_summary.downtime
        );
        for w in &plan.impact_summary.warnings {
            println!("  warning: {w}");
        }
        Ok(())
    }
}
