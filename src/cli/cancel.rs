// SPDX-License-Identifier: Apache-2.0

use crate::{fabric, CliError};

pub(crate) struct CommandCancel;

impl CommandCancel {
    pub(crate) const CMD: &str = "cancel";

    pub(crate) fn new_cmd() -> clap::Command {
        clap::Command::new(Self::CMD)
            .about("Discard an edit session's working copy and release its lock")
            .arg(clap::Arg::new("SESSION").required(true).index(1).help("Session id"))
    }

    pub(crate) async fn handle(matches: &clap::ArgMatches) -> Result<(), CliError> {
        let id = fabric::parse_session_id(matches, "SESSION")?;

        let mut fabric = fabric::open(matches);
        fabric::recover(&mut fabric, id).await?;
        fabric.cancel_edit(id).await?;

        println!("session {id} cancelled");
        Ok(())
    }
}
