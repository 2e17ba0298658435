// SPDX-License-Identifier: Apache-2.0

use bdfab::Change;

use crate::input::yaml_from_file;
use crate::{fabric, CliError};

pub(crate) struct CommandEdit;

impl CommandEdit {
    pub(crate) const CMD: &str = "edit";

    pub(crate) fn new_cmd() -> clap::Command {
        clap::Command::new(Self::CMD)
            .about("Apply one change to an open edit session's working copy")
            .arg(clap::Arg::new("SESSION").required(true).index(1).help("Session id"))
            .arg(
                clap::Arg::new("CHANGE_FILE")
                    .required(true)
                    .index(2)
                    .help("YAML-encoded Change, or `-` for stdin"),
            )
    }

    pub(crate) async fn handle(matches: &clap::ArgMatches) -> Result<(), CliError> {
        let id = fabric::parse_session_id(matches, "SESSION")?;
        let change_file = matches.get_one::<String>("CHANGE_FILE").expect("clap required(true) has confirmed so");
        let change: Change = yaml_from_file(change_file)?;

        let mut fabric = fabric::open(matches);
        fabric::recover(&mut fabric, id).await?;
        let result = fabric.apply_change(id, change).await?;
        fabric.sessions.save(id).await?;

        if result.accepted {
            println!("accepted");
        } else {
            println!("rejected: {}", result.message.unwrap_or_default());
        }
        Ok(())
    }
}
