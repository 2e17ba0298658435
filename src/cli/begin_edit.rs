// SPDX-License-Identifier: Apache-2.0

use crate::fabric;
use crate::CliError;

pub(crate) struct CommandBeginEdit;

impl CommandBeginEdit {
    pub(crate) const CMD: &str = "begin-edit";

    pub(crate) fn new_cmd() -> clap::Command {
        clap::Command::new(Self::CMD)
            .alias("begin")
            .about("Open an edit session against a bridge domain, locking it")
            .arg(clap::Arg::new("NAME").required(true).index(1).help("Bridge domain primary_name"))
            .arg(clap::Arg::new("USER").long("user").required(true).help("Operator starting the edit"))
    }

    pub(crate) async fn handle(matches: &clap::ArgMatches) -> Result<(), CliError> {
        let name = matches.get_one::<String>("NAME").expect("clap required(true) has confirmed so");
        let user = matches.get_one::<String>("USER").expect("clap required(true) has confirmed so");

        let mut fabric = fabric::open(matches);
        let session = fabric.begin_edit(name, user).await?;
        fabric.sessions.save(session.id).await?;
        println!("session {} opened on {} by {}", session.id, name, user);
        Ok(())
    }
}
