// SPDX-License-Identifier: Apache-2.0

use crate::fabric;
use crate::CliError;

pub(crate) struct CommandShow;

impl CommandShow {
    pub(crate) const CMD: &str = "show";

    pub(crate) fn new_cmd() -> clap::Command {
        clap::Command::new(Self::CMD)
            .alias("s")
            .about("Show one bridge domain as stored")
            .arg(clap::Arg::new("NAME").required(true).index(1).help("Bridge domain primary_name"))
    }

    pub(crate) async fn handle(matches: &clap::ArgMatches) -> Result<(), CliError> {
        let name = matches.get_one::<String>("NAME").expect("clap required(true) has confirmed so");
        let mut fabric = fabric::open(matches);
        match fabric.get_bd(name).await? {
            Some(bd) => println!("{}", serde_yaml::to_string(&bd)?),
            None => return Err(CliError::from(format!("no such bridge domain: {name}"))),
        }
        Ok(())
    }
}
