// SPDX-License-Identifier: Apache-2.0

use bdfab::{AssignmentState, DnaasType, ListFilter};

use crate::fabric;
use crate::CliError;

pub(crate) struct CommandList;

impl CommandList {
    pub(crate) const CMD: &str = "list";

    pub(crate) fn new_cmd() -> clap::Command {
        clap::Command::new(Self::CMD)
            .alias("ls")
            .about("List bridge domains in the store")
            .arg(clap::Arg::new("USER").long("user").help("Filter by owning username"))
            .arg(clap::Arg::new("VLAN").long("vlan").value_parser(clap::value_parser!(u16)).help("Filter by global VLAN identifier"))
            .arg(clap::Arg::new("TYPE").long("type").help("Filter by DNAAS type, e.g. 4a, 2b, 5"))
    }

    pub(crate) async fn handle(matches: &clap::ArgMatches) -> Result<(), CliError> {
        let dnaas_type = match matches.get_one::<String>("TYPE") {
            Some(t) => Some(parse_dnaas_type(t)?),
            None => None,
        };
        let filter = ListFilter {
            user: matches.get_one::<String>("USER").cloned(),
            vlan: matches.get_one::<u16>("VLAN").copied(),
            dnaas_type,
            assignment_state: None::<AssignmentState>,
        };

        let mut fabric = fabric::open(matches);
        let bds = fabric.list_bds(filter).await?;
        for bd in &bds {
            println!(
                "{:<24} {:<16} vlan={:<6} devices={:<3} state={:?}",
                bd.primary_name,
                bd.dnaas_type.service_type_name(),
                bd.global_identifier.map(|v| v.to_string()).unwrap_or_else(|| "-".to_string()),
                bd.devices.len(),
                bd.assignment_state,
            );
        }
        Ok(())
    }
}

fn parse_dnaas_type(raw: &str) -> Result<DnaasType, CliError> {
    match raw.to_ascii_lowercase().as_str() {
        "1" => Ok(DnaasType::Type1),
        "2a" => Ok(DnaasType::Type2A),
        "2b" => Ok(DnaasType::Type2B),
        "3" => Ok(DnaasType::Type3),
        "4a" => Ok(DnaasType::Type4A),
        "4b" => Ok(DnaasType::Type4B),
        "5" => Ok(DnaasType::Type5),
        other => Err(CliError::from(format!("unknown DNAAS type `{other}`"))),
    }
}
