// SPDX-License-Identifier: Apache-2.0

use bdfab::DeviceClassOverrides;

use crate::fabric;
use crate::CliError;

pub(crate) struct CommandDiscover;

impl CommandDiscover {
    pub(crate) const CMD: &str = "discover";

    pub(crate) fn new_cmd() -> clap::Command {
        clap::Command::new(Self::CMD)
            .alias("d")
            .about("Run discovery over a directory of per-device CLI dumps and store the result")
            .arg(
                clap::Arg::new("DUMP_DIR")
                    .required(true)
                    .index(1)
                    .help("Directory of <device>_bd_<ts>.txt / <device>_vlan_<ts>.txt files"),
            )
            .arg(
                clap::Arg::new("LLDP_DUMP")
                    .long("lldp-dump")
                    .help("Path to an LLDP neighbor dump; omit to assign no topology roles"),
            )
    }

    pub(crate) async fn handle(matches: &clap::ArgMatches) -> Result<(), CliError> {
        let dump_dir = matches.get_one::<String>("DUMP_DIR").expect("clap required(true) has confirmed so");
        let lldp_dump = match matches.get_one::<String>("LLDP_DUMP") {
            Some(path) => std::fs::read_to_string(path)?,
            None => String::new(),
        };

        let mut fabric = fabric::open(matches);
        let report = fabric
            .discover_and_store(std::path::Path::new(dump_dir), &DeviceClassOverrides::new(), &lldp_dump)
            .await?;

        println!(
            "discovered {} consolidated, {} individual bridge domain(s), {} diagnostic(s)",
            report.consolidated.len(),
            report.individuals.len(),
            report.diagnostics.len()
        );
        for d in &report.diagnostics {
            println!("  {d}");
        }
        Ok(())
    }
}
