// SPDX-License-Identifier: Apache-2.0

//! Every subcommand runs as its own short-lived process, so the store
//! actor is reloaded from `--store` on every invocation and any
//! in-progress session is pulled back into memory with `recover`
//! before the subcommand touches it.

use std::path::PathBuf;

use bdfab::{BdFabric, BdUuid, EditSession, StoreConfig};

use crate::CliError;

pub(crate) const STORE_ARG: &str = "STORE";

pub(crate) fn store_arg() -> clap::Arg {
    clap::Arg::new(STORE_ARG)
        .long("store")
        .global(true)
        .default_value("bdfab-store.json")
        .help("Path to the BD store snapshot")
}

pub(crate) fn open(matches: &clap::ArgMatches) -> BdFabric {
    let path: PathBuf = matches.get_one::<String>(STORE_ARG).expect("has a default_value").into();
    BdFabric::new(StoreConfig { snapshot_path: Some(path) })
}

pub(crate) fn parse_session_id(matches: &clap::ArgMatches, arg: &str) -> Result<BdUuid, CliError> {
    let raw = matches.get_one::<String>(arg).expect("clap required(true) has confirmed so");
    raw.parse::<BdUuid>().map_err(|e| CliError::from(format!("invalid session id {raw}: {e}")))
}

/// Loads a session that may only exist in the persisted store (i.e.
/// was `begin`-ed by an earlier invocation of this binary) into the
/// current process's session-manager actor.
pub(crate) async fn recover(fabric: &mut BdFabric, id: BdUuid) -> Result<EditSession, CliError> {
    Ok(fabric.sessions.recover(id).await?)
}
