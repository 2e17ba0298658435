// SPDX-License-Identifier: Apache-2.0

mod begin_edit;
mod cancel;
mod deploy;
mod discover;
mod edit;
mod error;
mod fabric;
mod input;
mod list;
mod preview;
mod show;
mod ssh_executor;

pub(crate) use self::error::CliError;
use self::{
    begin_edit::CommandBeginEdit, cancel::CommandCancel, deploy::CommandDeploy, discover::CommandDiscover,
    edit::CommandEdit, list::CommandList, preview::CommandPreview, show::CommandShow,
};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), CliError> {
    let mut cli_cmd = clap::Command::new("bdfabctl")
        .about("Bridge-domain discovery, editing and deployment CLI")
        .arg_required_else_help(true)
        .subcommand_required(true)
        .arg(fabric::store_arg())
        .arg(
            clap::Arg::new("quiet")
                .short('q')
                .action(clap::ArgAction::SetTrue)
                .help("Disable logging")
                .global(true),
        )
        .arg(
            clap::Arg::new("verbose")
                .short('v')
                .action(clap::ArgAction::Count)
                .help("Increase verbose level")
                .global(true),
        )
        .subcommand(CommandDiscover::new_cmd())
        .subcommand(CommandList::new_cmd())
        .subcommand(CommandShow::new_cmd())
        .subcommand(CommandBeginEdit::new_cmd())
        .subcommand(CommandEdit::new_cmd())
        .subcommand(CommandPreview::new_cmd())
        .subcommand(CommandDeploy::new_cmd())
        .subcommand(CommandCancel::new_cmd());

    let matches = cli_cmd.get_matches_mut();

    let log_level = match matches.get_count("verbose") {
        0 => log::LevelFilter::Info,
        1 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };

    if !matches.get_flag("quiet") {
        env_logger::Builder::new().filter(Some("bdfab"), log_level).filter(Some("bdfabctl"), log_level).init();
    }

    log::info!("bdfabctl version: {}", clap::crate_version!());

    if let Err(e) = call_subcommand(&matches).await {
        eprintln!("{e}");
        std::process::exit(1);
    }

    Ok(())
}

async fn call_subcommand(matches: &clap::ArgMatches) -> Result<(), CliError> {
    if let Some(matches) = matches.subcommand_matches(CommandDiscover::CMD) {
        CommandDiscover::handle(matches).await
    } else if let Some(matches) = matches.subcommand_matches(CommandList::CMD) {
        CommandList::handle(matches).await
    } else if let Some(matches) = matches.subcommand_matches(CommandShow::CMD) {
        CommandShow::handle(matches).await
    } else if let Some(matches) = matches.subcommand_matches(CommandBeginEdit::CMD) {
        CommandBeginEdit::handle(matches).await
    } else if let Some(matches) = matches.subcommand_matches(CommandEdit::CMD) {
        CommandEdit::handle(matches).await
    } else if let Some(matches) = matches.subcommand_matches(CommandPreview::CMD) {
        CommandPreview::handle(matches).await
    } else if let Some(matches) = matches.subcommand_matches(CommandDeploy::CMD) {
        CommandDeploy::handle(matches).await
    } else if let Some(matches) = matches.subcommand_matches(CommandCancel::CMD) {
        CommandCancel::handle(matches).await
    } else {
        Err(CliError::from("Unknown command"))
    }
}
