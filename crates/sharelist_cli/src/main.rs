//! CLI entry point for inspecting shared lists.
//!
//! # Responsibility
//! - Resolve `CoreConfig` from `SHARELIST_*` variables.
//! - Print the lists a principal owns and the lists shared with them.
//!
//! Usage: `sharelist_cli <email> [--create <title>]`

use sharelist_core::{
    core_version, init_logging, CoreConfig, ListDirectory, ListSummary, Principal,
    SqliteListStore,
};
use std::error::Error;
use std::process::ExitCode;

struct Args {
    principal: Principal,
    create_title: Option<String>,
}

fn parse_args() -> Result<Args, String> {
    let mut args = std::env::args().skip(1);
    let principal = args
        .next()
        .map(Principal::new)
        .ok_or_else(|| "usage: sharelist_cli <email> [--create <title>]".to_string())?;

    let create_title = match args.next().as_deref() {
        None => None,
        Some("--create") => Some(
            args.next()
                .ok_or_else(|| "--create needs a title".to_string())?,
        ),
        Some(other) => return Err(format!("unexpected argument `{other}`")),
    };

    Ok(Args {
        principal,
        create_title,
    })
}

fn print_section(heading: &str, summaries: &[ListSummary]) {
    println!("{heading} ({})", summaries.len());
    for summary in summaries {
        println!(
            "  {}  {}  owner={} pending={}/{}",
            summary.id,
            summary.title,
            summary.owner_id,
            summary.pending_count,
            summary.task_count
        );
    }
}

async fn run(args: Args) -> Result<(), Box<dyn Error>> {
    let config = CoreConfig::from_env();
    if let Some(log_dir) = config.log_dir.as_deref() {
        init_logging(&config.log_level, &log_dir.to_string_lossy())?;
    }

    let store = match config.db_path.as_deref() {
        Some(path) => SqliteListStore::open(path)?,
        None => SqliteListStore::open_in_memory()?,
    };
    log::info!(
        "event=cli_start module=cli status=ok version={} persistent={}",
        core_version(),
        config.db_path.is_some()
    );

    let directory = ListDirectory::new(store);
    if let Some(title) = args.create_title.as_deref() {
        let created = directory.create_list(&args.principal, title).await?;
        println!("created {} {}", created.id, created.title);
    }

    print_section("owned", &directory.owned_lists(&args.principal).await?);
    print_section("shared", &directory.shared_lists(&args.principal).await?);
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let args = match parse_args() {
        Ok(args) => args,
        Err(message) => {
            eprintln!("{message}");
            return ExitCode::from(2);
        }
    };

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}
