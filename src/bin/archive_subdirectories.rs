use anyhow::Context;
use clap::Parser;
use exeggutor::core::archive::{archive_subdirectories, ArchiveOptions};
use exeggutor::utils::logger;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "archive-subdirectories")]
#[command(about = "Zip every subdirectory of a directory into <name>.zip")]
struct Args {
    /// Directory whose subdirectories are archived
    parent: PathBuf,

    /// Where archives are written (defaults to the parent directory)
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Only archive these subdirectories (repeatable)
    #[arg(short, long = "subdirectory")]
    subdirectories: Vec<String>,

    /// Delete each subdirectory once its archive is complete
    #[arg(long)]
    remove_original: bool,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    logger::init_cli_logger_with_targets(args.verbose, &[env!("CARGO_CRATE_NAME")]);

    let options = ArchiveOptions {
        output_dir: args.output_dir.clone(),
        subdirectories: (!args.subdirectories.is_empty()).then(|| args.subdirectories.clone()),
        remove_original: args.remove_original,
    };

    tracing::info!("📦 Archiving subdirectories of {}", args.parent.display());
    let archives = archive_subdirectories(&args.parent, &options)
        .with_context(|| format!("failed to archive {}", args.parent.display()))?;

    for archive in &archives {
        println!("{}", archive.display());
    }
    tracing::info!("✅ Wrote {} archives", archives.len());
    Ok(())
}
