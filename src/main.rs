use clap::Parser;
use exeggutor::config::{CliConfig, Commands, TomlConfig};
use exeggutor::core::archive::{archive_subdirectories, ArchiveOptions};
use exeggutor::core::command::{Redirect, ShellCommand};
use exeggutor::core::fetch::{download, download_into};
use exeggutor::core::filesystem::{directory_size, directory_tree, md5_directory, md5_file};
use exeggutor::core::genomics::{parse_attribute_from_gff, read_gff};
use exeggutor::core::io::{gzip_file, read_list, GzipOptions};
use exeggutor::core::parallel::run_tasks;
use exeggutor::utils::error::{ExeggutorError, Result};
use exeggutor::utils::format::{format_bytes, ByteUnit};
use exeggutor::utils::logger::{self, LoggerOptions};
use exeggutor::utils::validation::Validate;
use std::path::PathBuf;

#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    let cli = CliConfig::parse();

    let settings = match &cli.config {
        Some(path) => match TomlConfig::from_file(path) {
            Ok(settings) => settings,
            Err(e) => {
                eprintln!("❌ Failed to load config file '{}': {}", path.display(), e);
                eprintln!("💡 Make sure the file exists and is valid TOML format");
                std::process::exit(1);
            }
        },
        None => TomlConfig::default(),
    };

    init_logging(&cli, &settings);
    tracing::debug!("CLI config: {:?}", cli);

    if let Err(e) = settings.validate().and_then(|_| cli.validate()) {
        tracing::error!("❌ Configuration validation failed: {}", e);
        tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
        eprintln!("❌ {}", e.user_friendly_message());
        std::process::exit(1);
    }

    if let Err(e) = execute(&cli, &settings).await {
        tracing::error!(
            "❌ {} (Category: {:?}, Severity: {:?})",
            e,
            e.category(),
            e.severity()
        );
        tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());
        eprintln!("❌ {}", e.user_friendly_message());

        let exit_code = e.exit_code();
        if exit_code > 0 {
            std::process::exit(exit_code);
        }
    }

    Ok(())
}

fn init_logging(cli: &CliConfig, settings: &TomlConfig) {
    let mut options = settings.logger_options();
    if cli.verbose {
        options.level = "debug".to_string();
    }
    if let Some(level) = &cli.log_level {
        options.level = level.clone();
    }
    if let Some(file) = &cli.log_file {
        options.file = Some(file.clone());
    }

    let customised = options.file.is_some() || options.json || options.level != LoggerOptions::default().level;
    if !customised {
        logger::init_cli_logger(cli.verbose);
        return;
    }
    if let Err(e) = logger::build_logger(&options) {
        eprintln!("❌ {}", e.user_friendly_message());
        std::process::exit(1);
    }
}

async fn execute(cli: &CliConfig, settings: &TomlConfig) -> Result<()> {
    let environment = settings.build_environment()?;

    match &cli.command {
        Commands::Gzip { file, keep, level } => {
            let output = gzip_file(
                file,
                GzipOptions {
                    keep_original: *keep,
                    level: *level,
                },
            )?;
            println!("{}", output.display());
        }
        Commands::Archive {
            parent,
            output_dir,
            subdirectories,
            remove_original,
        } => {
            let options = ArchiveOptions {
                output_dir: output_dir.clone(),
                subdirectories: (!subdirectories.is_empty()).then(|| subdirectories.clone()),
                remove_original: *remove_original,
            };
            for archive in archive_subdirectories(parent, &options)? {
                println!("{}", archive.display());
            }
        }
        Commands::Which { names } => {
            for name in names {
                let path = environment
                    .find_executable(name)
                    .ok_or_else(|| ExeggutorError::ExecutableNotFound { name: name.clone() })?;
                println!("{}", path.display());
            }
        }
        Commands::Md5 { path } => {
            if path.is_dir() {
                for (file, hash) in md5_directory(path)? {
                    println!("{}  {}", hash, file.display());
                }
            } else {
                println!("{}  {}", md5_file(path)?, path.display());
            }
        }
        Commands::Du { directory, unit } => {
            let unit: ByteUnit = unit.parse()?;
            println!(
                "{}\t{}",
                format_bytes(directory_size(directory), unit),
                directory.display()
            );
        }
        Commands::Tree { directory } => println!("{}", directory_tree(directory)?),
        Commands::Run {
            command,
            name,
            stdout,
            stderr,
            dump,
            inputs,
            outputs,
        } => {
            let mut shell_command = ShellCommand::new(command)
                .with_shell(settings.shell())
                .with_environment(environment.clone())
                .with_sample_interval(settings.sample_interval())
                .with_inputs(inputs.iter().cloned())
                .with_outputs(outputs.iter().cloned());
            if let Some(name) = name {
                shell_command = shell_command.with_name(name);
            }

            let outcome = shell_command
                .run(redirect_for(stdout), redirect_for(stderr))
                .await?;
            if let Some(text) = &outcome.stdout {
                print!("{}", text);
            }
            if let Some(text) = &outcome.stderr {
                eprint!("{}", text);
            }
            eprintln!("{}", outcome);

            if let Some(directory) = dump {
                outcome.dump(directory)?;
            }
            outcome.check_status()?;
        }
        Commands::Parallel { commands, jobs } => {
            let lines = read_list(commands)?;
            let tasks: Vec<ShellCommand> = lines
                .iter()
                .enumerate()
                .map(|(i, line)| {
                    ShellCommand::new([line])
                        .with_name(format!("task_{}", i + 1))
                        .with_shell(settings.shell())
                        .with_environment(environment.clone())
                        .with_sample_interval(settings.sample_interval())
                })
                .collect();
            let total = tasks.len();

            let results = run_tasks(tasks, jobs.unwrap_or_else(|| settings.jobs())).await;
            let mut failed = 0;
            for result in results {
                match result.and_then(|outcome| {
                    eprintln!("{}", outcome);
                    outcome.check_status()
                }) {
                    Ok(()) => {}
                    Err(e) => {
                        tracing::error!("{}", e);
                        failed += 1;
                    }
                }
            }
            if failed > 0 {
                return Err(ExeggutorError::TaskFailed {
                    label: commands.display().to_string(),
                    message: format!("{} of {} commands failed", failed, total),
                });
            }
        }
        Commands::Pv { input, command } => {
            let outcome = ShellCommand::with_progress_in(&environment, input, &command.join(" "))?
                .with_shell(settings.shell())
                .with_inputs([input.clone()])
                .run(Redirect::Inherit, Redirect::Inherit)
                .await?;
            outcome.check_status()?;
        }
        Commands::Download { url, output } => {
            let saved = match (output, settings.download_dir()) {
                (Some(output), _) => download(url, output).await?,
                (None, Some(directory)) => download_into(url, directory).await?,
                (None, None) => download(url, ".").await?,
            };
            println!("{}", saved.display());
        }
        Commands::GffAttribute { gff, attribute } => {
            for record in read_gff(gff)? {
                if let Some(value) = parse_attribute_from_gff(&record.attributes, attribute)? {
                    println!("{}\t{}\t{}\t{}", record.seqid, record.start, record.end, value);
                }
            }
        }
        Commands::ReadList { path } => {
            for value in read_list(path)? {
                println!("{}", value);
            }
        }
    }
    Ok(())
}

fn redirect_for(path: &Option<PathBuf>) -> Redirect {
    match path {
        Some(path) => Redirect::File(path.clone()),
        None => Redirect::Capture,
    }
}
