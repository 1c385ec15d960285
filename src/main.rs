//! ergowifi - send commands to ErgoWifi appliances.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use ergowifi::config::{AppConfig, ConfigLoadResult};
use ergowifi::ergo::{CommandDispatcher, Controller, Dispatch, MessageSequence, RepeatOptions, SkipReason};
use ergowifi::ergo::{command_frame, login_frame};

/// Send commands to an ErgoWifi appliance.
#[derive(Parser)]
#[command(name = "ergowifi", version)]
struct Cli {
    /// Path to config.toml (defaults to the per-user config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Send one or more command codes to the device
    Send {
        /// Command codes, sent in order
        #[arg(required = true)]
        codes: Vec<u32>,
        /// Number of cycles (repeat until Ctrl-C when only --wait-ms is given)
        #[arg(long)]
        count: Option<u32>,
        /// Pause between cycles in milliseconds
        #[arg(long)]
        wait_ms: Option<u64>,
    },
    /// Print frame bytes without connecting
    #[command(subcommand)]
    Frame(FrameCommand),
    /// Manage the config file
    #[command(subcommand)]
    Config(ConfigCommand),
}

#[derive(Subcommand)]
enum FrameCommand {
    /// Login frame
    Login {
        #[arg(long)]
        user_id: u32,
        #[arg(long)]
        authorize: String,
    },
    /// Command frame
    Command {
        #[arg(long)]
        device_id: u32,
        #[arg(long)]
        code: u32,
        /// Message id to embed (random when omitted)
        #[arg(long)]
        message_id: Option<u16>,
    },
}

#[derive(Subcommand)]
enum ConfigCommand {
    /// Write a default config file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
    /// Print the loaded config
    Show,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .init();

    let config_path = cli.config.unwrap_or_else(AppConfig::default_path);
    tracing::debug!("Config path: {:?}", config_path);

    match cli.command {
        Command::Send { codes, count, wait_ms } => {
            let dispatcher = CommandDispatcher::from_config_file(&config_path)
                .with_context(|| format!("loading {}", config_path.display()))?;
            let options = RepeatOptions::new(count, wait_ms.map(Duration::from_millis));
            send(&dispatcher, &codes, options).await
        }
        Command::Frame(frame) => print_frame(frame),
        Command::Config(ConfigCommand::Init { force }) => {
            if config_path.exists() && !force {
                bail!("{} already exists (use --force to overwrite)", config_path.display());
            }
            AppConfig::default().save(&config_path)?;
            println!("Wrote {}", config_path.display());
            Ok(())
        }
        Command::Config(ConfigCommand::Show) => match AppConfig::try_load(&config_path) {
            ConfigLoadResult::Loaded(config) => {
                print!("{}", toml::to_string_pretty(&config)?);
                Ok(())
            }
            ConfigLoadResult::Missing => bail!("{} not found (run `ergowifi config init`)", config_path.display()),
            ConfigLoadResult::Invalid(e) => Err(e.into()),
        },
    }
}

async fn send(dispatcher: &CommandDispatcher, codes: &[u32], options: RepeatOptions) -> anyhow::Result<()> {
    match dispatcher.write_commands(codes, options).await? {
        Dispatch::Sent => println!("sent"),
        Dispatch::Skipped(SkipReason::NoCredentials) => println!("skipped: no credentials"),
        Dispatch::Repeating => {
            println!("repeating (Ctrl-C to stop)");
            tokio::select! {
                _ = dispatcher.wait_for_repeat() => {}
                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("Interrupted, cancelling");
                    dispatcher.cancel_commands().await;
                }
            }
            println!("done");
        }
    }

    Ok(())
}

fn print_frame(frame: FrameCommand) -> anyhow::Result<()> {
    let frame = match frame {
        FrameCommand::Login { user_id, authorize } => login_frame(user_id, &authorize)?,
        FrameCommand::Command {
            device_id,
            code,
            message_id,
        } => {
            let sequence = match message_id {
                Some(id) => MessageSequence::starting_at(id),
                None => MessageSequence::new(),
            };
            command_frame(&sequence, device_id, code)?
        }
    };
    println!("{}", frame.to_hex());
    Ok(())
}
