//! Command-line interface parsing and handling
//!
//! This module handles parsing command-line arguments and executing the appropriate commands.

pub mod model_list;
pub mod say;

use std::error::Error;
use std::sync::Arc;

use clap::{Parser, Subcommand};

use crate::cli::model_list::list_models;
use crate::cli::say::{run_say, SayOptions};
use crate::core::config::data::{path_display, SETTING_KEYS};
use crate::core::config::Config;
use crate::core::credentials::ConfigCredentials;
use crate::core::transport::{ChatClient, MalformedFramePolicy};
use crate::utils::logging::init_tracing;

#[derive(Parser)]
#[command(name = "hubchat")]
#[command(about = "Streaming chat against OpenAI-compatible gateways")]
#[command(
    long_about = "hubchat sends prompts to any OpenAI-compatible chat completions endpoint and \
prints the reply as it streams in.\n\n\
Configuration:\n\
  Use 'hubchat set <key> <value>' to store settings. Run 'hubchat set' to show them.\n\n\
Environment Variables (take precedence over the config file):\n\
  HUBCHAT_API_KEY / OPENAI_API_KEY     API key\n\
  HUBCHAT_BASE_URL / OPENAI_BASE_URL   API base URL (defaults to https://api.openai.com/v1)\n\
  HUBCHAT_CONFIG                       Path of the config file\n\
  HUBCHAT_LOG                          tracing filter for diagnostics on stderr (default: warn)"
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Send a single prompt and print the reply
    Say {
        /// Model to use (defaults to the configured default-model)
        #[arg(short = 'm', long, value_name = "MODEL")]
        model: Option<String>,

        /// System prompt sent before the user message
        #[arg(long, value_name = "TEXT")]
        system: Option<String>,

        /// Wait for the whole reply instead of streaming it
        #[arg(long)]
        no_stream: bool,

        /// Ask the gateway to search the web for this prompt
        #[arg(long)]
        web_search: bool,

        /// Attach a local file, URL or data URI (repeatable)
        #[arg(short = 'a', long = "attach", value_name = "PATH")]
        attachments: Vec<String>,

        /// Append the exchange to a transcript file
        #[arg(short = 'l', long, value_name = "FILE")]
        log: Option<String>,

        /// Prompt text; multiple words are joined with spaces
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        prompt: Vec<String>,
    },
    /// List models advertised by the gateway
    Models,
    /// Set configuration values
    Set {
        /// Configuration key to set
        key: Option<String>,
        /// Value to set for the key (can be multiple words)
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        value: Option<Vec<String>>,
    },
    /// Unset configuration values
    Unset {
        /// Configuration key to unset
        key: String,
    },
}

/// Builds a transport client from the stored configuration. Environment
/// variables are re-read on every request.
pub fn chat_client(config: &Config) -> ChatClient {
    let policy = if config.strict_frames_enabled() {
        MalformedFramePolicy::Fail
    } else {
        MalformedFramePolicy::Skip
    };
    ChatClient::new(Arc::new(ConfigCredentials::new(config.clone()))).with_frame_policy(policy)
}

pub fn main() -> Result<(), Box<dyn Error>> {
    init_tracing();
    let args = Args::parse();
    tokio::runtime::Runtime::new()?.block_on(async_main(args))
}

async fn async_main(args: Args) -> Result<(), Box<dyn Error>> {
    match args.command {
        Commands::Say {
            model,
            system,
            no_stream,
            web_search,
            attachments,
            log,
            prompt,
        } => {
            let config = Config::load()?;
            run_say(
                &config,
                SayOptions {
                    prompt: prompt.join(" "),
                    model,
                    system,
                    stream: !no_stream,
                    web_search,
                    attachments,
                    log,
                },
            )
            .await
        }
        Commands::Models => {
            let config = Config::load()?;
            list_models(&config).await
        }
        Commands::Set { key, value } => {
            let mut config = Config::load()?;
            let value = value.map(|parts| parts.join(" ")).unwrap_or_default();
            match key {
                Some(key) if !value.is_empty() => {
                    config.set_value(&key, &value)?;
                    config.save()?;
                    let shown = if key == "api-key" {
                        crate::core::config::printing::mask_secret(&value)
                    } else {
                        value
                    };
                    println!("✅ Set {key} to: {shown}");
                    print_config_location();
                }
                Some(key) if !SETTING_KEYS.contains(&key.as_str()) => {
                    eprintln!("❌ Unknown config key: {key}");
                    eprintln!("Available keys: {}", SETTING_KEYS.join(", "));
                    std::process::exit(1);
                }
                _ => config.print_all(),
            }
            Ok(())
        }
        Commands::Unset { key } => {
            let mut config = Config::load()?;
            if !SETTING_KEYS.contains(&key.as_str()) {
                eprintln!("❌ Unknown config key: {key}");
                eprintln!("Available keys: {}", SETTING_KEYS.join(", "));
                std::process::exit(1);
            }
            config.unset_value(&key)?;
            config.save()?;
            println!("✅ Unset {key}");
            Ok(())
        }
    }
}

fn print_config_location() {
    if let Ok(path) = Config::get_config_path() {
        println!("   (saved to {})", path_display(path));
    }
}
