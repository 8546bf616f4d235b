//! Model listing functionality

use std::error::Error;

use chrono::{DateTime, Utc};

use crate::api::models::sort_models;
use crate::api::ModelInfo;
use crate::cli::chat_client;
use crate::core::config::Config;

/// Human-readable creation date. Some APIs report milliseconds, others
/// seconds; `created_at` strings are shown as-is.
pub fn format_created(model: &ModelInfo) -> Option<String> {
    match model.created {
        Some(created) if created > 0 => {
            let timestamp_secs = if created > 10_000_000_000 {
                created / 1000
            } else {
                created
            };
            let secs = i64::try_from(timestamp_secs).ok()?;
            DateTime::<Utc>::from_timestamp(secs, 0)
                .map(|dt| dt.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        }
        _ => model
            .created_at
            .as_ref()
            .filter(|created_at| !created_at.is_empty())
            .cloned(),
    }
}

pub async fn list_models(config: &Config) -> Result<(), Box<dyn Error>> {
    let client = chat_client(config);

    println!("🤖 Available models");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!();
    println!("🎯 Default model: {}", config.model_or_default());
    println!();

    let mut models = client.list_models().await;
    if models.is_empty() {
        println!("No models found. Check HUBCHAT_LOG=debug output if you expected some.");
        return Ok(());
    }

    println!("Found {} models (sorted newest first):", models.len());
    println!();
    sort_models(&mut models);

    for model in models {
        println!("  • {}", model.id);
        if let Some(display_name) = &model.display_name {
            if !display_name.is_empty() && display_name != &model.id {
                println!("    Name: {display_name}");
            }
        }
        if let Some(owned_by) = &model.owned_by {
            if !owned_by.is_empty() && owned_by != "system" {
                println!("    Owner: {owned_by}");
            }
        }
        if let Some(created) = format_created(&model) {
            println!("    Created: {created}");
        }
        println!();
    }

    Ok(())
}
