//! Prompt command - show what would be sent for one invoice.

use std::path::PathBuf;

use clap::Args;
use console::style;

use facturai_core::build_request;

use super::config;

/// Arguments for the prompt command.
#[derive(Args)]
pub struct PromptArgs {
    /// Invoice file
    #[arg(required = true)]
    file: PathBuf,
}

pub fn run(args: PromptArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let config = config::load(config_path)?;

    let input_dir = args
        .file
        .parent()
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."));
    let request = build_request(0, &args.file, &input_dir);

    println!(
        "{} {} ({})",
        style("Model:").bold(),
        config.gateway.model,
        config.gateway.endpoint
    );
    println!("{} {}", style("Source:").bold(), request.source_file);
    println!();
    println!("{}", request.full_prompt());

    if !args.file.exists() {
        println!();
        println!(
            "{} {} does not exist",
            style("⚠").yellow(),
            args.file.display()
        );
    }

    Ok(())
}
