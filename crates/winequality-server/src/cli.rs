use clap::Parser;
use std::path::PathBuf;
use winequality_model::ModelFormat;

#[derive(Parser, Debug, Default)]
#[command(name = "winequality-server")]
#[command(author, version, about = "Wine quality prediction service", long_about = None)]
pub struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "config.yaml")]
    pub config: String,

    /// Model artifact path (overrides the configuration file)
    #[arg(short, long)]
    pub model: Option<PathBuf>,

    /// Model format: auto, lightgbm or safetensors
    #[arg(long, value_parser = parse_format)]
    pub format: Option<ModelFormat>,

    /// Listen address
    #[arg(short = 'l', long, default_value = "0.0.0.0")]
    pub listen: String,

    /// Listen port
    #[arg(short = 'P', long, default_value = "8000")]
    pub port: u16,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}

fn parse_format(s: &str) -> Result<ModelFormat, String> {
    s.parse()
}
