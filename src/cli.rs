use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug, Clone)]
#[command(author, version, about = "Nearest-prompt retrieval and keyword extraction over HTTP", long_about = None)]
pub struct Cli {
    /// Address to bind the HTTP server to
    #[arg(long, env = "EMBED_PICKER_HOST", default_value = "127.0.0.1")]
    pub host: String,

    #[arg(short, long, env = "EMBED_PICKER_PORT", default_value_t = 5000)]
    pub port: u16,

    /// Directory that request filenames are resolved against
    #[arg(long, env = "EMBED_PICKER_DATA_ROOT", default_value = "..")]
    pub data_root: PathBuf,

    /// JSON file mapping model names to model specs, merged over the built-in models
    #[arg(long, env = "EMBED_PICKER_MODELS")]
    pub models: Option<PathBuf>,

    /// Return at most this many keywords per request
    #[arg(long, env = "EMBED_PICKER_MAX_KEYWORDS")]
    pub max_keywords: Option<usize>,

    /// Log filter, overridden by RUST_LOG when set
    #[arg(long, env = "EMBED_PICKER_LOG", default_value = "info")]
    pub log_level: String,

    /// Emit logs as JSON lines
    #[arg(long, env = "EMBED_PICKER_LOG_JSON")]
    pub log_json: bool,
}

pub fn parse_args() -> Cli {
    Cli::parse()
}
