use clap::Parser;

/// Termhub — a multi-session terminal host with structured output events.
#[derive(Parser, Debug)]
#[command(name = "termhub", version, about)]
pub struct Args {
    /// Config file path override.
    #[arg(long)]
    pub config: Option<String>,

    /// Log level override (e.g. "debug" or "termhub_session=trace").
    #[arg(long)]
    pub log_level: Option<String>,

    /// Bind address override for the WebSocket service.
    #[arg(long)]
    pub bind: Option<String>,

    /// Working directory to start in.
    #[arg(short = 'd', long)]
    pub directory: Option<String>,
}

pub fn parse() -> Args {
    Args::parse()
}
