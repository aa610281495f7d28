use clap::Parser;

/// tether: keep terminal sessions running while viewers come and go.
#[derive(Parser, Debug)]
#[command(name = "tether", version, about)]
pub struct Args {
    /// Port to listen on (overrides config).
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Address to bind (overrides config).
    #[arg(short, long)]
    pub bind: Option<String>,

    /// Config file path override.
    #[arg(long)]
    pub config: Option<String>,

    /// Log level override (trace, debug, info, warn, error).
    #[arg(long)]
    pub log_level: Option<String>,

    /// Print the effective configuration as JSON and exit.
    #[arg(long)]
    pub print_config: bool,
}

pub fn parse() -> Args {
    Args::parse()
}
