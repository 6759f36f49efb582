use clap::Parser;

/// The command line args for the autoscaler
#[derive(Parser, Debug, Clone)]
#[clap(version, author)]
pub struct Args {
    /// The path to load the config file from
    #[clap(short, long, default_value = "autoscaler.yml")]
    pub config: String,
    /// Run a single evaluation and exit instead of looping forever
    #[clap(long, default_value_t)]
    pub dry_run: bool,
}
