use clap::Parser;

/// End-to-end checks of the reqres user and registration endpoints
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to the suite configuration file
    #[arg(short, long, default_value = "reqres_quest.toml")]
    pub path: String,

    /// Use this base URL instead of the one from the configuration file
    #[arg(long)]
    pub base_url: Option<String>,

    /// Only run scenarios whose name contains this value, may be repeated
    #[arg(short, long = "scenario")]
    pub scenarios: Vec<String>,

    /// Skip the remaining steps of a scenario after its first failing step
    #[arg(long)]
    pub fail_fast: bool,

    /// Send the requests of all scenarios concurrently
    #[arg(long)]
    pub parallel: bool,

    /// Write a JSON report with every outcome and captured exchange
    #[arg(long)]
    pub report: Option<String>,

    /// Do not log requests and responses
    #[arg(short, long)]
    pub quiet: bool,
}

#[cfg(test)]
mod test {
    use clap::Parser;

    use super::Cli;

    #[test]
    fn defaults() {
        let cli = Cli::parse_from(["rq"]);

        assert_eq!(cli.path, "reqres_quest.toml");
        assert!(cli.scenarios.is_empty());
        assert!(!cli.fail_fast);
        assert!(!cli.parallel);
    }

    #[test]
    fn repeated_scenarios() {
        let cli = Cli::parse_from(["rq", "-s", "register", "--scenario", "create", "--fail-fast"]);

        assert_eq!(cli.scenarios, vec!["register", "create"]);
        assert!(cli.fail_fast);
    }
}
