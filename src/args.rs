use clap::Parser;

/// Follows a live vote tally, and optionally casts a ballot.
#[derive(Parser, Debug, Clone)]
#[clap(author, version, about, long_about = None)]
pub struct Args {
    /// (file path, optional) The JSON configuration file. See the manual of ballot_tally for
    /// the keys it accepts.
    #[clap(short, long, value_parser)]
    pub config: Option<String>,

    /// (URL, default http://localhost:8000) The base URL of the backend. Overrides `apiUrl`.
    #[clap(long, value_parser)]
    pub api_url: Option<String>,

    /// (optional) The bearer credential of the voter. Overrides `accessToken`.
    /// Without a credential, the tally can be followed but no ballot can be cast.
    #[clap(long, value_parser)]
    pub token: Option<String>,

    /// (milliseconds, default 10000) The polling interval. Overrides `pollIntervalMs`.
    #[clap(long, value_parser)]
    pub interval_ms: Option<u64>,

    /// (optional) The election year to follow, sent as `?year=` when reading the counts.
    /// Overrides `electionYear`.
    #[clap(long, value_parser)]
    pub year: Option<u16>,

    /// (candidate identifier, optional) If specified, casts a ballot for this candidate, using the
    /// personal data of the `ballot` section of the configuration.
    #[clap(long, value_parser)]
    pub vote: Option<String>,

    /// (number, optional) Stops after this many snapshots. Runs until interrupted otherwise.
    #[clap(long, value_parser)]
    pub rounds: Option<usize>,

    /// If passed as an argument, the tally is printed as one JSON document per line.
    #[clap(long, takes_value = false)]
    pub json: bool,

    // Other arguments
    /// If passed as an argument, will turn on verbose logging to the standard output.
    #[clap(long, takes_value = false)]
    pub verbose: bool,
}
