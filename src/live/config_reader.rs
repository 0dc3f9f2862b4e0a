use crate::live::*;

use std::fs;
use std::time::Duration;

use serde::{Deserialize, Serialize};

pub const DEFAULT_API_URL: &str = "http://localhost:8000";

/// The personal data used when casting a ballot from the command line.
#[derive(Eq, PartialEq, Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BallotSection {
    #[serde(rename = "fullName")]
    pub full_name: String,
    #[serde(rename = "nationalId")]
    pub national_id: String,
    pub phone: String,
    pub department: String,
    pub province: String,
    pub district: String,
    pub address: String,
}

#[derive(Eq, PartialEq, Debug, Clone, Default, Serialize, Deserialize)]
pub struct LiveConfig {
    #[serde(rename = "apiUrl")]
    pub api_url: Option<String>,
    #[serde(rename = "pollIntervalMs")]
    pub poll_interval_ms: Option<u64>,
    #[serde(rename = "electionYear")]
    pub election_year: Option<u16>,
    #[serde(rename = "accessToken")]
    pub access_token: Option<String>,
    #[serde(rename = "userId")]
    pub user_id: Option<String>,
    #[serde(rename = "isAdmin")]
    pub is_admin: Option<bool>,
    pub ballot: Option<BallotSection>,
}

/// The configuration once the command line has been applied on top of the file.
#[derive(Debug, Clone)]
pub struct LiveSettings {
    pub api_url: String,
    pub poll: PollSettings,
    pub identity: Option<Identity>,
    pub ballot: BallotSection,
}

impl LiveSettings {
    pub fn draft_for(&self, candidate_id: CandidateId) -> BallotDraft {
        let b = &self.ballot;
        BallotDraft {
            candidate_id,
            full_name: b.full_name.clone(),
            national_id: b.national_id.clone(),
            phone: b.phone.clone(),
            department: b.department.clone(),
            province: b.province.clone(),
            district: b.district.clone(),
            address: b.address.clone(),
        }
    }
}

pub fn read_config(path: &str) -> ClientResult<LiveConfig> {
    let contents = fs::read_to_string(path).context(OpeningJsonSnafu { path })?;
    parse_config(&contents)
}

pub fn parse_config(contents: &str) -> ClientResult<LiveConfig> {
    let config: LiveConfig = serde_json::from_str(contents).context(ParsingJsonSnafu {})?;
    Ok(config)
}

impl LiveConfig {
    /// Applies the command line flags, which take precedence over the file.
    pub fn resolve(self, args: &Args) -> ClientResult<LiveSettings> {
        let api_url = args
            .api_url
            .clone()
            .or(self.api_url)
            .unwrap_or_else(|| DEFAULT_API_URL.to_string());

        let interval = match args.interval_ms.or(self.poll_interval_ms) {
            Some(0) => whatever!("the polling interval must be positive"),
            Some(ms) => Duration::from_millis(ms),
            None => PollSettings::DEFAULT_SETTINGS.interval,
        };
        let poll = PollSettings {
            interval,
            query: SnapshotQuery {
                year: args.year.or(self.election_year),
            },
        };

        let identity = match args.token.clone().or(self.access_token) {
            Some(token) if !token.trim().is_empty() => Some(Identity {
                user_id: self.user_id.unwrap_or_default(),
                credential: token,
                is_admin: self.is_admin.unwrap_or(false),
            }),
            _ => None,
        };

        Ok(LiveSettings {
            api_url,
            poll,
            identity,
            ballot: self.ballot.unwrap_or_default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    fn args(extra: &[&str]) -> Args {
        let mut v = vec!["livetally"];
        v.extend_from_slice(extra);
        Args::parse_from(v)
    }

    #[test]
    fn reads_camel_case_keys() {
        let config = parse_config(
            r#"{
                "apiUrl": "http://tally.example:8000",
                "pollIntervalMs": 2500,
                "electionYear": 2026,
                "accessToken": "abc",
                "userId": "u-42",
                "ballot": {"fullName": "Rosa Quispe", "nationalId": "45873210"}
            }"#,
        )
        .unwrap();
        assert_eq!(config.poll_interval_ms, Some(2500));
        assert_eq!(config.is_admin, None);
        let ballot = config.ballot.clone().unwrap();
        assert_eq!(ballot.national_id, "45873210");
        assert_eq!(ballot.phone, "");

        let settings = config.resolve(&args(&[])).unwrap();
        assert_eq!(settings.api_url, "http://tally.example:8000");
        assert_eq!(settings.poll.interval, Duration::from_millis(2500));
        assert_eq!(settings.poll.query.year, Some(2026));
        let identity = settings.identity.unwrap();
        assert_eq!(identity.user_id, "u-42");
        assert_eq!(identity.credential, "abc");
    }

    #[test]
    fn defaults_without_file() {
        let settings = LiveConfig::default().resolve(&args(&[])).unwrap();
        assert_eq!(settings.api_url, DEFAULT_API_URL);
        assert_eq!(settings.poll, PollSettings::DEFAULT_SETTINGS);
        assert!(settings.identity.is_none());
    }

    #[test]
    fn flags_override_the_file() {
        let config = parse_config(r#"{"pollIntervalMs": 2500, "accessToken": "file"}"#).unwrap();
        let settings = config
            .resolve(&args(&["--interval-ms", "500", "--token", "flag", "--year", "2021"]))
            .unwrap();
        assert_eq!(settings.poll.interval, Duration::from_millis(500));
        assert_eq!(settings.poll.query.year, Some(2021));
        assert_eq!(settings.identity.map(|i| i.credential), Some("flag".to_string()));
    }

    #[test]
    fn zero_interval_is_refused() {
        let config = parse_config(r#"{"pollIntervalMs": 0}"#).unwrap();
        assert!(config.resolve(&args(&[])).is_err());
    }

    #[test]
    fn blank_token_means_anonymous() {
        let config = parse_config(r#"{"accessToken": "  "}"#).unwrap();
        assert!(config.resolve(&args(&[])).unwrap().identity.is_none());
    }

    #[test]
    fn draft_uses_the_ballot_section() {
        let config = parse_config(r#"{"ballot": {"district": "Cayma"}}"#).unwrap();
        let settings = config.resolve(&args(&[])).unwrap();
        let draft = settings.draft_for("c-1".into());
        assert_eq!(draft.candidate_id, CandidateId::from("c-1"));
        assert_eq!(draft.district, "Cayma");
    }

    #[test]
    fn malformed_file() {
        assert!(parse_config("{\"pollIntervalMs\": \"soon\"}").is_err());
    }
}
