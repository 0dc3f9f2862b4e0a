// The HTTP backend: ballots, counts and the candidate catalog.

use crate::live::*;

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value as JSValue;

use ballot_tally::builder::SnapshotBuilder;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Eq, PartialEq, Debug, Serialize)]
struct VoteRequest<'a> {
    candidate_id: &'a str,
    full_name: &'a str,
    dni: &'a str,
    phone: &'a str,
    department: &'a str,
    province: &'a str,
    district: &'a str,
    address: &'a str,
}

impl<'a> VoteRequest<'a> {
    fn from_draft(draft: &'a BallotDraft) -> VoteRequest<'a> {
        VoteRequest {
            candidate_id: draft.candidate_id.as_str(),
            full_name: &draft.full_name,
            dni: &draft.national_id,
            phone: &draft.phone,
            department: &draft.department,
            province: &draft.province,
            district: &draft.district,
            address: &draft.address,
        }
    }
}

/// `GET /votes/check`
#[derive(Debug, Deserialize)]
struct VoteCheckResponse {
    has_voted: bool,
    #[serde(default)]
    candidate_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CandidateCountRow {
    candidate_id: String,
    vote_count: u64,
}

/// `GET /votes/counts`
#[derive(Debug, Deserialize)]
struct VoteCountsResponse {
    success: bool,
    #[serde(default)]
    candidates: Vec<CandidateCountRow>,
    #[serde(default)]
    total_votes: Option<u64>,
}

/// `GET /candidates`, one element of the list.
#[derive(Debug, Deserialize)]
struct CandidateRecord {
    id: String,
    name: String,
    #[serde(default)]
    party: String,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    detail: Option<JSValue>,
}

pub struct HttpBackend {
    http_client: reqwest::Client,
    base_url: String,
    // Sent on reads. Ballots are sent with the identity of the session.
    read_credential: Option<String>,
}

impl HttpBackend {
    pub fn new(base_url: &str, read_credential: Option<String>) -> ClientResult<HttpBackend> {
        let http_client = reqwest::Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .connect_timeout(DEFAULT_CONNECT_TIMEOUT)
            .build()
            .context(HttpClientSnafu {})?;
        Ok(HttpBackend {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
            read_credential,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// The registered candidates, used to label the ranking.
    pub async fn fetch_candidates(&self) -> Result<Vec<Candidate>, BackendError> {
        let records: Vec<CandidateRecord> = self
            .get_json("/candidates", &[], self.read_credential.as_deref())
            .await?;
        debug!("fetch_candidates: {} candidates", records.len());
        Ok(records
            .into_iter()
            .map(|r| Candidate {
                id: CandidateId::new(r.id),
                name: r.name,
                party: r.party,
            })
            .collect())
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
        credential: Option<&str>,
    ) -> Result<T, BackendError> {
        let mut request = self.http_client.get(self.url(path)).query(query);
        if let Some(credential) = credential {
            request = request.bearer_auth(credential);
        }
        let response = request.send().await.map_err(|e| BackendError::Transport {
            message: transport_message(&e),
        })?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            return Err(BackendError::Unauthorized {});
        }
        if !status.is_success() {
            return Err(BackendError::Transport {
                message: format!("HTTP status {} on {}", status, path),
            });
        }
        response
            .json()
            .await
            .map_err(|e| BackendError::InvalidResponse {
                message: format!("failed to parse the response of {}: {}", path, e),
            })
    }
}

#[async_trait]
impl BallotBackend for HttpBackend {
    async fn submit_ballot(
        &self,
        draft: &BallotDraft,
        identity: &Identity,
    ) -> Result<(), SubmitFailure> {
        let body = VoteRequest::from_draft(draft);
        let response = self
            .http_client
            .post(self.url("/votes"))
            .bearer_auth(&identity.credential)
            .json(&body)
            .send()
            .await
            .map_err(|e| SubmitFailure::Transient {
                message: transport_message(&e),
            })?;

        let status = response.status();
        if status.is_success() {
            info!("submit_ballot: ballot for {} recorded", draft.candidate_id);
            return Ok(());
        }
        let text = response.text().await.unwrap_or_default();
        let failure = submit_failure(status, detail_message(&text));
        debug!("submit_ballot: {} -> {:?}", status, failure);

        if let SubmitFailure::AlreadyVoted { candidate: None } = failure {
            // The conflict does not say for whom: ask.
            match self.check_prior_ballot(identity).await {
                Ok(prior) => {
                    return Err(SubmitFailure::AlreadyVoted {
                        candidate: prior.candidate,
                    })
                }
                Err(e) => warn!("submit_ballot: could not read the existing ballot: {}", e),
            }
        }
        Err(failure)
    }

    async fn fetch_snapshot(&self, query: &SnapshotQuery) -> Result<TallySnapshot, BackendError> {
        let params = counts_params(query);
        let resp: VoteCountsResponse = self
            .get_json("/votes/counts", &params, self.read_credential.as_deref())
            .await?;
        snapshot_from_counts(resp)
    }

    async fn check_prior_ballot(&self, identity: &Identity) -> Result<PriorBallot, BackendError> {
        let resp: VoteCheckResponse = self
            .get_json("/votes/check", &[], Some(&identity.credential))
            .await?;
        Ok(PriorBallot {
            has_voted: resp.has_voted,
            candidate: resp
                .candidate_id
                .filter(|cid| !cid.is_empty())
                .map(CandidateId::new),
        })
    }
}

fn transport_message(e: &reqwest::Error) -> String {
    if e.is_timeout() {
        format!("request timed out: {e}")
    } else if e.is_connect() {
        format!("connection failed: {e}")
    } else {
        e.to_string()
    }
}

fn submit_failure(status: StatusCode, detail: String) -> SubmitFailure {
    match status {
        StatusCode::UNAUTHORIZED => SubmitFailure::NotAuthenticated {},
        StatusCode::CONFLICT => SubmitFailure::AlreadyVoted { candidate: None },
        StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => {
            SubmitFailure::ValidationRejected { message: detail }
        }
        _ => SubmitFailure::Transient {
            message: if detail.is_empty() {
                format!("HTTP status {}", status)
            } else {
                format!("HTTP status {}: {}", status, detail)
            },
        },
    }
}

// Error bodies carry a `detail` that is either a string or a list of field errors.
fn detail_message(body: &str) -> String {
    match serde_json::from_str::<ErrorBody>(body) {
        Ok(ErrorBody {
            detail: Some(JSValue::String(s)),
        }) => s,
        Ok(ErrorBody { detail: Some(v) }) => v.to_string(),
        _ => body.trim().to_string(),
    }
}

// `/votes/counts` takes no parameter in the web client. `?year=` is only sent
// when a year is configured, for backends that serve several elections on
// that route. Without a year the request is the plain one.
fn counts_params(query: &SnapshotQuery) -> Vec<(&'static str, String)> {
    query
        .year
        .iter()
        .map(|y| ("year", y.to_string()))
        .collect()
}

fn snapshot_from_counts(resp: VoteCountsResponse) -> Result<TallySnapshot, BackendError> {
    if !resp.success {
        return Err(BackendError::InvalidResponse {
            message: "the backend reported a failure reading the counts".to_string(),
        });
    }
    let mut builder = SnapshotBuilder::new();
    for row in resp.candidates {
        builder.add_count(CandidateId::new(row.candidate_id), VoteCount(row.vote_count));
    }
    if let Some(total) = resp.total_votes {
        builder = builder.reported_total(total);
    }
    Ok(builder.as_of(Utc::now()).build())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping() {
        assert_eq!(
            submit_failure(StatusCode::UNAUTHORIZED, String::new()),
            SubmitFailure::NotAuthenticated {}
        );
        assert_eq!(
            submit_failure(StatusCode::CONFLICT, "Ya has votado".to_string()),
            SubmitFailure::AlreadyVoted { candidate: None }
        );
        assert_eq!(
            submit_failure(StatusCode::UNPROCESSABLE_ENTITY, "bad dni".to_string()),
            SubmitFailure::ValidationRejected {
                message: "bad dni".to_string()
            }
        );
        assert!(matches!(
            submit_failure(StatusCode::BAD_REQUEST, String::new()),
            SubmitFailure::ValidationRejected { .. }
        ));
        assert_eq!(
            submit_failure(StatusCode::SERVICE_UNAVAILABLE, String::new()),
            SubmitFailure::Transient {
                message: "HTTP status 503 Service Unavailable".to_string()
            }
        );
    }

    #[test]
    fn error_details() {
        assert_eq!(
            detail_message(r#"{"detail": "El DNI ya fue registrado"}"#),
            "El DNI ya fue registrado"
        );
        assert_eq!(
            detail_message(r#"{"detail": [{"loc": ["body", "dni"]}]}"#),
            r#"[{"loc":["body","dni"]}]"#
        );
        assert_eq!(detail_message("Bad Gateway\n"), "Bad Gateway");
    }

    #[test]
    fn vote_request_wire_names() {
        let draft = BallotDraft {
            candidate_id: "c-9".into(),
            national_id: "45873210".to_string(),
            ..BallotDraft::default()
        };
        let js = serde_json::to_value(VoteRequest::from_draft(&draft)).unwrap();
        assert_eq!(js["candidate_id"], "c-9");
        assert_eq!(js["dni"], "45873210");
        assert!(js.get("national_id").is_none());
    }

    #[test]
    fn counts_response() {
        let resp: VoteCountsResponse = serde_json::from_str(
            r#"{
                "success": true,
                "candidates": [
                    {"candidate_id": "a", "candidate_name": "Ana", "party": "P1", "vote_count": 3, "percentage": 75.0},
                    {"candidate_id": "b", "candidate_name": "Beto", "party": "P2", "vote_count": 1, "percentage": 25.0}
                ],
                "total_votes": 4
            }"#,
        )
        .unwrap();
        let snapshot = snapshot_from_counts(resp).unwrap();
        assert_eq!(snapshot.count(&"a".into()), VoteCount(3));
        assert_eq!(snapshot.total(), VoteCount(4));
    }

    #[test]
    fn year_is_only_sent_when_configured() {
        assert!(counts_params(&SnapshotQuery::default()).is_empty());
        assert_eq!(
            counts_params(&SnapshotQuery { year: Some(2021) }),
            vec![("year", "2021".to_string())]
        );
    }

    #[test]
    fn unsuccessful_counts() {
        let resp: VoteCountsResponse = serde_json::from_str(r#"{"success": false}"#).unwrap();
        assert!(matches!(
            snapshot_from_counts(resp),
            Err(BackendError::InvalidResponse { .. })
        ));
    }

    #[test]
    fn base_url_is_normalized() {
        let backend = HttpBackend::new("http://localhost:8000/api/", None).unwrap();
        assert_eq!(backend.url("/votes"), "http://localhost:8000/api/votes");
    }
}
