use log::{debug, info, warn};

use ballot_tally::*;
use snafu::{prelude::*, Snafu};

use std::sync::Arc;

use tokio::sync::mpsc;

use crate::args::Args;
use crate::live::config_reader::*;
use crate::live::http_backend::HttpBackend;
use crate::live::io_common::*;

pub mod config_reader;
pub mod http_backend;
pub mod io_common;

#[derive(Debug, Snafu)]
pub enum ClientError {
    #[snafu(display("Error opening file {path}: {source}"))]
    OpeningJson {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Error parsing JSON: {source}"))]
    ParsingJson { source: serde_json::Error },
    #[snafu(display("Error creating the HTTP client: {source}"))]
    HttpClient { source: reqwest::Error },
    #[snafu(display("Error casting the ballot: {source}"))]
    Casting { source: CastError },

    #[snafu(whatever, display("{message}"))]
    Whatever {
        message: String,
        #[snafu(source(from(Box<dyn std::error::Error>, Some)))]
        source: Option<Box<dyn std::error::Error>>,
    },
}

pub type ClientResult<T> = Result<T, ClientError>;

type SubmitOutcome = (SubmissionTicket, Result<(), SubmitFailure>);

/// Follows the live tally until interrupted, or for `--rounds` snapshots.
/// With `--vote`, a ballot is cast first.
pub async fn run(args: &Args) -> ClientResult<()> {
    let file_config = match &args.config {
        Some(path) => read_config(path)?,
        None => LiveConfig::default(),
    };
    let settings = file_config.resolve(args)?;
    info!("run: settings: {:?}", settings);

    let read_credential = settings.identity.as_ref().map(|i| i.credential.clone());
    let backend = Arc::new(HttpBackend::new(&settings.api_url, read_credential)?);
    let mut session = VotingSession::new(settings.identity.clone());

    if let Err(e) = session.load_prior_ballot(backend.as_ref()).await {
        warn!("run: could not check for a prior ballot: {}", e);
    }
    let labels = match backend.fetch_candidates().await {
        Ok(catalog) => CandidateLabels::new(&catalog),
        Err(e) => {
            warn!("run: no candidate catalog, showing identifiers: {}", e);
            CandidateLabels::default()
        }
    };

    if let VoterBallotState::Confirmed(cid) = session.ballot_state() {
        println!("You already voted for {}", labels.label(cid));
    }

    let (handle, mut feed) = poller::start(&settings.poll, backend.clone());
    let (outcome_tx, mut outcome_rx) = mpsc::channel::<SubmitOutcome>(1);

    let mut rounds: usize = 0;
    if let Some(cid) = &args.vote {
        // The count before this ballot is read from the first snapshot.
        tokio::select! {
            snapshot = feed.next() => match snapshot {
                Some(snapshot) => {
                    if session.apply_snapshot(snapshot) == SnapshotApplied::Applied {
                        render(&session, &labels, args.json)?;
                    }
                    rounds += 1;
                }
                None => warn!("run: no snapshot before casting the ballot"),
            },
            _ = tokio::signal::ctrl_c() => {
                info!("run: interrupted before casting the ballot");
                handle.cancel();
                session.close();
                return Ok(());
            }
        }
        let draft = settings.draft_for(CandidateId::new(cid.clone()));
        let ticket = match session.begin_cast(&draft) {
            Ok(ticket) => ticket,
            Err(e) => {
                handle.cancel();
                session.close();
                return Err(e).context(CastingSnafu {});
            }
        };
        let submitter = backend.clone();
        let tx = outcome_tx.clone();
        tokio::spawn(async move {
            let outcome = submitter.submit_ballot(&draft, ticket.identity()).await;
            if tx.send((ticket, outcome)).await.is_err() {
                debug!("run: session gone before the submission completed");
            }
        });
    }
    drop(outcome_tx);

    loop {
        tokio::select! {
            snapshot = feed.next() => {
                let snapshot = match snapshot {
                    Some(snapshot) => snapshot,
                    None => break,
                };
                match session.apply_snapshot(snapshot) {
                    SnapshotApplied::Applied => render(&session, &labels, args.json)?,
                    SnapshotApplied::Stale => debug!("run: stale snapshot dropped"),
                    SnapshotApplied::Discarded => break,
                }
                rounds += 1;
                if args.rounds.map(|max| rounds >= max).unwrap_or(false) {
                    break;
                }
            }
            Some((ticket, outcome)) = outcome_rx.recv() => {
                match session.complete_cast(&ticket, outcome) {
                    SubmissionResult::Accepted(cid) => {
                        println!("Your ballot for {} was recorded", labels.label(&cid));
                        render(&session, &labels, args.json)?;
                        let refresher = handle.clone();
                        tokio::spawn(async move {
                            if let Err(e) = refresher.refresh_now().await {
                                debug!("run: refresh after the ballot failed: {}", e);
                            }
                        });
                    }
                    SubmissionResult::Rejected(failure) => {
                        eprintln!("Your ballot was not recorded: {}", failure);
                        if let VoterBallotState::Confirmed(cid) = session.ballot_state() {
                            println!("Your ballot on record is for {}", labels.label(cid));
                        }
                    }
                    SubmissionResult::Stale => {}
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("run: interrupted");
                break;
            }
        }
    }

    handle.cancel();
    session.close();
    Ok(())
}

fn render(session: &VotingSession, labels: &CandidateLabels, as_json: bool) -> ClientResult<()> {
    let rows = session.ranking();
    if as_json {
        let js = tally_to_json(session.displayed(), &rows, labels);
        let line = serde_json::to_string(&js).context(ParsingJsonSnafu {})?;
        println!("{}", line);
    } else {
        println!("Total votes: {}", session.displayed().total());
        for line in format_rows(&rows, labels) {
            println!("{}", line);
        }
    }
    Ok(())
}
