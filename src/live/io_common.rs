use std::collections::HashMap;

use ballot_tally::*;
use serde_json::json;
use serde_json::Value as JSValue;

/// Display names and parties from the candidate catalog.
#[derive(Debug, Clone, Default)]
pub struct CandidateLabels {
    by_id: HashMap<CandidateId, Candidate>,
}

impl CandidateLabels {
    pub fn new(catalog: &[Candidate]) -> CandidateLabels {
        CandidateLabels {
            by_id: catalog.iter().map(|c| (c.id.clone(), c.clone())).collect(),
        }
    }

    /// `name (party)`, or the bare identifier for a candidate missing from the catalog.
    pub fn label(&self, cid: &CandidateId) -> String {
        match self.by_id.get(cid) {
            Some(c) if c.party.is_empty() => c.name.clone(),
            Some(c) => format!("{} ({})", c.name, c.party),
            None => cid.to_string(),
        }
    }
}

pub fn format_rows(rows: &[RankedCandidate], labels: &CandidateLabels) -> Vec<String> {
    rows.iter()
        .map(|r| {
            format!(
                "{:>3}. {:<40} {:>8} {:>6.1}%",
                r.rank,
                labels.label(&r.candidate_id),
                r.count.0,
                r.percentage
            )
        })
        .collect()
}

pub fn tally_to_json(
    tally: &MergedTally,
    rows: &[RankedCandidate],
    labels: &CandidateLabels,
) -> JSValue {
    let ranking: Vec<JSValue> = rows
        .iter()
        .map(|r| {
            let candidate = labels.by_id.get(&r.candidate_id);
            json!({
                "rank": r.rank,
                "candidateId": r.candidate_id,
                "name": candidate.map(|c| c.name.clone()),
                "party": candidate.map(|c| c.party.clone()),
                "count": r.count,
                "percentage": r.percentage,
            })
        })
        .collect();
    json!({
        "total": tally.total(),
        "localAdjustment": tally.local_adjustment(),
        "ranking": ranking,
    })
}
