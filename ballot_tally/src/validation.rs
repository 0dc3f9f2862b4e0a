//! Format checks on the personal data of a ballot.
//!
//! These checks only look at the shape of the fields. Eligibility is decided by
//! the backend.

use std::fmt::Display;

use log::debug;

use crate::config::BallotDraft;

/// The number of digits of a national identity document.
pub const NATIONAL_ID_LEN: usize = 8;

#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash)]
pub enum BallotField {
    Candidate,
    FullName,
    NationalId,
    Phone,
    Department,
    Province,
    District,
    Address,
}

impl Display for BallotField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            BallotField::Candidate => "candidate",
            BallotField::FullName => "full name",
            BallotField::NationalId => "national ID",
            BallotField::Phone => "phone",
            BallotField::Department => "department",
            BallotField::Province => "province",
            BallotField::District => "district",
            BallotField::Address => "address",
        };
        write!(f, "{}", name)
    }
}

#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash)]
pub enum FieldProblem {
    Empty,
    /// The national ID does not have the expected number of characters.
    WrongLength(usize),
    NonDigit,
}

#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash)]
pub struct FieldFailure {
    pub field: BallotField,
    pub problem: FieldProblem,
}

impl Display for FieldFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.problem {
            FieldProblem::Empty => write!(f, "{} is required", self.field),
            FieldProblem::WrongLength(len) => write!(
                f,
                "{} must have exactly {} digits (got {})",
                self.field, NATIONAL_ID_LEN, len
            ),
            FieldProblem::NonDigit => write!(f, "{} must only contain digits", self.field),
        }
    }
}

pub(crate) fn describe_failures(failures: &[FieldFailure]) -> String {
    failures
        .iter()
        .map(|f| f.to_string())
        .collect::<Vec<String>>()
        .join(", ")
}

/// Validates the personal data of a draft, and that a candidate was picked.
///
/// All the failures are reported, in the order of the fields in the form.
pub fn validate_draft(draft: &BallotDraft) -> Result<(), Vec<FieldFailure>> {
    let fields: [(BallotField, &str); 8] = [
        (BallotField::Candidate, draft.candidate_id.as_str()),
        (BallotField::FullName, &draft.full_name),
        (BallotField::NationalId, &draft.national_id),
        (BallotField::Phone, &draft.phone),
        (BallotField::Department, &draft.department),
        (BallotField::Province, &draft.province),
        (BallotField::District, &draft.district),
        (BallotField::Address, &draft.address),
    ];

    let mut failures: Vec<FieldFailure> = Vec::new();
    for (field, value) in fields.iter() {
        if value.trim().is_empty() {
            failures.push(FieldFailure {
                field: *field,
                problem: FieldProblem::Empty,
            });
        } else if *field == BallotField::NationalId {
            if let Some(problem) = check_national_id(value) {
                failures.push(FieldFailure {
                    field: *field,
                    problem,
                });
            }
        }
    }

    if failures.is_empty() {
        Ok(())
    } else {
        debug!("validate_draft: failures: {:?}", failures);
        Err(failures)
    }
}

// The value is checked as typed: no trimming, truncation or padding.
fn check_national_id(value: &str) -> Option<FieldProblem> {
    let len = value.chars().count();
    if len != NATIONAL_ID_LEN {
        Some(FieldProblem::WrongLength(len))
    } else if !value.chars().all(|c| c.is_ascii_digit()) {
        Some(FieldProblem::NonDigit)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn complete_draft() -> BallotDraft {
        BallotDraft {
            candidate_id: "cand-1".into(),
            full_name: "Rosa Quispe".to_string(),
            national_id: "45873210".to_string(),
            phone: "987654321".to_string(),
            department: "Lima".to_string(),
            province: "Lima".to_string(),
            district: "Miraflores".to_string(),
            address: "Av. Larco 123".to_string(),
        }
    }

    #[test]
    fn accepts_complete_draft() {
        assert_eq!(validate_draft(&complete_draft()), Ok(()));
    }

    #[test]
    fn reports_every_blank_field() {
        let mut draft = complete_draft();
        draft.full_name = "   ".to_string();
        draft.district = String::new();
        let failures = validate_draft(&draft).unwrap_err();
        assert_eq!(
            failures,
            vec![
                FieldFailure {
                    field: BallotField::FullName,
                    problem: FieldProblem::Empty
                },
                FieldFailure {
                    field: BallotField::District,
                    problem: FieldProblem::Empty
                },
            ]
        );
    }

    #[test]
    fn national_id_length_is_exact() {
        let mut draft = complete_draft();
        draft.national_id = "1234567".to_string();
        assert_eq!(
            validate_draft(&draft).unwrap_err()[0].problem,
            FieldProblem::WrongLength(7)
        );

        draft.national_id = "123456789".to_string();
        assert_eq!(
            validate_draft(&draft).unwrap_err()[0].problem,
            FieldProblem::WrongLength(9)
        );

        // Surrounding spaces are not silently removed.
        draft.national_id = " 12345678".to_string();
        assert_eq!(
            validate_draft(&draft).unwrap_err()[0].problem,
            FieldProblem::WrongLength(9)
        );
    }

    #[test]
    fn national_id_only_ascii_digits() {
        let mut draft = complete_draft();
        draft.national_id = "1234567a".to_string();
        assert_eq!(
            validate_draft(&draft).unwrap_err(),
            vec![FieldFailure {
                field: BallotField::NationalId,
                problem: FieldProblem::NonDigit
            }]
        );

        // Arabic-Indic digit eight.
        draft.national_id = "1234567\u{0668}".to_string();
        assert_eq!(
            validate_draft(&draft).unwrap_err()[0].problem,
            FieldProblem::NonDigit
        );
    }

    #[test]
    fn blank_national_id_is_only_reported_once() {
        let mut draft = complete_draft();
        draft.national_id = "        ".to_string();
        assert_eq!(
            validate_draft(&draft).unwrap_err(),
            vec![FieldFailure {
                field: BallotField::NationalId,
                problem: FieldProblem::Empty
            }]
        );
    }

    #[test]
    fn candidate_must_be_picked() {
        let mut draft = complete_draft();
        draft.candidate_id = " ".into();
        draft.address = String::new();
        assert_eq!(
            validate_draft(&draft).unwrap_err(),
            vec![
                FieldFailure {
                    field: BallotField::Candidate,
                    problem: FieldProblem::Empty
                },
                FieldFailure {
                    field: BallotField::Address,
                    problem: FieldProblem::Empty
                },
            ]
        );
    }

    #[test]
    fn failures_read_as_sentences() {
        let mut draft = complete_draft();
        draft.phone = String::new();
        draft.national_id = "12".to_string();
        let failures = validate_draft(&draft).unwrap_err();
        assert_eq!(
            describe_failures(&failures),
            "national ID must have exactly 8 digits (got 2), phone is required"
        );
    }
}
