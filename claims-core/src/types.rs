use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ─── Scalar aliases ───────────────────────────────────────────

/// Externally assigned claim identifier.
pub type ClaimId = i64;

/// Store-assigned actor identifier.
pub type ActorId = i64;

pub const DEFAULT_FLAG_REASON: &str = "Flagged for review";
/// Width of the `claim_flags.reason` column.
pub const MAX_FLAG_REASON_CHARS: usize = 500;

/// Round to cents and fix the scale at two places, so `0` reads `0.00`.
pub fn to_cents(value: Decimal) -> Decimal {
    let mut cents = value.round_dp(2);
    cents.rescale(2);
    cents
}

// ─── Enums ────────────────────────────────────────────────────

/// Adjudication status of a claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ClaimStatus {
    Denied,
    Paid,
    #[serde(rename = "Under Review")]
    UnderReview,
}

impl ClaimStatus {
    pub const ALL: [ClaimStatus; 3] = [Self::Denied, Self::Paid, Self::UnderReview];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Denied => "Denied",
            Self::Paid => "Paid",
            Self::UnderReview => "Under Review",
        }
    }
}

impl fmt::Display for ClaimStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ClaimStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| UnknownVariant {
                kind: "claim status",
                value: s.to_string(),
            })
    }
}

/// Kind of annotation attached to a claim.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NoteType {
    #[default]
    #[serde(rename = "User Note")]
    UserNote,
    #[serde(rename = "Admin Note")]
    AdminNote,
    #[serde(rename = "System Flag")]
    SystemFlag,
}

impl NoteType {
    pub const ALL: [NoteType; 3] = [Self::UserNote, Self::AdminNote, Self::SystemFlag];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UserNote => "User Note",
            Self::AdminNote => "Admin Note",
            Self::SystemFlag => "System Flag",
        }
    }
}

impl fmt::Display for NoteType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NoteType {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| UnknownVariant {
                kind: "note type",
                value: s.to_string(),
            })
    }
}

/// Returned when a stored or submitted string names no enum variant.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind}: {value}")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

// ─── Records ──────────────────────────────────────────────────

/// A stored claim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claim {
    pub id: ClaimId,
    pub patient_name: String,
    pub billed_amount: Decimal,
    pub paid_amount: Decimal,
    pub status: ClaimStatus,
    pub insurer_name: String,
    pub discharge_date: NaiveDate,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Claim {
    pub fn underpayment(&self) -> Decimal {
        self.billed_amount - self.paid_amount
    }

    /// Display identifier, e.g. `P000042`.
    pub fn patient_id(&self) -> String {
        format!("P{:06}", self.id)
    }
}

/// Claim fields supplied by an importer; timestamps are assigned by the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewClaim {
    pub id: ClaimId,
    pub patient_name: String,
    pub billed_amount: Decimal,
    pub paid_amount: Decimal,
    pub status: ClaimStatus,
    pub insurer_name: String,
    pub discharge_date: NaiveDate,
}

impl NewClaim {
    pub fn validate(&self) -> Result<(), String> {
        if self.billed_amount < Decimal::ZERO {
            return Err(format!("claim {}: billed amount is negative", self.id));
        }
        if self.paid_amount < Decimal::ZERO {
            return Err(format!("claim {}: paid amount is negative", self.id));
        }
        Ok(())
    }

    pub fn into_claim(self, now: DateTime<Utc>) -> Claim {
        Claim {
            id: self.id,
            patient_name: self.patient_name,
            billed_amount: to_cents(self.billed_amount),
            paid_amount: to_cents(self.paid_amount),
            status: self.status,
            insurer_name: self.insurer_name,
            discharge_date: self.discharge_date,
            created_at: now,
            updated_at: now,
        }
    }
}

/// A claim as presented to readers, with its derived attributes resolved.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClaimView {
    #[serde(flatten)]
    pub claim: Claim,
    pub patient_id: String,
    pub underpayment: Decimal,
    pub is_flagged: bool,
}

impl ClaimView {
    pub fn new(claim: Claim, flag_count: u64) -> Self {
        Self {
            patient_id: claim.patient_id(),
            underpayment: claim.underpayment(),
            is_flagged: flag_count > 0,
            claim,
        }
    }
}

/// Supplementary claim information.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClaimDetail {
    pub id: i64,
    pub claim_id: ClaimId,
    pub denial_reason: Option<String>,
    pub cpt_codes: String,
}

impl ClaimDetail {
    /// Procedure codes split on commas, trimmed, blanks dropped.
    pub fn cpt_codes_list(&self) -> Vec<&str> {
        self.cpt_codes
            .split(',')
            .map(str::trim)
            .filter(|code| !code.is_empty())
            .collect()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewClaimDetail {
    pub denial_reason: Option<String>,
    pub cpt_codes: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: ActorId,
    pub username: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimFlag {
    pub id: i64,
    pub claim_id: ClaimId,
    pub user_id: ActorId,
    pub reason: String,
    pub flagged_at: DateTime<Utc>,
}

/// A flag joined with the claim and actor it refers to.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FlagActivity {
    #[serde(flatten)]
    pub flag: ClaimFlag,
    pub patient_name: String,
    pub flagged_by: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimNote {
    pub id: i64,
    pub claim_id: ClaimId,
    pub user_id: ActorId,
    pub content: String,
    pub note_type: NoteType,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NoteActivity {
    #[serde(flatten)]
    pub note: ClaimNote,
    pub author: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewClaimNote {
    pub claim_id: ClaimId,
    pub user_id: ActorId,
    pub content: String,
    pub note_type: NoteType,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_claim() -> Claim {
        NewClaim {
            id: 42,
            patient_name: "Ada Lovelace".into(),
            billed_amount: Decimal::new(100000, 2),
            paid_amount: Decimal::new(25050, 2),
            status: ClaimStatus::Denied,
            insurer_name: "Acme Health".into(),
            discharge_date: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
        }
        .into_claim(Utc::now())
    }

    #[test]
    fn underpayment_is_billed_minus_paid() {
        assert_eq!(sample_claim().underpayment(), Decimal::new(74950, 2));
    }

    #[test]
    fn patient_id_is_zero_padded() {
        assert_eq!(sample_claim().patient_id(), "P000042");
    }

    #[test]
    fn status_round_trips_through_display_names() {
        for status in ClaimStatus::ALL {
            assert_eq!(status.as_str().parse::<ClaimStatus>().unwrap(), status);
        }
        assert!("under review".parse::<ClaimStatus>().is_err());
    }

    #[test]
    fn note_type_defaults_to_user_note() {
        assert_eq!(NoteType::default(), NoteType::UserNote);
        assert_eq!("Admin Note".parse::<NoteType>().unwrap(), NoteType::AdminNote);
        let err = "Memo".parse::<NoteType>().unwrap_err();
        assert_eq!(err.to_string(), "unknown note type: Memo");
    }

    #[test]
    fn cpt_codes_are_trimmed_and_blank_tokens_dropped() {
        let detail = ClaimDetail {
            id: 1,
            claim_id: 42,
            denial_reason: None,
            cpt_codes: "99201, 99202,,99203 ,".into(),
        };
        assert_eq!(detail.cpt_codes_list(), vec!["99201", "99202", "99203"]);
    }

    #[test]
    fn negative_amounts_fail_validation() {
        let mut claim = NewClaim {
            id: 7,
            patient_name: "X".into(),
            billed_amount: Decimal::new(-1, 0),
            paid_amount: Decimal::ZERO,
            status: ClaimStatus::Paid,
            insurer_name: "Y".into(),
            discharge_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
        };
        assert!(claim.validate().is_err());
        claim.billed_amount = Decimal::ZERO;
        assert!(claim.validate().is_ok());
    }

    #[test]
    fn amounts_are_stored_with_two_decimal_places() {
        let claim = NewClaim {
            id: 8,
            patient_name: "X".into(),
            billed_amount: Decimal::ZERO,
            paid_amount: Decimal::new(12345, 3),
            status: ClaimStatus::Paid,
            insurer_name: "Y".into(),
            discharge_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
        }
        .into_claim(Utc::now());
        assert_eq!(claim.billed_amount.to_string(), "0.00");
        assert_eq!(claim.paid_amount.to_string(), "12.34");
        assert_eq!(claim.underpayment().to_string(), "-12.34");

        let json = serde_json::to_value(&claim).unwrap();
        assert_eq!(json["billed_amount"], "0.00");
    }

    #[test]
    fn status_serializes_with_display_name() {
        let json = serde_json::to_string(&ClaimStatus::UnderReview).unwrap();
        assert_eq!(json, "\"Under Review\"");
    }
}
