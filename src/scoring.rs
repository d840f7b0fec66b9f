//! Weighted aggregation of all signals into the three category sub-scores.

use crate::features::authentication_analysis::{AuthStatus, HeaderFindings};
use crate::features::domain_reputation::{BlacklistStatus, DomainTrust, ReputationReport};
use crate::features::linguistic::LinguisticFindings;
use crate::features::LinguisticTrigger;
use serde::Serialize;
use std::collections::BTreeMap;

pub const TECHNICAL_CEILING: f64 = 40.0;
pub const BODY_CEILING: f64 = 50.0;
pub const SUBJECT_CEILING: f64 = 30.0;

pub const TECHNICAL_WEIGHT: f64 = 0.40;
pub const BODY_WEIGHT: f64 = 0.35;
pub const SUBJECT_WEIGHT: f64 = 0.25;

/// Raw point contributions of one message.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ScoreBreakdown {
    pub base_score: f64,
    pub auth_fail_penalty: f64,
    pub auth_pass_bonus: f64,
    pub mismatch_penalty: f64,
    pub keyword_penalty: f64,
    pub no_mx_penalty: f64,
    pub disposable_penalty: f64,
    pub linguistic_penalty: f64,
    pub subject_linguistic_penalty: f64,
    pub total_score: f64,
}

impl ScoreBreakdown {
    pub fn collect(
        header: &HeaderFindings,
        reputation: &ReputationReport,
        linguistic: &LinguisticFindings,
    ) -> Self {
        Self {
            base_score: header.base_score,
            auth_fail_penalty: header.auth_fail_penalty,
            auth_pass_bonus: header.auth_pass_bonus,
            mismatch_penalty: header.mismatch_penalty,
            keyword_penalty: header.keyword_penalty,
            no_mx_penalty: reputation.no_mx_penalty,
            disposable_penalty: reputation.disposable_penalty,
            linguistic_penalty: linguistic.linguistic_penalty,
            subject_linguistic_penalty: linguistic.subject_linguistic_penalty,
            total_score: 0.0,
        }
    }

    pub fn technical_raw(&self) -> f64 {
        self.base_score - self.auth_pass_bonus
            + self.auth_fail_penalty
            + self.mismatch_penalty
            + self.no_mx_penalty
            + self.disposable_penalty
    }

    pub fn body_raw(&self) -> f64 {
        self.linguistic_penalty
    }

    pub fn subject_raw(&self) -> f64 {
        self.keyword_penalty + self.subject_linguistic_penalty
    }
}

/// Sub-scores on a 0-100 scale.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct SubScores {
    pub technical: f64,
    pub body: f64,
    pub subject: f64,
    pub total: f64,
}

fn rescale(raw: f64, ceiling: f64) -> f64 {
    raw.clamp(0.0, ceiling) / ceiling * 100.0
}

/// Compute the sub-scores and record the total in `breakdown`.
pub fn aggregate(breakdown: &mut ScoreBreakdown) -> SubScores {
    let technical = rescale(breakdown.technical_raw(), TECHNICAL_CEILING);
    let body = rescale(breakdown.body_raw(), BODY_CEILING);
    let subject = rescale(breakdown.subject_raw(), SUBJECT_CEILING);
    let total = (technical * TECHNICAL_WEIGHT + body * BODY_WEIGHT + subject * SUBJECT_WEIGHT)
        .min(100.0);
    breakdown.total_score = total;
    SubScores {
        technical,
        body,
        subject,
        total,
    }
}

/// Named signals shown next to the score.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RiskFactors {
    #[serde(rename = "header_spf_status")]
    pub spf_status: AuthStatus,
    #[serde(rename = "header_dkim_status")]
    pub dkim_status: AuthStatus,
    #[serde(rename = "header_dmarc_status")]
    pub dmarc_status: AuthStatus,
    pub from_return_path_mismatch: bool,
    pub reply_to_mismatch: bool,
    pub suspicious_keywords: Vec<String>,

    pub domain: String,
    #[serde(rename = "network_has_mx_records")]
    pub has_mx_records: bool,
    #[serde(rename = "network_live_spf_record")]
    pub live_spf_record: String,
    #[serde(rename = "network_live_dmarc_record")]
    pub live_dmarc_record: String,
    #[serde(rename = "domain_trust_score")]
    pub domain_trust: DomainTrust,
    pub blacklist_status: BlacklistStatus,
    pub is_disposable: bool,

    pub linguistic_triggers: Vec<LinguisticTrigger>,
    pub shouting_score: f64,
}

impl RiskFactors {
    pub fn collect(
        header: &HeaderFindings,
        reputation: &ReputationReport,
        linguistic: &LinguisticFindings,
    ) -> Self {
        Self {
            spf_status: header.spf_status,
            dkim_status: header.dkim_status,
            dmarc_status: header.dmarc_status,
            from_return_path_mismatch: header.from_return_path_mismatch,
            reply_to_mismatch: header.reply_to_mismatch,
            suspicious_keywords: header.suspicious_keywords.clone(),
            domain: header.domain.clone(),
            has_mx_records: reputation.has_mx_records,
            live_spf_record: reputation.live_spf_record.clone(),
            live_dmarc_record: reputation.live_dmarc_record.clone(),
            domain_trust: reputation.trust,
            blacklist_status: reputation.blacklist,
            is_disposable: reputation.is_disposable,
            linguistic_triggers: linguistic
                .body_triggers
                .iter()
                .chain(&linguistic.subject_triggers)
                .cloned()
                .collect(),
            shouting_score: linguistic.shouting_score,
        }
    }
}

/// Everything the presentation layer needs for one analyzed message.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AnalysisResult {
    pub file_name: String,
    #[serde(rename = "scam_probability_percent")]
    pub scam_probability: f64,
    #[serde(rename = "safe_probability_percent")]
    pub safe_probability: f64,
    pub tech_score: f64,
    pub body_score: f64,
    pub subject_score: f64,
    /// Escaped, highlighted text rendition.
    pub email_body: String,
    /// Extracted body with scripts and inline event handlers removed.
    pub html_body: String,
    pub headers: BTreeMap<String, String>,
    pub risk_factors: RiskFactors,
    #[serde(rename = "calculation_details")]
    pub score_breakdown: ScoreBreakdown,
    pub body_triggers: Vec<LinguisticTrigger>,
    pub subject_triggers: Vec<LinguisticTrigger>,
}
