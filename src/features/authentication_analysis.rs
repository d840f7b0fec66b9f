use crate::config::Tables;
use crate::message::{domain_of, extract_address, Headers};
use serde::{Deserialize, Serialize};

pub const SPF_FAIL_PENALTY: f64 = 30.0;
pub const DKIM_FAIL_PENALTY: f64 = 30.0;
pub const DMARC_FAIL_PENALTY: f64 = 20.0;
pub const SPF_PASS_BONUS: f64 = 10.0;
pub const DKIM_PASS_BONUS: f64 = 10.0;
pub const DMARC_PASS_BONUS: f64 = 5.0;
/// Applied when there is no `Authentication-Results` header at all.
pub const UNVERIFIED_BASE_PENALTY: f64 = 10.0;
pub const RETURN_PATH_MISMATCH_PENALTY: f64 = 25.0;
pub const REPLY_TO_MISMATCH_PENALTY: f64 = 20.0;
pub const SUBJECT_KEYWORD_PENALTY: f64 = 15.0;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthStatus {
    #[default]
    Unknown,
    Pass,
    Fail,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mechanism {
    Spf,
    Dkim,
    Dmarc,
}

impl Mechanism {
    fn token(self) -> &'static str {
        match self {
            Mechanism::Spf => "spf=",
            Mechanism::Dkim => "dkim=",
            Mechanism::Dmarc => "dmarc=",
        }
    }

    fn is_failure(self, result: &str) -> bool {
        match self {
            Mechanism::Spf => result == "fail" || result == "softfail",
            Mechanism::Dkim | Mechanism::Dmarc => result == "fail",
        }
    }
}

/// Mechanism results reported by an upstream `Authentication-Results` header.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AuthenticationResults {
    pub spf: AuthStatus,
    pub dkim: AuthStatus,
    pub dmarc: AuthStatus,
}

impl AuthenticationResults {
    pub fn parse(header: &str) -> Self {
        let lower = header.to_lowercase();
        Self {
            spf: mechanism_status(&lower, Mechanism::Spf),
            dkim: mechanism_status(&lower, Mechanism::Dkim),
            dmarc: mechanism_status(&lower, Mechanism::Dmarc),
        }
    }
}

/// Any failure wins over a pass for the same mechanism.
fn mechanism_status(lower: &str, mechanism: Mechanism) -> AuthStatus {
    let token = mechanism.token();
    let mut status = AuthStatus::Unknown;
    for (idx, _) in lower.match_indices(token) {
        let at_boundary = lower[..idx]
            .chars()
            .next_back()
            .map_or(true, |c| !c.is_ascii_alphanumeric());
        if !at_boundary {
            continue;
        }
        let value: String = lower[idx + token.len()..]
            .chars()
            .take_while(|c| c.is_ascii_alphabetic())
            .collect();
        if mechanism.is_failure(&value) {
            return AuthStatus::Fail;
        }
        if value == "pass" {
            status = AuthStatus::Pass;
        }
    }
    status
}

/// Header-only signals and their point contributions.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HeaderFindings {
    pub spf_status: AuthStatus,
    pub dkim_status: AuthStatus,
    pub dmarc_status: AuthStatus,
    pub from_return_path_mismatch: bool,
    pub reply_to_mismatch: bool,
    pub suspicious_keywords: Vec<String>,
    /// Lowercased `From` domain, empty when none could be extracted.
    pub domain: String,
    pub subject: String,
    pub base_score: f64,
    pub auth_fail_penalty: f64,
    pub auth_pass_bonus: f64,
    pub mismatch_penalty: f64,
    pub keyword_penalty: f64,
}

pub struct AuthenticationAnalyzer {
    suspicious_keywords: Vec<String>,
}

impl AuthenticationAnalyzer {
    pub fn new(tables: &Tables) -> Self {
        Self {
            suspicious_keywords: tables
                .suspicious_subject_keywords
                .iter()
                .map(|k| k.to_lowercase())
                .filter(|k| !k.is_empty())
                .collect(),
        }
    }

    pub fn analyze(&self, headers: &Headers) -> HeaderFindings {
        let mut findings = HeaderFindings::default();
        self.analyze_authentication_results(headers, &mut findings);
        self.analyze_addresses(headers, &mut findings);
        self.analyze_subject(headers, &mut findings);
        findings
    }

    fn analyze_authentication_results(&self, headers: &Headers, findings: &mut HeaderFindings) {
        let Some(raw) = headers.get("authentication-results").filter(|v| !v.is_empty()) else {
            log::debug!("No Authentication-Results header, provenance unverifiable");
            findings.base_score += UNVERIFIED_BASE_PENALTY;
            return;
        };

        let results = AuthenticationResults::parse(raw);
        let scoring = [
            (results.spf, SPF_FAIL_PENALTY, SPF_PASS_BONUS),
            (results.dkim, DKIM_FAIL_PENALTY, DKIM_PASS_BONUS),
            (results.dmarc, DMARC_FAIL_PENALTY, DMARC_PASS_BONUS),
        ];
        for (status, penalty, bonus) in scoring {
            match status {
                AuthStatus::Fail => findings.auth_fail_penalty += penalty,
                AuthStatus::Pass => findings.auth_pass_bonus += bonus,
                AuthStatus::Unknown => {}
            }
        }
        findings.spf_status = results.spf;
        findings.dkim_status = results.dkim;
        findings.dmarc_status = results.dmarc;
        log::debug!("Authentication results: {results:?}");
    }

    fn analyze_addresses(&self, headers: &Headers, findings: &mut HeaderFindings) {
        let from = headers.decoded("from");
        findings.domain = domain_of(extract_address(&from));
        if findings.domain.is_empty() {
            return;
        }

        let return_path = headers.decoded("return-path");
        let return_path_domain = domain_of(extract_address(&return_path));
        if !return_path_domain.is_empty() && return_path_domain != findings.domain {
            log::debug!(
                "Return-Path domain {return_path_domain} differs from From domain {}",
                findings.domain
            );
            findings.from_return_path_mismatch = true;
            findings.mismatch_penalty += RETURN_PATH_MISMATCH_PENALTY;
        }

        let reply_to = headers.decoded("reply-to");
        let reply_to_domain = domain_of(extract_address(&reply_to));
        if !reply_to_domain.is_empty() && reply_to_domain != findings.domain {
            log::debug!(
                "Reply-To domain {reply_to_domain} differs from From domain {}",
                findings.domain
            );
            findings.reply_to_mismatch = true;
            findings.mismatch_penalty += REPLY_TO_MISMATCH_PENALTY;
        }
    }

    fn analyze_subject(&self, headers: &Headers, findings: &mut HeaderFindings) {
        findings.subject = headers.decoded("subject");
        let lower = findings.subject.to_lowercase();
        for keyword in &self.suspicious_keywords {
            if lower.contains(keyword.as_str()) {
                findings.suspicious_keywords.push(keyword.clone());
                findings.keyword_penalty += SUBJECT_KEYWORD_PENALTY;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::RawMessage;

    fn analyze(raw: &str) -> HeaderFindings {
        let msg = RawMessage::parse(raw.as_bytes());
        AuthenticationAnalyzer::new(&Tables::default()).analyze(msg.headers())
    }

    #[test]
    fn test_parse_authentication_results() {
        let results = AuthenticationResults::parse(
            "mx.google.com; SPF=SoftFail smtp.mailfrom=x.com; dkim=pass header.i=@x.com; dmarc=none",
        );
        assert_eq!(results.spf, AuthStatus::Fail);
        assert_eq!(results.dkim, AuthStatus::Pass);
        assert_eq!(results.dmarc, AuthStatus::Unknown);
    }

    #[test]
    fn test_failure_wins_and_token_boundary() {
        let results = AuthenticationResults::parse("dkim=pass; dkim=fail reason=bad; xspf=pass");
        assert_eq!(results.dkim, AuthStatus::Fail);
        assert_eq!(results.spf, AuthStatus::Unknown);
        // DMARC has no softfail result.
        assert_eq!(AuthenticationResults::parse("dmarc=softfail").dmarc, AuthStatus::Unknown);
    }

    #[test]
    fn test_missing_header_adds_base_penalty() {
        let findings = analyze("From: a@example.com\nSubject: hello\n\nbody");
        assert_eq!(findings.base_score, UNVERIFIED_BASE_PENALTY);
        assert_eq!(findings.auth_fail_penalty, 0.0);
        assert_eq!(findings.spf_status, AuthStatus::Unknown);
    }

    #[test]
    fn test_auth_penalties_and_bonuses() {
        let findings = analyze(
            "Authentication-Results: mx; spf=fail; dkim=pass; dmarc=fail\n\
             From: Bank <alerts@bank.example>\n\n",
        );
        assert_eq!(findings.base_score, 0.0);
        assert_eq!(findings.auth_fail_penalty, 50.0);
        assert_eq!(findings.auth_pass_bonus, 10.0);
        assert_eq!(findings.spf_status, AuthStatus::Fail);
        assert_eq!(findings.dkim_status, AuthStatus::Pass);
    }

    #[test]
    fn test_address_mismatches() {
        let findings = analyze(
            "From: PayPal <service@PayPal.com>\n\
             Return-Path: <bounce@mailer.ru>\n\
             Reply-To: collect@fraud.example\n\n",
        );
        assert_eq!(findings.domain, "paypal.com");
        assert!(findings.from_return_path_mismatch);
        assert!(findings.reply_to_mismatch);
        assert_eq!(findings.mismatch_penalty, 45.0);

        let aligned = analyze(
            "From: service@paypal.com\nReturn-Path: <x@PAYPAL.COM>\nReply-To: broken-address\n\n",
        );
        assert!(!aligned.from_return_path_mismatch);
        assert!(!aligned.reply_to_mismatch);
        assert_eq!(aligned.mismatch_penalty, 0.0);
    }

    #[test]
    fn test_subject_keywords_are_additive() {
        let findings = analyze("Subject: =?utf-8?Q?URGENT=3A_verify_your_account?=\n\n");
        assert_eq!(findings.subject, "URGENT: verify your account");
        assert_eq!(findings.suspicious_keywords, vec!["urgent", "verify", "account"]);
        assert_eq!(findings.keyword_penalty, 45.0);
    }
}
