use crate::config::Config;
use crate::features::authentication_analysis::{AuthenticationAnalyzer, HeaderFindings};
use crate::features::domain_reputation::{DomainReputationChecker, LiveLookup, NetworkLookup};
use crate::features::linguistic::{LinguisticFindings, LinguisticMatcher};
use crate::message::RawMessage;
use crate::mime;
use crate::preview::PreviewRenderer;
use crate::scoring::{self, AnalysisResult, RiskFactors, ScoreBreakdown};
use crate::stats::LinguisticReport;
use anyhow::Result;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Per-message analysis pipeline. All state is read-only after construction.
pub struct FilterEngine<L: NetworkLookup = LiveLookup> {
    authentication: AuthenticationAnalyzer,
    reputation: DomainReputationChecker<L>,
    linguistic: LinguisticMatcher,
    preview: PreviewRenderer,
}

impl FilterEngine<LiveLookup> {
    /// Engine with the live DNS backend, or static checks only when the
    /// network is disabled or no resolver could be created.
    pub fn new(config: &Config, report: Arc<LinguisticReport>) -> Result<Self> {
        let lookup = if config.network.enabled {
            match LiveLookup::new(&config.network) {
                Ok(lookup) => Some(lookup),
                Err(e) => {
                    log::warn!("Network checks disabled: {e:#}");
                    None
                }
            }
        } else {
            log::info!("Network checks disabled by configuration");
            None
        };
        Self::with_lookup(config, report, lookup)
    }
}

impl<L: NetworkLookup> FilterEngine<L> {
    pub fn with_lookup(config: &Config, report: Arc<LinguisticReport>, lookup: Option<L>) -> Result<Self> {
        if report.is_empty() {
            log::warn!("Linguistic statistics are empty, body and subject matching contribute nothing");
        }
        Ok(Self {
            authentication: AuthenticationAnalyzer::new(&config.tables),
            reputation: DomainReputationChecker::new(&config.tables, &config.network, lookup),
            linguistic: LinguisticMatcher::new(&config.tables, report)?,
            preview: PreviewRenderer::new()?,
        })
    }

    pub async fn analyze(&self, file_name: &str, raw: &[u8]) -> AnalysisResult {
        let message = RawMessage::parse(raw);
        let headers = message.headers();
        let body = mime::extract_body(raw);
        log::debug!("{file_name}: extracted {} body characters", body.len());

        let header_findings = self.authentication.analyze(headers);
        let clean_body = self.linguistic.normalizer().strip_html(&body);

        let (reputation, linguistic) = tokio::join!(
            self.reputation.check(&header_findings.domain),
            async { self.linguistic.analyze(&clean_body, &header_findings.subject) },
        );

        let mut breakdown = ScoreBreakdown::collect(&header_findings, &reputation, &linguistic);
        let scores = scoring::aggregate(&mut breakdown);
        log::info!(
            "{file_name}: scam probability {:.1}% (technical {:.0}, body {:.0}, subject {:.0})",
            scores.total,
            scores.technical,
            scores.body,
            scores.subject
        );

        let email_body = self
            .preview
            .highlight(&clean_body, &header_findings.suspicious_keywords)
            .unwrap_or_else(|e| {
                log::warn!("Failed to highlight body: {e:#}");
                crate::preview::escape_html(&clean_body).replace('\n', "<br>")
            });

        let risk_factors = RiskFactors::collect(&header_findings, &reputation, &linguistic);
        let LinguisticFindings {
            body_triggers,
            subject_triggers,
            ..
        } = linguistic;

        AnalysisResult {
            file_name: file_name.to_string(),
            scam_probability: scores.total,
            safe_probability: 100.0 - scores.total,
            tech_score: scores.technical,
            body_score: scores.body,
            subject_score: scores.subject,
            email_body,
            html_body: self.preview.sanitize_html(&body),
            headers: header_snapshot(&message, &header_findings),
            risk_factors,
            score_breakdown: breakdown,
            body_triggers,
            subject_triggers,
        }
    }
}

fn header_snapshot(message: &RawMessage, findings: &HeaderFindings) -> BTreeMap<String, String> {
    let headers = message.headers();
    BTreeMap::from([
        ("From".to_string(), headers.decoded("from")),
        ("To".to_string(), headers.decoded("to")),
        ("Subject".to_string(), findings.subject.clone()),
        ("Date".to_string(), headers.raw("date").to_string()),
    ])
}
