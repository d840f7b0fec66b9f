use anyhow::Result;
use phish_scorer::features::domain_reputation::{BlacklistStatus, DnsAnswer, DohResponse, DomainTrust};
use phish_scorer::features::TriggerCategory;
use phish_scorer::stats::{LinguisticStats, WordFreq};
use phish_scorer::{AnalysisResult, Config, FilterEngine, LinguisticReport, NetworkLookup};
use std::collections::HashSet;
use std::sync::Arc;

const DOH_NXDOMAIN: i64 = 3;

/// Every domain in `mail_domains` has MX records; nothing is blocklisted.
#[derive(Default)]
struct StaticDns {
    mail_domains: HashSet<String>,
    spf: Vec<(String, String)>,
}

impl StaticDns {
    fn with_domain(mut self, domain: &str) -> Self {
        self.mail_domains.insert(domain.to_string());
        self
    }

    fn with_spf(mut self, domain: &str, record: &str) -> Self {
        self.spf.push((domain.to_string(), record.to_string()));
        self
    }
}

impl NetworkLookup for StaticDns {
    async fn mx_records(&self, domain: &str) -> DnsAnswer<Vec<String>> {
        if self.mail_domains.contains(domain) {
            DnsAnswer::Found(vec![format!("mx.{domain}.")])
        } else {
            DnsAnswer::NotFound
        }
    }

    async fn txt_records(&self, name: &str) -> DnsAnswer<Vec<String>> {
        let records: Vec<String> = self
            .spf
            .iter()
            .filter(|(domain, _)| domain == name)
            .map(|(_, record)| record.clone())
            .collect();
        if records.is_empty() {
            DnsAnswer::NotFound
        } else {
            DnsAnswer::Found(records)
        }
    }

    async fn host_addresses(&self, _name: &str) -> DnsAnswer<Vec<String>> {
        DnsAnswer::NotFound
    }

    async fn doh_query(&self, _name: &str) -> Result<DohResponse> {
        Ok(DohResponse {
            status: DOH_NXDOMAIN,
            answer: Vec::new(),
        })
    }
}

fn trained_report() -> Arc<LinguisticReport> {
    Arc::new(LinguisticReport {
        safe_stats: LinguisticStats {
            total_emails: 200,
            ..LinguisticStats::default()
        },
        scam_stats: LinguisticStats {
            total_emails: 100,
            top_body_words: vec![WordFreq {
                word: "suspended".to_string(),
                count: 40,
                percent: 40.0,
            }],
            top_subject_words: vec![WordFreq {
                word: "verify".to_string(),
                count: 12,
                percent: 12.0,
            }],
            ..LinguisticStats::default()
        },
    })
}

async fn analyze(lookup: Option<StaticDns>, raw: &str) -> AnalysisResult {
    let engine = FilterEngine::with_lookup(&Config::default(), trained_report(), lookup).unwrap();
    engine.analyze("test.eml", raw.as_bytes()).await
}

#[tokio::test]
async fn spoofed_urgent_message_outscores_clean_control() {
    let phish = "Authentication-Results: mx.example.net; spf=fail smtp.mailfrom=secure-bank.example; dkim=pass; dmarc=fail\n\
                 From: Security Team <alerts@secure-bank.example>\n\
                 Subject: URGENT: Verify your account\n\n\
                 Your account was suspended. It stays suspended until you confirm. \
                 Suspended accounts are removed after two days.";
    let control = "Authentication-Results: mx.example.net; spf=pass; dkim=pass; dmarc=pass\n\
                   From: Ana <ana@friends.example>\n\
                   Subject: Lunch on Friday\n\n\
                   Shall we meet at the usual place around noon?";
    let dns = || {
        Some(
            StaticDns::default()
                .with_domain("secure-bank.example")
                .with_domain("friends.example"),
        )
    };

    let phish = analyze(dns(), phish).await;
    let control = analyze(dns(), control).await;

    assert_eq!(phish.tech_score, 100.0);
    assert_eq!(phish.subject_score, 100.0);
    assert_eq!(phish.body_score, 30.0);
    assert_eq!(phish.risk_factors.suspicious_keywords, vec!["urgent", "verify", "account"]);
    assert_eq!(phish.body_triggers.len(), 1);
    assert_eq!(phish.body_triggers[0].category, TriggerCategory::Body);
    assert_eq!(phish.subject_triggers.len(), 1);
    assert!((phish.scam_probability - 75.5).abs() < 1e-9);

    assert_eq!(control.scam_probability, 0.0);
    assert!(phish.scam_probability > control.scam_probability);
}

#[tokio::test]
async fn empty_body_and_subject_score_zero_text_risk() {
    let result = analyze(
        Some(StaticDns::default().with_domain("example.org")),
        "From: someone@example.org\n\n",
    )
    .await;
    assert_eq!(result.body_score, 0.0);
    assert_eq!(result.subject_score, 0.0);
    assert!(result.body_triggers.is_empty());
    assert!(result.subject_triggers.is_empty());
}

#[tokio::test]
async fn trusted_authenticated_domain_is_minimal_risk() {
    let raw = "Authentication-Results: mx.google.com; spf=pass; dkim=pass; dmarc=pass\n\
               From: PayPal <service@paypal.com>\n\
               Return-Path: <bounce@paypal.com>\n\
               Subject: Your monthly statement\n\n\
               Your statement for March is ready.";
    let dns = StaticDns::default()
        .with_domain("paypal.com")
        .with_spf("paypal.com", "v=spf1 include:pp._spf.paypal.com -all");
    let result = analyze(Some(dns), raw).await;

    assert_eq!(result.risk_factors.domain_trust, DomainTrust::Trustworthy);
    assert_eq!(result.risk_factors.blacklist_status, BlacklistStatus::Clean);
    assert!(result.risk_factors.has_mx_records);
    assert!(result.risk_factors.live_spf_record.starts_with("v=spf1"));
    assert_eq!(result.tech_score, 0.0);
    assert_eq!(result.scam_probability, 0.0);
}

#[tokio::test]
async fn missing_authentication_results_costs_the_base_penalty() {
    let result = analyze(
        Some(StaticDns::default().with_domain("example.org")),
        "From: someone@example.org\nSubject: notes\n\nSee the attached notes.",
    )
    .await;
    assert_eq!(result.tech_score, 25.0);
    assert_eq!(result.score_breakdown.base_score, 10.0);
}

#[tokio::test]
async fn domain_without_mail_exchanger_is_penalized() {
    let result = analyze(
        Some(StaticDns::default()),
        "Authentication-Results: mx; spf=pass; dkim=pass; dmarc=pass\n\
         From: promo@no-mail.example\n\nHello.",
    )
    .await;
    assert!(!result.risk_factors.has_mx_records);
    assert_eq!(result.score_breakdown.no_mx_penalty, 50.0);
    // 50 - 25 bonus = 25 of 40
    assert_eq!(result.tech_score, 62.5);
}

#[tokio::test]
async fn offline_engine_runs_static_checks_only() {
    let result = analyze(
        None,
        "From: someone@mailinator.com\nSubject: hi\n\nhello there",
    )
    .await;
    assert!(result.risk_factors.is_disposable);
    assert_eq!(result.score_breakdown.disposable_penalty, 20.0);
    assert_eq!(result.score_breakdown.no_mx_penalty, 0.0);
    assert_eq!(result.risk_factors.blacklist_status, BlacklistStatus::Unknown);
    // base 10 + disposable 20 = 30 of 40
    assert_eq!(result.tech_score, 75.0);
}

#[tokio::test]
async fn base64_multipart_body_reaches_the_matcher() {
    // "Your mailbox is suspended." in base64
    let raw = "From: it@corp.example\n\
               Subject: mailbox\n\
               MIME-Version: 1.0\n\
               Content-Type: multipart/alternative; boundary=\"b1\"\n\n\
               --b1\n\
               Content-Type: text/plain; charset=utf-8\n\
               Content-Transfer-Encoding: base64\n\n\
               WW91ciBtYWlsYm94IGlzIHN1c3BlbmRlZC4=\n\
               --b1\n\
               Content-Type: text/html\n\n\
               <p>Your mailbox is suspended.</p>\n\
               --b1--\n";
    let result = analyze(Some(StaticDns::default().with_domain("corp.example")), raw).await;
    assert!(result.email_body.contains("mailbox is suspended"));
    assert_eq!(result.body_triggers.len(), 1);
    assert_eq!(result.body_triggers[0].text, "Contains 'suspended'");
}
