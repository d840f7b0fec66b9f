//! Live domain reputation: MX presence, published SPF/DMARC records, a
//! static trust allow-list and DNS blocklist membership.
//!
//! All network access goes through [`NetworkLookup`] so the checker can run
//! against a scripted backend in tests.

use crate::config::{NetworkConfig, Tables};
use anyhow::{Context, Result};
use hickory_resolver::error::{ResolveError, ResolveErrorKind};
use hickory_resolver::TokioAsyncResolver;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::time::Duration;

pub const NO_MX_PENALTY: f64 = 50.0;
pub const DISPOSABLE_PENALTY: f64 = 20.0;

const DOH_STATUS_NOERROR: i64 = 0;
const DOH_STATUS_NXDOMAIN: i64 = 3;
const RECORD_TYPE_A: u16 = 1;

/// Outcome of a single DNS query. Lookups never return `Err`; every failure
/// is a terminal state of its own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DnsAnswer<T> {
    Found(T),
    NotFound,
    TimedOut,
    Failed(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct DohRecord {
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type", default)]
    pub record_type: u16,
    #[serde(default)]
    pub data: String,
}

/// The subset of a JSON DNS-over-HTTPS answer that is inspected.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct DohResponse {
    #[serde(rename = "Status")]
    pub status: i64,
    #[serde(rename = "Answer", default)]
    pub answer: Vec<DohRecord>,
}

pub trait NetworkLookup: Send + Sync {
    fn mx_records(&self, domain: &str) -> impl Future<Output = DnsAnswer<Vec<String>>> + Send;
    fn txt_records(&self, name: &str) -> impl Future<Output = DnsAnswer<Vec<String>>> + Send;
    /// Address lookup through the system resolver.
    fn host_addresses(&self, name: &str) -> impl Future<Output = DnsAnswer<Vec<String>>> + Send;
    /// Type A query against the public DNS-over-HTTPS resolver.
    fn doh_query(&self, name: &str) -> impl Future<Output = Result<DohResponse>> + Send;
}

/// Production backend: the system resolver plus an HTTPS client, each call
/// bounded by the configured timeout.
pub struct LiveLookup {
    resolver: TokioAsyncResolver,
    http: reqwest::Client,
    doh_endpoint: String,
    timeout: Duration,
}

impl LiveLookup {
    pub fn new(config: &NetworkConfig) -> Result<Self> {
        let timeout = Duration::from_secs(config.timeout_seconds);
        let resolver = TokioAsyncResolver::tokio_from_system_conf()
            .context("Failed to create DNS resolver")?;
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to create HTTP client")?;
        Ok(Self {
            resolver,
            http,
            doh_endpoint: config.doh_endpoint.clone(),
            timeout,
        })
    }

    fn classify<T>(name: &str, error: ResolveError) -> DnsAnswer<T> {
        match error.kind() {
            ResolveErrorKind::NoRecordsFound { .. } => DnsAnswer::NotFound,
            _ => {
                log::debug!("DNS lookup failed for {name}: {error}");
                DnsAnswer::Failed(error.to_string())
            }
        }
    }
}

impl NetworkLookup for LiveLookup {
    async fn mx_records(&self, domain: &str) -> DnsAnswer<Vec<String>> {
        match tokio::time::timeout(self.timeout, self.resolver.mx_lookup(domain)).await {
            Ok(Ok(lookup)) => {
                DnsAnswer::Found(lookup.iter().map(|mx| mx.exchange().to_string()).collect())
            }
            Ok(Err(e)) => Self::classify(domain, e),
            Err(_) => {
                log::debug!("MX lookup timed out for {domain}");
                DnsAnswer::TimedOut
            }
        }
    }

    async fn txt_records(&self, name: &str) -> DnsAnswer<Vec<String>> {
        match tokio::time::timeout(self.timeout, self.resolver.txt_lookup(name)).await {
            Ok(Ok(lookup)) => DnsAnswer::Found(
                lookup
                    .iter()
                    .map(|txt| {
                        txt.txt_data()
                            .iter()
                            .map(|chunk| String::from_utf8_lossy(chunk))
                            .collect::<String>()
                    })
                    .collect(),
            ),
            Ok(Err(e)) => Self::classify(name, e),
            Err(_) => {
                log::debug!("TXT lookup timed out for {name}");
                DnsAnswer::TimedOut
            }
        }
    }

    async fn host_addresses(&self, name: &str) -> DnsAnswer<Vec<String>> {
        match tokio::time::timeout(self.timeout, self.resolver.lookup_ip(name)).await {
            Ok(Ok(lookup)) => DnsAnswer::Found(lookup.iter().map(|ip| ip.to_string()).collect()),
            Ok(Err(e)) => Self::classify(name, e),
            Err(_) => {
                log::debug!("Address lookup timed out for {name}");
                DnsAnswer::TimedOut
            }
        }
    }

    async fn doh_query(&self, name: &str) -> Result<DohResponse> {
        let url = url::Url::parse_with_params(&self.doh_endpoint, &[("name", name), ("type", "A")])
            .with_context(|| format!("Invalid DoH endpoint: {}", self.doh_endpoint))?;
        let body = self
            .http
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        serde_json::from_str(&body).context("Undecodable DoH response")
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum DomainTrust {
    Trustworthy,
    Neutral,
    #[default]
    Unknown,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum BlacklistStatus {
    Clean,
    Listed,
    Error,
    /// The blocklist operator refused the resolver that was asked.
    #[serde(rename = "Error (Blocked)")]
    Blocked,
    #[default]
    Unknown,
}

impl fmt::Display for DomainTrust {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            DomainTrust::Trustworthy => "Trustworthy",
            DomainTrust::Neutral => "Neutral",
            DomainTrust::Unknown => "Unknown",
        };
        f.write_str(label)
    }
}

impl fmt::Display for BlacklistStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            BlacklistStatus::Clean => "Clean",
            BlacklistStatus::Listed => "Listed",
            BlacklistStatus::Error => "Error",
            BlacklistStatus::Blocked => "Error (Blocked)",
            BlacklistStatus::Unknown => "Unknown",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReputationReport {
    pub has_mx_records: bool,
    pub live_spf_record: String,
    pub live_dmarc_record: String,
    pub trust: DomainTrust,
    pub blacklist: BlacklistStatus,
    pub is_disposable: bool,
    pub no_mx_penalty: f64,
    pub disposable_penalty: f64,
}

/// `domain` equals an entry or is a subdomain of it.
fn matches_list(domain: &str, list: &[String]) -> bool {
    list.iter().any(|entry| {
        domain == entry
            || domain
                .strip_suffix(entry.as_str())
                .is_some_and(|prefix| prefix.ends_with('.'))
    })
}

pub struct DomainReputationChecker<L: NetworkLookup> {
    lookup: Option<L>,
    trusted: Vec<String>,
    disposable: Vec<String>,
    blocklist_zone: String,
    block_sentinel: String,
}

impl<L: NetworkLookup> DomainReputationChecker<L> {
    /// Without a lookup backend only the static checks run.
    pub fn new(tables: &Tables, network: &NetworkConfig, lookup: Option<L>) -> Self {
        let lower = |list: &[String]| list.iter().map(|d| d.to_lowercase()).collect();
        Self {
            lookup,
            trusted: lower(&tables.trusted_domains),
            disposable: lower(&tables.disposable_domains),
            blocklist_zone: network.blocklist_zone.trim_matches('.').to_string(),
            block_sentinel: network.block_sentinel.clone(),
        }
    }

    pub fn is_online(&self) -> bool {
        self.lookup.is_some()
    }

    pub fn domain_trust(&self, domain: &str) -> DomainTrust {
        if matches_list(domain, &self.trusted) {
            DomainTrust::Trustworthy
        } else {
            DomainTrust::Neutral
        }
    }

    pub fn is_disposable(&self, domain: &str) -> bool {
        matches_list(domain, &self.disposable)
    }

    pub async fn check(&self, domain: &str) -> ReputationReport {
        if domain.is_empty() {
            log::debug!("No sender domain, skipping reputation checks");
            return ReputationReport::default();
        }

        let mut report = ReputationReport {
            trust: self.domain_trust(domain),
            is_disposable: self.is_disposable(domain),
            ..ReputationReport::default()
        };
        if report.is_disposable {
            report.disposable_penalty = DISPOSABLE_PENALTY;
        }

        let Some(lookup) = &self.lookup else {
            log::debug!("Network checks disabled for {domain}");
            return report;
        };

        let dmarc_name = format!("_dmarc.{domain}");
        let (mx, txt, dmarc, blacklist) = tokio::join!(
            lookup.mx_records(domain),
            lookup.txt_records(domain),
            lookup.txt_records(&dmarc_name),
            self.blacklist_status(lookup, domain),
        );

        match mx {
            DnsAnswer::Found(records) if !records.is_empty() => {
                log::debug!("Found {} MX records for {domain}", records.len());
                report.has_mx_records = true;
            }
            other => {
                log::debug!("No MX records for {domain}: {other:?}");
                report.no_mx_penalty = NO_MX_PENALTY;
            }
        }
        report.live_spf_record = first_with_prefix(txt, "v=spf1");
        report.live_dmarc_record = first_with_prefix(dmarc, "v=DMARC1");
        report.blacklist = blacklist;

        log::debug!(
            "Domain {domain}: trust {}, blacklist {}",
            report.trust,
            report.blacklist
        );
        report
    }

    async fn blacklist_status(&self, lookup: &L, domain: &str) -> BlacklistStatus {
        let name = format!("{domain}.{}", self.blocklist_zone);

        match lookup.doh_query(&name).await {
            Ok(response) if response.status == DOH_STATUS_NXDOMAIN => return BlacklistStatus::Clean,
            Ok(response) if response.status == DOH_STATUS_NOERROR => {
                let address = response
                    .answer
                    .iter()
                    .find(|r| r.record_type == RECORD_TYPE_A)
                    .or_else(|| response.answer.first())
                    .map(|r| r.data.as_str());
                match address {
                    None => return BlacklistStatus::Clean,
                    Some(ip) if ip != self.block_sentinel => {
                        log::debug!("{name} is listed ({ip})");
                        return BlacklistStatus::Listed;
                    }
                    Some(_) => {
                        log::debug!("DoH resolver blocked by the blocklist, falling back to system DNS")
                    }
                }
            }
            Ok(response) => log::debug!("DoH status {} for {name}, falling back", response.status),
            Err(e) => log::debug!("DoH query failed for {name}: {e:#}, falling back"),
        }

        match lookup.host_addresses(&name).await {
            DnsAnswer::NotFound => BlacklistStatus::Clean,
            DnsAnswer::Found(addresses) => match addresses.first() {
                None => BlacklistStatus::Clean,
                Some(ip) if *ip == self.block_sentinel => BlacklistStatus::Blocked,
                Some(_) => BlacklistStatus::Listed,
            },
            DnsAnswer::TimedOut => BlacklistStatus::Unknown,
            DnsAnswer::Failed(_) => BlacklistStatus::Error,
        }
    }
}

fn first_with_prefix(answer: DnsAnswer<Vec<String>>, prefix: &str) -> String {
    match answer {
        DnsAnswer::Found(records) => records
            .into_iter()
            .find(|r| r.starts_with(prefix))
            .unwrap_or_default(),
        _ => String::new(),
    }
}
