use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Complete runtime configuration shared by the scorer and the trainer.
///
/// Every section falls back to its built-in defaults, so a YAML file only
/// needs to name what it overrides.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub tables: Tables,
    pub network: NetworkConfig,
    pub paths: PathsConfig,
    pub cache: CacheConfig,
}

/// Static word and domain tables injected into the analyzers at construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Tables {
    pub stop_words: Vec<String>,
    /// Words frequent in the training corpora that carry no phishing signal
    /// (salutations, names, URL fragments, generic filler).
    pub dataset_artifacts: Vec<String>,
    pub positive_words: Vec<String>,
    pub negative_words: Vec<String>,
    pub trigger_phrases: Vec<String>,
    pub suspicious_subject_keywords: Vec<String>,
    pub body_ignore_words: Vec<String>,
    pub subject_ignore_words: Vec<String>,
    pub trusted_domains: Vec<String>,
    pub disposable_domains: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    pub enabled: bool,
    pub timeout_seconds: u64,
    pub doh_endpoint: String,
    pub blocklist_zone: String,
    /// Address the blocklist operator returns to refused open resolvers.
    pub block_sentinel: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    pub stats_file: String,
    pub test_emails_dir: String,
    pub dictionary_file: String,
    pub dictionary_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub clear_interval_seconds: u64,
}

fn words(list: &[&str]) -> Vec<String> {
    list.iter().map(|w| w.to_string()).collect()
}

impl Default for Tables {
    fn default() -> Self {
        Self {
            stop_words: words(&[
                "the", "be", "to", "of", "and", "a", "in", "that", "have", "i", "it", "for",
                "not", "on", "with", "he", "as", "you", "do", "at", "this", "but", "his", "by",
                "from", "they", "we", "say", "her", "she", "or", "an", "will", "my", "one",
                "all", "would", "there", "their", "what", "so", "up", "out", "if", "about",
                "who", "get", "which", "go", "me", "when", "make", "can", "like", "time", "no",
                "just", "him", "know", "take", "people", "into", "year", "your", "good", "some",
                "could", "them", "see", "other", "than", "then", "now", "look", "only", "come",
                "its", "over", "think", "also", "back", "after", "use", "two", "how", "our",
                "work", "first", "well", "way", "even", "new", "want", "because", "any",
                "these", "give", "day", "most", "us", "is", "are", "was", "were", "been", "has",
                "re", "fw", "cc", "pm", "am", "subject", "forwarded", "original", "message",
                "sent", "date", "mail", "mailto", "image", "attached", "file",
            ]),
            dataset_artifacts: words(&[
                "dear", "please", "thank", "thanks", "regards", "sincerely", "hello", "hi",
                "sir", "madam", "jose", "monkey", "john", "james", "david", "michael", "robert",
                "william", "mary", "patricia", "com", "org", "net", "gov", "edu", "mil", "www",
                "http", "https", "html", "php", "here", "below", "above", "following",
                "attached", "received", "sent", "reply", "forward", "today", "tomorrow",
                "yesterday", "soon", "may", "might", "must", "should", "would", "contact",
                "questions", "help", "support", "best", "team", "company", "one", "two",
                "three", "four", "five",
            ]),
            positive_words: words(&[
                "good", "great", "excellent", "best", "love", "happy", "success", "profit",
                "win", "gain", "opportunity", "freedom",
            ]),
            negative_words: words(&[
                "bad", "loss", "failure", "scam", "fraud", "urgent", "danger", "risk", "fear",
                "lose", "limit", "cancel",
            ]),
            trigger_phrases: words(&[
                "act now", "winner", "free", "urgent", "click here", "limited time",
                "guaranteed", "investment", "security", "account", "verify", "suspended",
                "lottery", "prize", "selected",
            ]),
            suspicious_subject_keywords: words(&[
                "urgent", "verify", "account", "suspended", "winner", "lottery", "password",
                "profit", "margin",
            ]),
            body_ignore_words: words(&[
                "email", "service", "customer", "access", "details", "information", "update",
                "support", "team", "contact", "please", "address", "view", "rights",
                "reserved",
            ]),
            subject_ignore_words: words(&["utf"]),
            trusted_domains: words(&[
                "google.com", "gmail.com", "microsoft.com", "outlook.com", "hotmail.com",
                "apple.com", "icloud.com", "amazon.com", "linkedin.com", "paypal.com",
                "slack.com", "acquire.com", "reddit.com", "redditmail.com",
            ]),
            disposable_domains: words(&[
                "mailinator.com", "guerrillamail.com", "10minutemail.com", "tempmail.com",
                "yopmail.com", "trashmail.com", "sharklasers.com", "getnada.com",
                "dispostable.com", "maildrop.cc",
            ]),
        }
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            timeout_seconds: 3,
            doh_endpoint: "https://dns.google/resolve".to_string(),
            blocklist_zone: "dbl.spamhaus.org".to_string(),
            block_sentinel: "127.255.255.254".to_string(),
        }
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            stats_file: "data/linguistic_stats.json".to_string(),
            test_emails_dir: "data/test_emails".to_string(),
            dictionary_file: "data/words_alpha.txt".to_string(),
            dictionary_url:
                "https://raw.githubusercontent.com/dwyl/english-words/master/words_alpha.txt"
                    .to_string(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            clear_interval_seconds: 3600,
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: Config = serde_yaml::from_str(&content)
            .with_context(|| format!("Invalid config file: {}", path.display()))?;
        log::debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Load `path` if given, otherwise use the built-in defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    pub fn write_default(path: &Path) -> Result<()> {
        let yaml = serde_yaml::to_string(&Self::default())?;
        std::fs::write(path, yaml)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;
        Ok(())
    }
}

/// Resolve a data path relative to either the repository root or a
/// command directory two levels below it.
pub fn resolve_data_path(relative: &str) -> PathBuf {
    let direct = PathBuf::from(relative);
    if direct.exists() {
        return direct;
    }
    let up_two = Path::new("../..").join(relative);
    if up_two.exists() {
        return up_two;
    }
    direct
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let yaml = r#"
network:
  timeout_seconds: 1
tables:
  trusted_domains: ["example.org"]
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.network.timeout_seconds, 1);
        assert_eq!(config.network.blocklist_zone, "dbl.spamhaus.org");
        assert_eq!(config.tables.trusted_domains, vec!["example.org".to_string()]);
        assert!(config.tables.stop_words.contains(&"the".to_string()));
        assert_eq!(config.cache.clear_interval_seconds, 3600);
    }

    #[test]
    fn test_default_config_round_trips_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("phish-scorer.yaml");
        Config::write_default(&path).unwrap();

        let loaded = Config::load(&path).unwrap();
        assert_eq!(
            loaded.tables.suspicious_subject_keywords,
            Tables::default().suspicious_subject_keywords
        );
        assert_eq!(loaded.paths.stats_file, "data/linguistic_stats.json");
    }

    #[test]
    fn test_resolve_data_path_falls_back_to_given_path() {
        let path = resolve_data_path("definitely/not/present.json");
        assert_eq!(path, PathBuf::from("definitely/not/present.json"));
    }
}
