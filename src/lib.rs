pub mod cache;
pub mod config;
pub mod features;
pub mod filter;
pub mod message;
pub mod metrics;
pub mod mime;
pub mod normalization;
pub mod preview;
pub mod scoring;
pub mod service;
pub mod stats;
pub mod trainer;

pub use cache::UploadCache;
pub use config::Config;
pub use features::domain_reputation::{LiveLookup, NetworkLookup};
pub use filter::FilterEngine;
pub use scoring::AnalysisResult;
pub use service::{AnalysisService, MessageSource};
pub use stats::LinguisticReport;
