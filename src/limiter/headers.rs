//! Quota protocol: header names, list encoding, and the exceeded status
//!
//! The remote advertises limits as `threshold:period` pairs and usage as
//! `count:period` pairs, comma separated, e.g. `20:1,100:120`.

use std::time::Duration;

use reqwest::header::HeaderMap;
use reqwest::StatusCode;

use crate::config::{QuotaProtocolConfig, WindowConfig};
use crate::error::QuotaHeaderError;

/// One `value:period` element of a quota header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuotaPair {
    /// Threshold or count, depending on the header
    pub value: u32,
    /// Window length
    pub period: Duration,
}

impl QuotaPair {
    /// Create a pair
    pub const fn new(value: u32, period: Duration) -> Self {
        Self { value, period }
    }
}

impl From<WindowConfig> for QuotaPair {
    fn from(w: WindowConfig) -> Self {
        QuotaPair::new(w.threshold, Duration::from_secs(w.period_secs))
    }
}

/// Parse a `value:period,value:period` list
pub fn parse_pairs(header: &str, raw: &str) -> Result<Vec<QuotaPair>, QuotaHeaderError> {
    let malformed = || QuotaHeaderError::Malformed {
        header: header.to_string(),
        value: raw.to_string(),
    };

    let pairs = raw
        .split(',')
        .map(|item| {
            let (value, period) = item.trim().split_once(':').ok_or_else(malformed)?;
            let value = value.trim().parse::<u32>().map_err(|_| malformed())?;
            let period = period.trim().parse::<u64>().map_err(|_| malformed())?;
            Ok(QuotaPair::new(value, Duration::from_secs(period)))
        })
        .collect::<Result<Vec<_>, QuotaHeaderError>>()?;

    if pairs.is_empty() {
        return Err(malformed());
    }
    Ok(pairs)
}

/// Quota state carried by one response
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResponseQuota {
    /// Application-scope limit definitions
    pub app_limits: Option<Vec<QuotaPair>>,
    /// Application-scope usage
    pub app_counts: Option<Vec<QuotaPair>>,
    /// Method-scope limit definitions
    pub method_limits: Option<Vec<QuotaPair>>,
    /// Method-scope usage
    pub method_counts: Option<Vec<QuotaPair>>,
    /// Server retry hint
    pub retry_after: Option<Duration>,
}

impl ResponseQuota {
    /// Longest period whose reported count reached its reported threshold
    pub fn saturated_period(&self) -> Option<Duration> {
        let scopes = [
            (&self.app_limits, &self.app_counts),
            (&self.method_limits, &self.method_counts),
        ];

        scopes
            .into_iter()
            .filter_map(|(limits, counts)| Some((limits.as_ref()?, counts.as_ref()?)))
            .flat_map(|(limits, counts)| {
                counts.iter().filter_map(move |count| {
                    limits
                        .iter()
                        .find(|l| l.period == count.period)
                        .filter(|l| count.value >= l.value)
                        .map(|l| l.period)
                })
            })
            .max()
    }
}

/// Header names and status code of the remote quota protocol
#[derive(Debug, Clone)]
pub struct QuotaProtocol {
    app_limit_header: String,
    app_count_header: String,
    method_limit_header: String,
    method_count_header: String,
    retry_after_header: String,
    quota_exceeded: StatusCode,
}

impl QuotaProtocol {
    /// Build from configuration
    ///
    /// An out-of-range status code falls back to 429.
    pub fn from_config(config: &QuotaProtocolConfig) -> Self {
        Self {
            app_limit_header: config.app_limit_header.clone(),
            app_count_header: config.app_count_header.clone(),
            method_limit_header: config.method_limit_header.clone(),
            method_count_header: config.method_count_header.clone(),
            retry_after_header: config.retry_after_header.clone(),
            quota_exceeded: StatusCode::from_u16(config.quota_exceeded_status)
                .unwrap_or(StatusCode::TOO_MANY_REQUESTS),
        }
    }

    /// True when `status` signals an exceeded quota
    pub fn is_quota_exceeded(&self, status: StatusCode) -> bool {
        status == self.quota_exceeded
    }

    /// Read quota headers from a response
    ///
    /// With `strict`, all four quota headers must be present and well formed.
    /// Otherwise missing or unparsable headers are reported as absent.
    pub fn read(&self, headers: &HeaderMap, strict: bool) -> Result<ResponseQuota, QuotaHeaderError> {
        let read = |name: &str| -> Result<Option<Vec<QuotaPair>>, QuotaHeaderError> {
            let parsed = match headers.get(name) {
                None => Err(QuotaHeaderError::Missing(name.to_string())),
                Some(value) => match value.to_str() {
                    Ok(raw) => parse_pairs(name, raw),
                    Err(_) => Err(QuotaHeaderError::Malformed {
                        header: name.to_string(),
                        value: String::from_utf8_lossy(value.as_bytes()).into_owned(),
                    }),
                },
            };
            match parsed {
                Ok(pairs) => Ok(Some(pairs)),
                Err(err) if strict => Err(err),
                Err(_) => Ok(None),
            }
        };

        let retry_after = headers
            .get(self.retry_after_header.as_str())
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok())
            .map(Duration::from_secs);

        Ok(ResponseQuota {
            app_limits: read(&self.app_limit_header)?,
            app_counts: read(&self.app_count_header)?,
            method_limits: read(&self.method_limit_header)?,
            method_counts: read(&self.method_count_header)?,
            retry_after,
        })
    }
}

impl Default for QuotaProtocol {
    fn default() -> Self {
        Self::from_config(&QuotaProtocolConfig::default())
    }
}
