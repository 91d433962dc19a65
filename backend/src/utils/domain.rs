//! E-mail domain validation.
//!
//! A domain is acceptable when it looks like a hostname with a short
//! alphabetic TLD and publishes at least one MX or A record.

use async_trait::async_trait;
use hickory_resolver::TokioAsyncResolver;
use hickory_resolver::config::{ResolverConfig, ResolverOpts};
use regex::Regex;
use std::sync::LazyLock;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, warn};

static DOMAIN_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:[-A-Za-z0-9]+\.)+[A-Za-z]{2,6}$").expect("domain pattern compiles")
});

/// Returns the part of `email` after the last `@`, or the whole input when
/// there is none.
pub fn email_domain(email: &str) -> &str {
    email.rsplit_once('@').map_or(email, |(_, domain)| domain)
}

/// Syntactic hostname check: one or more `label.` segments and a 2–6 letter TLD.
pub fn is_valid_domain_format(domain: &str) -> bool {
    DOMAIN_PATTERN.is_match(domain)
}

/// DNS capability used during registration.
#[async_trait]
pub trait DomainResolver: Send + Sync {
    /// True when `domain` has at least one MX or A record.
    async fn has_mail_or_address_record(&self, domain: &str) -> bool;
}

/// Resolver backed by the system DNS configuration.
///
/// Each check is bounded by `timeout`; a lookup that does not finish in time
/// counts as having no records.
pub struct DnsDomainResolver {
    resolver: TokioAsyncResolver,
    timeout: Duration,
}

impl DnsDomainResolver {
    pub fn new(timeout: Duration) -> Self {
        let resolver = TokioAsyncResolver::tokio_from_system_conf().unwrap_or_else(|e| {
            warn!(error = %e, "system DNS configuration unavailable, using defaults");
            TokioAsyncResolver::tokio(ResolverConfig::default(), ResolverOpts::default())
        });

        Self { resolver, timeout }
    }

    async fn lookup(&self, fqdn: &str) -> bool {
        match self.resolver.mx_lookup(fqdn).await {
            Ok(records) if records.iter().next().is_some() => return true,
            Ok(_) => {}
            Err(e) => debug!(domain = fqdn, error = %e, "MX lookup failed"),
        }

        match self.resolver.ipv4_lookup(fqdn).await {
            Ok(records) => records.iter().next().is_some(),
            Err(e) => {
                debug!(domain = fqdn, error = %e, "A lookup failed");
                false
            }
        }
    }
}

#[async_trait]
impl DomainResolver for DnsDomainResolver {
    async fn has_mail_or_address_record(&self, domain: &str) -> bool {
        // Fully qualified so resolver search domains are never appended.
        let fqdn = format!("{}.", domain.trim_end_matches('.'));

        match timeout(self.timeout, self.lookup(&fqdn)).await {
            Ok(found) => found,
            Err(_) => {
                warn!(domain, timeout_secs = self.timeout.as_secs(), "DNS lookup timed out");
                false
            }
        }
    }
}
