// @zen-component: RELAY-AccessGuard
//
//! Origin/referer access policy.
//!
//! Every chat request is checked against the configured allow-list before it
//! reaches the handler. Browsers send `Origin` on cross-origin calls and
//! `Referer` on most others, so both headers are consulted.
//!
//! Two matching strategies exist:
//!
//! - [`DomainMatch::Substring`]: a domain matches when `://<domain>`,
//!   `://www.<domain>` or `.<domain>` appears anywhere in the lower-cased
//!   header value. Permissive: `https://evil.com/x.example.com` matches
//!   `example.com`.
//! - [`DomainMatch::Host`]: the header value is parsed as a URL and its host
//!   must equal the domain or be a subdomain of it.

use url::Url;

/// Development origins that are always part of the allowed-origin set.
pub const DEV_ORIGINS: &[&str] = &[
    "http://localhost:3000",
    "http://localhost:8000",
    "http://127.0.0.1:3000",
    "http://127.0.0.1:8000",
];

const LOCAL_HOSTS: &[&str] = &["localhost", "127.0.0.1"];

/// How `Origin`/`Referer` values are compared against configured domains.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DomainMatch {
    /// Substring containment on the raw header value.
    #[default]
    Substring,
    /// Parse the header as a URL and compare the host.
    Host,
}

/// Outcome of evaluating a request against the [`AllowList`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessDecision {
    /// The request may proceed; `cors_origin` is the value for
    /// `Access-Control-Allow-Origin`.
    Granted { cors_origin: String },
    /// The request is rejected.
    Denied,
}

impl AccessDecision {
    pub fn cors_origin(&self) -> Option<&str> {
        match self {
            Self::Granted { cors_origin } => Some(cors_origin),
            Self::Denied => None,
        }
    }
}

/// Configured domains plus the fixed development origins.
///
/// Built once at startup and shared read-only between requests.
#[derive(Debug, Clone, Default)]
pub struct AllowList {
    /// Domains as configured (trimmed, empty entries dropped).
    domains: Vec<String>,
    /// Lower-cased copies of `domains` used for matching.
    normalized: Vec<String>,
    /// Lower-cased allowed origins: `https://<d>`, `https://www.<d>`, dev origins.
    origins: Vec<String>,
    strategy: DomainMatch,
}

impl AllowList {
    /// Build an allow-list from configured domains.
    ///
    /// An empty list is valid: only localhost requests pass.
    pub fn new<I, S>(domains: I, strategy: DomainMatch) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let domains: Vec<String> = domains
            .into_iter()
            .map(|d| d.as_ref().trim().to_string())
            .filter(|d| !d.is_empty())
            .collect();
        let normalized: Vec<String> = domains.iter().map(|d| d.to_lowercase()).collect();

        let mut origins = Vec::with_capacity(normalized.len() * 2 + DEV_ORIGINS.len());
        for domain in &normalized {
            origins.push(format!("https://{domain}"));
            origins.push(format!("https://www.{domain}"));
        }
        origins.extend(DEV_ORIGINS.iter().map(|o| o.to_string()));

        Self {
            domains,
            normalized,
            origins,
            strategy,
        }
    }

    /// Configured domains in their original order.
    pub fn domains(&self) -> &[String] {
        &self.domains
    }

    /// The full allowed-origin set (lower-cased).
    pub fn allowed_origins(&self) -> &[String] {
        &self.origins
    }

    pub fn strategy(&self) -> DomainMatch {
        self.strategy
    }

    /// Case-insensitive exact match of `origin` against the allowed-origin set.
    pub fn is_allowed_origin(&self, origin: &str) -> bool {
        let origin = origin.to_lowercase();
        self.origins.iter().any(|allowed| *allowed == origin)
    }

    /// Whether `origin` or `referer` points at one of the configured domains.
    pub fn is_from_allowed_domain(&self, origin: &str, referer: &str) -> bool {
        match self.strategy {
            DomainMatch::Substring => {
                let origin = origin.to_lowercase();
                let referer = referer.to_lowercase();
                self.normalized.iter().any(|domain| {
                    contains_domain(&referer, domain) || contains_domain(&origin, domain)
                })
            }
            DomainMatch::Host => {
                let hosts = [parse_host(origin), parse_host(referer)];
                self.normalized.iter().any(|domain| {
                    hosts
                        .iter()
                        .flatten()
                        .any(|host| host_matches_domain(host, domain))
                })
            }
        }
    }

    /// Whether `origin` or `referer` refers to a loopback host.
    pub fn is_from_localhost(&self, origin: &str, referer: &str) -> bool {
        match self.strategy {
            DomainMatch::Substring => [origin, referer]
                .iter()
                .any(|value| LOCAL_HOSTS.iter().any(|local| value.contains(local))),
            DomainMatch::Host => [parse_host(origin), parse_host(referer)]
                .iter()
                .flatten()
                .any(|host| LOCAL_HOSTS.contains(&host.as_str())),
        }
    }

    /// Evaluate a request's `Origin` and `Referer` (empty when absent).
    pub fn evaluate(&self, origin: &str, referer: &str) -> AccessDecision {
        let from_localhost = self.is_from_localhost(origin, referer);
        if !from_localhost && !self.is_from_allowed_domain(origin, referer) {
            return AccessDecision::Denied;
        }

        let cors_origin = if from_localhost || self.is_allowed_origin(origin) {
            origin.to_string()
        } else {
            match self.domains.first() {
                Some(domain) => format!("https://{domain}"),
                None => origin.to_string(),
            }
        };

        AccessDecision::Granted { cors_origin }
    }
}

fn contains_domain(value: &str, domain: &str) -> bool {
    value.contains(&format!("://{domain}"))
        || value.contains(&format!("://www.{domain}"))
        || value.contains(&format!(".{domain}"))
}

fn parse_host(value: &str) -> Option<String> {
    let url = Url::parse(value).ok()?;
    url.host_str().map(|h| h.to_lowercase())
}

fn host_matches_domain(host: &str, domain: &str) -> bool {
    host == domain
        || host
            .strip_suffix(domain)
            .is_some_and(|prefix| prefix.ends_with('.'))
}
