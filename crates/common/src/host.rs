//! Host normalization and per-host federation policy.

use std::collections::HashSet;
use std::sync::{Arc, PoisonError, RwLock};

use url::{Host, Url};

/// Normalize a hostname to its lowercase ASCII (punycode) form.
///
/// Hosts that fail IDNA processing are returned lowercased as-is so that
/// lookups stay total.
#[must_use]
pub fn to_puny(host: &str) -> String {
    let lower = host.trim().to_lowercase();
    match Host::parse(&lower) {
        Ok(Host::Domain(domain)) => domain,
        Ok(other) => other.to_string(),
        Err(_) => lower,
    }
}

/// Extract the normalized hostname from a URI.
#[must_use]
pub fn host_of(uri: &str) -> Option<String> {
    Url::parse(uri).ok()?.host_str().map(to_puny)
}

/// Whether `host` equals or is a subdomain of any entry in `list`.
fn matches_suffix<'a>(list: impl IntoIterator<Item = &'a String>, host: &str) -> bool {
    let host = format!(".{}", to_puny(host));
    list.into_iter().any(|entry| host.ends_with(&format!(".{entry}")))
}

/// Block and silence lists for remote hosts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HostLists {
    /// Hosts whose requests are refused outright.
    pub blocked: HashSet<String>,
    /// Hosts whose activities are accepted but de-emphasized downstream.
    pub silenced: HashSet<String>,
}

impl HostLists {
    /// Build lists from raw host names, normalizing each entry.
    pub fn new<B, S>(blocked: B, silenced: S) -> Self
    where
        B: IntoIterator,
        B::Item: AsRef<str>,
        S: IntoIterator,
        S::Item: AsRef<str>,
    {
        let normalize = |h: &str| to_puny(h.trim_start_matches('.'));
        Self {
            blocked: blocked
                .into_iter()
                .map(|h| normalize(h.as_ref()))
                .filter(|h| !h.is_empty())
                .collect(),
            silenced: silenced
                .into_iter()
                .map(|h| normalize(h.as_ref()))
                .filter(|h| !h.is_empty())
                .collect(),
        }
    }

    /// Whether the host or one of its parent domains is blocked.
    #[must_use]
    pub fn is_blocked(&self, host: &str) -> bool {
        matches_suffix(&self.blocked, host)
    }

    /// Whether the host or one of its parent domains is silenced.
    #[must_use]
    pub fn is_silenced(&self, host: &str) -> bool {
        matches_suffix(&self.silenced, host)
    }
}

/// Process-wide host policy.
///
/// Readers take a short read lock per lookup; the refresh task swaps the whole
/// list set at once.
#[derive(Debug, Clone, Default)]
pub struct HostPolicy {
    inner: Arc<RwLock<HostLists>>,
}

impl HostPolicy {
    /// Create a policy from initial lists.
    #[must_use]
    pub fn new(lists: HostLists) -> Self {
        Self {
            inner: Arc::new(RwLock::new(lists)),
        }
    }

    /// Whether requests from `host` must be refused.
    #[must_use]
    pub fn is_blocked(&self, host: &str) -> bool {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_blocked(host)
    }

    /// Whether `host` is silenced.
    #[must_use]
    pub fn is_silenced(&self, host: &str) -> bool {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_silenced(host)
    }

    /// Replace the current lists.
    pub fn replace(&self, lists: HostLists) {
        *self.inner.write().unwrap_or_else(PoisonError::into_inner) = lists;
    }

    /// Copy of the current lists.
    #[must_use]
    pub fn snapshot(&self) -> HostLists {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

/// The hostnames this instance answers for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelfHosts {
    primary: String,
    alternates: Vec<String>,
}

impl SelfHosts {
    /// Create from the primary hostname and any alternates.
    pub fn new(primary: &str, alternates: impl IntoIterator<Item = impl AsRef<str>>) -> Self {
        Self {
            primary: to_puny(primary),
            alternates: alternates
                .into_iter()
                .map(|h| to_puny(h.as_ref()))
                .collect(),
        }
    }

    /// The primary hostname.
    #[must_use]
    pub fn primary(&self) -> &str {
        &self.primary
    }

    /// Whether `host` names this instance. `None` means a local entity.
    #[must_use]
    pub fn is_self_host(&self, host: Option<&str>) -> bool {
        match host {
            None => true,
            Some(host) => {
                let host = to_puny(host);
                host == self.primary || self.alternates.contains(&host)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_puny_lowercases_and_encodes() {
        assert_eq!(to_puny("Example.COM"), "example.com");
        assert_eq!(to_puny("bücher.example"), "xn--bcher-kva.example");
    }

    #[test]
    fn test_host_of() {
        assert_eq!(
            host_of("https://Remote.Example/users/1#main-key").as_deref(),
            Some("remote.example")
        );
        assert_eq!(host_of("not a uri"), None);
    }

    #[test]
    fn test_blocked_matches_subdomains() {
        let lists = HostLists::new(["evil.example"], Vec::<String>::new());
        assert!(lists.is_blocked("evil.example"));
        assert!(lists.is_blocked("a.b.EVIL.example"));
        assert!(!lists.is_blocked("notevil.example"));
        assert!(!lists.is_blocked("example"));
    }

    #[test]
    fn test_silenced_independent_of_blocked() {
        let lists = HostLists::new(["blocked.example"], ["quiet.example"]);
        assert!(lists.is_silenced("quiet.example"));
        assert!(!lists.is_blocked("quiet.example"));
    }

    #[test]
    fn test_policy_replace_is_visible_to_clones() {
        let policy = HostPolicy::default();
        let reader = policy.clone();
        assert!(!reader.is_blocked("spam.example"));

        policy.replace(HostLists::new(["spam.example"], Vec::<String>::new()));
        assert!(reader.is_blocked("spam.example"));
        assert_eq!(reader.snapshot().blocked.len(), 1);
    }

    #[test]
    fn test_self_hosts() {
        let hosts = SelfHosts::new("local.example", ["OLD.local.example"]);
        assert!(hosts.is_self_host(None));
        assert!(hosts.is_self_host(Some("local.example")));
        assert!(hosts.is_self_host(Some("old.local.example")));
        assert!(!hosts.is_self_host(Some("remote.example")));
    }
}
