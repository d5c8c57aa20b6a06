//! Identity of this instance as seen by federation peers.

use apserve_common::{SelfHosts, host_of};
use url::Url;

/// URL layout for local actors and objects.
#[derive(Debug, Clone)]
pub struct UrlConfig {
    base: String,
}

impl UrlConfig {
    /// Create from the public base URL of the instance.
    #[must_use]
    pub fn new(base_url: &Url) -> Self {
        Self {
            base: base_url.as_str().trim_end_matches('/').to_string(),
        }
    }

    /// The base URL without a trailing slash.
    #[must_use]
    pub fn base(&self) -> &str {
        &self.base
    }

    #[must_use]
    pub fn user_url(&self, user_id: &str) -> String {
        format!("{}/users/{user_id}", self.base)
    }

    #[must_use]
    pub fn key_id(&self, user_id: &str) -> String {
        format!("{}#main-key", self.user_url(user_id))
    }

    #[must_use]
    pub fn inbox_url(&self, user_id: &str) -> String {
        format!("{}/inbox", self.user_url(user_id))
    }

    #[must_use]
    pub fn shared_inbox_url(&self) -> String {
        format!("{}/inbox", self.base)
    }

    #[must_use]
    pub fn outbox_url(&self, user_id: &str) -> String {
        format!("{}/outbox", self.user_url(user_id))
    }

    #[must_use]
    pub fn followers_url(&self, user_id: &str) -> String {
        format!("{}/followers", self.user_url(user_id))
    }

    #[must_use]
    pub fn following_url(&self, user_id: &str) -> String {
        format!("{}/following", self.user_url(user_id))
    }

    #[must_use]
    pub fn featured_url(&self, user_id: &str) -> String {
        format!("{}/collections/featured", self.user_url(user_id))
    }

    #[must_use]
    pub fn profile_url(&self, username: &str) -> String {
        format!("{}/@{username}", self.base)
    }

    #[must_use]
    pub fn note_url(&self, note_id: &str) -> String {
        format!("{}/notes/{note_id}", self.base)
    }

    #[must_use]
    pub fn note_activity_url(&self, note_id: &str) -> String {
        format!("{}/activity", self.note_url(note_id))
    }

    #[must_use]
    pub fn emoji_url(&self, name: &str) -> String {
        format!("{}/emojis/{name}", self.base)
    }

    #[must_use]
    pub fn like_url(&self, reaction_id: &str) -> String {
        format!("{}/likes/{reaction_id}", self.base)
    }

    #[must_use]
    pub fn follow_url(&self, follower_id: &str, followee_id: &str) -> String {
        format!("{}/follows/{follower_id}/{followee_id}", self.base)
    }

    #[must_use]
    pub fn follow_request_url(&self, request_id: &str) -> String {
        format!("{}/follows/{request_id}", self.base)
    }
}

/// The synthetic actor that signs server-to-server requests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceActor {
    pub id: String,
    pub username: String,
    pub public_key_pem: String,
    pub private_key_pem: String,
}

/// Everything the endpoint layer needs to know about this instance.
#[derive(Debug, Clone)]
pub struct LocalIdentity {
    pub urls: UrlConfig,
    pub hosts: SelfHosts,
    pub instance_actor: InstanceActor,
}

impl LocalIdentity {
    /// Create an identity for the instance at `base_url`.
    #[must_use]
    pub fn new(base_url: &Url, alternate_hosts: &[String], instance_actor: InstanceActor) -> Self {
        let primary = base_url.host_str().unwrap_or_default();
        Self {
            urls: UrlConfig::new(base_url),
            hosts: SelfHosts::new(primary, alternate_hosts),
            instance_actor,
        }
    }

    /// Whether a route's user parameter designates the instance actor.
    #[must_use]
    pub fn is_instance_actor(&self, id_or_username: &str) -> bool {
        id_or_username == self.instance_actor.id
            || id_or_username == self.instance_actor.username
    }

    /// Whether `key_id` names the instance actor's key on one of our hosts.
    ///
    /// Accepts `/users/<id or username>` and `/@<username>` actor paths.
    #[must_use]
    pub fn is_instance_actor_key(&self, key_id: &str) -> bool {
        let Some(host) = host_of(key_id) else {
            return false;
        };
        if !self.hosts.is_self_host(Some(&host)) {
            return false;
        }
        let Ok(url) = Url::parse(key_id) else {
            return false;
        };
        let path = url.path().trim_end_matches('/');
        if let Some(name) = path.strip_prefix("/users/") {
            return !name.contains('/') && self.is_instance_actor(name);
        }
        path.strip_prefix("/@")
            .is_some_and(|name| name.eq_ignore_ascii_case(&self.instance_actor.username))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn identity() -> LocalIdentity {
        LocalIdentity::new(
            &Url::parse("https://local.example/").unwrap(),
            &["old.example".to_string()],
            InstanceActor {
                id: "9abc".to_string(),
                username: "instance.actor".to_string(),
                public_key_pem: String::new(),
                private_key_pem: String::new(),
            },
        )
    }

    #[test]
    fn test_urls() {
        let urls = identity().urls;
        assert_eq!(urls.user_url("u1"), "https://local.example/users/u1");
        assert_eq!(urls.key_id("u1"), "https://local.example/users/u1#main-key");
        assert_eq!(
            urls.featured_url("u1"),
            "https://local.example/users/u1/collections/featured"
        );
        assert_eq!(urls.follow_url("a", "b"), "https://local.example/follows/a/b");
    }

    #[test]
    fn test_instance_actor_by_id_or_username() {
        let local = identity();
        assert!(local.is_instance_actor("9abc"));
        assert!(local.is_instance_actor("instance.actor"));
        assert!(!local.is_instance_actor("INSTANCE.ACTOR"));
        assert!(!local.is_instance_actor("alice"));
    }

    #[test]
    fn test_instance_actor_key() {
        let local = identity();
        assert!(local.is_instance_actor_key("https://local.example/users/9abc#main-key"));
        assert!(local.is_instance_actor_key("https://old.example/@instance.actor#main-key"));
        assert!(!local.is_instance_actor_key("https://remote.example/users/9abc#main-key"));
        assert!(!local.is_instance_actor_key("https://local.example/users/alice#main-key"));
    }
}
