//! User -> `ApPerson` conversion.

use apserve_db::entities::{user, user_profile};

use super::note::render_content;
use crate::local::UrlConfig;
use crate::objects::{ApActorKind, ApEndpoints, ApImage, ApPerson, ApPublicKey};

/// Extension trait for rendering local users.
pub trait UserToApPerson {
    /// Convert to `ApPerson`.
    fn to_ap_person(
        &self,
        urls: &UrlConfig,
        profile: Option<&user_profile::Model>,
        public_key_pem: &str,
    ) -> ApPerson;

    /// The user's `Key` object.
    fn to_ap_key(&self, urls: &UrlConfig, public_key_pem: &str) -> ApPublicKey;
}

impl UserToApPerson for user::Model {
    fn to_ap_person(
        &self,
        urls: &UrlConfig,
        profile: Option<&user_profile::Model>,
        public_key_pem: &str,
    ) -> ApPerson {
        let kind = if self.username.contains('.') {
            ApActorKind::Application
        } else if self.is_bot {
            ApActorKind::Service
        } else {
            ApActorKind::Person
        };

        ApPerson {
            kind,
            id: urls.user_url(&self.id),
            preferred_username: self.username.clone(),
            inbox: urls.inbox_url(&self.id),
            outbox: urls.outbox_url(&self.id),
            followers: urls.followers_url(&self.id),
            following: urls.following_url(&self.id),
            featured: urls.featured_url(&self.id),
            endpoints: ApEndpoints {
                shared_inbox: urls.shared_inbox_url(),
            },
            url: profile
                .and_then(|p| p.url.clone())
                .unwrap_or_else(|| urls.profile_url(&self.username)),
            manually_approves_followers: self.is_locked,
            public_key: self.to_ap_key(urls, public_key_pem),
            name: self.name.clone(),
            summary: self.description.as_deref().map(render_content),
            misskey_summary: self.description.clone(),
            icon: self.avatar_url.clone().map(ApImage::new),
            image: self.banner_url.clone().map(ApImage::new),
            published: Some(self.created_at.to_utc()),
        }
    }

    fn to_ap_key(&self, urls: &UrlConfig, public_key_pem: &str) -> ApPublicKey {
        ApPublicKey::new(
            urls.key_id(&self.id),
            urls.user_url(&self.id),
            public_key_pem.to_string(),
        )
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::test_utils::{local_user, test_identity};

    #[test]
    fn test_person() {
        let urls = test_identity().urls;
        let mut user = local_user("u1", "alice");
        user.description = Some("hi <b>there</b>".to_string());

        let person = user.to_ap_person(&urls, None, "PEM");
        let json = serde_json::to_value(&person).unwrap();

        assert_eq!(json["type"], "Person");
        assert_eq!(json["id"], "https://local.example/users/u1");
        assert_eq!(json["url"], "https://local.example/@alice");
        assert_eq!(json["publicKey"]["id"], "https://local.example/users/u1#main-key");
        assert_eq!(json["publicKey"]["type"], "Key");
        assert_eq!(json["endpoints"]["sharedInbox"], "https://local.example/inbox");
        assert_eq!(json["summary"], "<p>hi &lt;b&gt;there&lt;/b&gt;</p>");
        assert!(json.get("icon").is_none());
    }

    #[test]
    fn test_actor_kinds() {
        let urls = test_identity().urls;
        let mut bot = local_user("u2", "bot");
        bot.is_bot = true;
        assert_eq!(bot.to_ap_person(&urls, None, "").kind, ApActorKind::Service);

        let system = local_user("u3", "instance.actor");
        assert_eq!(
            system.to_ap_person(&urls, None, "").kind,
            ApActorKind::Application
        );
    }
}
