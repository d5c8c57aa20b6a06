//! Federation compatibility tests.
//!
//! Checks that served documents carry what other `ActivityPub`
//! implementations expect:
//! - Mastodon
//! - Misskey (original)

#![allow(clippy::unwrap_used, clippy::expect_used)]

use apserve_federation::convert::{NoteLinks, NoteToApNote, UserToApPerson, render_like};
use apserve_federation::objects::{PUBLIC_COLLECTION, WithContext};
use apserve_federation::test_utils::{local_note, local_user, test_identity};
use apserve_federation::InboxActivity;
use apserve_db::entities::reaction;
use chrono::Utc;
use serde_json::{Value, json};

fn to_json<T: serde::Serialize>(object: T) -> Value {
    serde_json::to_value(WithContext::new(object)).unwrap()
}

// =============================================================================
// Mastodon Compatibility Tests
// =============================================================================

mod mastodon {
    use super::*;

    /// Mastodon resolves keys through `publicKey.owner` and requires an inbox.
    #[test]
    fn test_person_has_required_fields() {
        let urls = test_identity().urls;
        let person = local_user("u1", "alice").to_ap_person(&urls, None, "PEM");
        let json = to_json(person);

        assert!(json["@context"].is_array());
        for field in ["id", "type", "inbox", "outbox", "followers", "following", "preferredUsername"] {
            assert!(json.get(field).is_some(), "missing {field}");
        }
        assert_eq!(json["publicKey"]["owner"], json["id"]);
        assert_eq!(json["publicKey"]["publicKeyPem"], "PEM");
    }

    #[test]
    fn test_public_note_addressing() {
        let urls = test_identity().urls;
        let note = local_note("n1", "u1", "hello");
        let json = to_json(note.to_ap_note(&urls, &NoteLinks::default()));

        assert_eq!(json["to"], json!([PUBLIC_COLLECTION]));
        assert_eq!(json["cc"], json!(["https://local.example/users/u1/followers"]));
        assert_eq!(json["attributedTo"], "https://local.example/users/u1");
        assert!(json["published"].is_string());
    }

    /// Mastodon sends `Follow` with an embedded actor object at times.
    #[test]
    fn test_follow_with_embedded_actor_parses() {
        let body = json!({
            "id": "https://mastodon.example/1",
            "type": "Follow",
            "actor": {"id": "https://mastodon.example/users/bob", "type": "Person"},
            "object": "https://local.example/users/u1"
        });
        let activity = InboxActivity::parse(body.to_string().as_bytes()).unwrap();
        assert_eq!(activity.kind(), "Follow");
        assert_eq!(activity.actor(), "https://mastodon.example/users/bob");
    }
}

// =============================================================================
// Misskey Compatibility Tests
// =============================================================================

mod misskey {
    use super::*;

    #[test]
    fn test_quote_uses_both_fields() {
        let urls = test_identity().urls;
        let mut note = local_note("n2", "u1", "quoting");
        note.renote_id = Some("n1".to_string());
        let links = NoteLinks {
            reply: None,
            renote: Some("https://local.example/notes/n1".to_string()),
        };
        let json = to_json(note.to_ap_note(&urls, &links));

        assert_eq!(json["quoteUrl"], "https://local.example/notes/n1");
        assert_eq!(json["_misskey_quote"], "https://local.example/notes/n1");
        assert_eq!(json["_misskey_content"], "quoting");
    }

    #[test]
    fn test_like_carries_reaction() {
        let urls = test_identity().urls;
        let reaction = reaction::Model {
            id: "r1".to_string(),
            user_id: "u1".to_string(),
            note_id: "n1".to_string(),
            reaction: ":blobcat:".to_string(),
            created_at: Utc::now().into(),
        };
        let json = to_json(render_like(
            &reaction,
            &urls,
            "https://remote.example/notes/x".to_string(),
        ));

        assert_eq!(json["type"], "Like");
        assert_eq!(json["id"], "https://local.example/likes/r1");
        assert_eq!(json["_misskey_reaction"], ":blobcat:");
        assert_eq!(json["content"], ":blobcat:");
    }

    #[test]
    fn test_emoji_react_reads_misskey_reaction() {
        let body = json!({
            "type": "Like",
            "actor": "https://misskey.example/users/9x",
            "object": "https://local.example/notes/n1",
            "_misskey_reaction": ":awesome:"
        });
        let activity = InboxActivity::parse(body.to_string().as_bytes()).unwrap();
        let InboxActivity::Like(like) = activity else {
            panic!("expected Like");
        };
        assert_eq!(like.content.as_deref(), Some(":awesome:"));
    }
}
