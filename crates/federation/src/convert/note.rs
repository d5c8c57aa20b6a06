//! Note -> `ApNote` conversion.

use apserve_db::entities::note::{self, Visibility};

use crate::local::UrlConfig;
use crate::objects::{ApActivity, ApActivityKind, ApNote, ApObjectRef, PUBLIC_COLLECTION};

/// URIs of notes a note refers to, resolved by the caller.
#[derive(Debug, Clone, Default)]
pub struct NoteLinks {
    pub reply: Option<String>,
    pub renote: Option<String>,
}

/// Render plain text as escaped HTML paragraphs.
#[must_use]
pub fn render_content(text: &str) -> String {
    let escaped = html_escape::encode_text(text);
    format!("<p>{}</p>", escaped.replace('\n', "<br>"))
}

fn addressing(visibility: Visibility, followers: String) -> (Vec<String>, Vec<String>) {
    match visibility {
        Visibility::Public => (vec![PUBLIC_COLLECTION.to_string()], vec![followers]),
        Visibility::Home => (vec![followers], vec![PUBLIC_COLLECTION.to_string()]),
        Visibility::Followers => (vec![followers], Vec::new()),
        Visibility::Specified => (Vec::new(), Vec::new()),
    }
}

/// Extension trait for rendering notes.
pub trait NoteToApNote {
    /// The note's `ActivityPub` id.
    fn ap_id(&self, urls: &UrlConfig) -> String;

    /// Convert a local note to `ApNote`.
    fn to_ap_note(&self, urls: &UrlConfig, links: &NoteLinks) -> ApNote;

    /// `Announce` for pure renotes, `Create` otherwise.
    fn to_ap_activity(&self, urls: &UrlConfig, links: &NoteLinks) -> ApActivity;
}

impl NoteToApNote for note::Model {
    fn ap_id(&self, urls: &UrlConfig) -> String {
        self.uri.clone().unwrap_or_else(|| urls.note_url(&self.id))
    }

    fn to_ap_note(&self, urls: &UrlConfig, links: &NoteLinks) -> ApNote {
        let (to, cc) = addressing(self.visibility, urls.followers_url(&self.user_id));
        let text = self.text.as_deref().unwrap_or_default();
        let quote = if self.is_pure_renote() {
            None
        } else {
            links.renote.clone()
        };

        ApNote {
            kind: "Note".to_string(),
            id: self.ap_id(urls),
            attributed_to: urls.user_url(&self.user_id),
            content: render_content(text),
            published: self.created_at.to_utc(),
            to,
            cc,
            sensitive: self.cw.is_some(),
            in_reply_to: links.reply.clone(),
            summary: self.cw.clone(),
            quote_url: quote.clone(),
            misskey_quote: quote,
            misskey_content: self.text.clone(),
        }
    }

    fn to_ap_activity(&self, urls: &UrlConfig, links: &NoteLinks) -> ApActivity {
        let (to, cc) = addressing(self.visibility, urls.followers_url(&self.user_id));
        let (kind, object) = match links.renote {
            Some(ref renote) if self.is_pure_renote() => {
                (ApActivityKind::Announce, ApObjectRef::Uri(renote.clone()))
            }
            _ => (
                ApActivityKind::Create,
                ApObjectRef::Note(Box::new(self.to_ap_note(urls, links))),
            ),
        };

        let mut activity = ApActivity::new(
            kind,
            urls.note_activity_url(&self.id),
            urls.user_url(&self.user_id),
            object,
        );
        activity.published = Some(self.created_at.to_utc());
        activity.to = to;
        activity.cc = cc;
        activity
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::test_utils::{local_note, test_identity};

    #[test]
    fn test_content_is_escaped() {
        assert_eq!(
            render_content("a <script>\nb"),
            "<p>a &lt;script&gt;<br>b</p>"
        );
    }

    #[test]
    fn test_public_note() {
        let urls = test_identity().urls;
        let note = local_note("n1", "u1", "hello");
        let json = serde_json::to_value(note.to_ap_note(&urls, &NoteLinks::default())).unwrap();

        assert_eq!(json["id"], "https://local.example/notes/n1");
        assert_eq!(json["attributedTo"], "https://local.example/users/u1");
        assert_eq!(json["to"][0], PUBLIC_COLLECTION);
        assert_eq!(json["cc"][0], "https://local.example/users/u1/followers");
        assert_eq!(json["_misskey_content"], "hello");
        assert!(json.get("inReplyTo").is_none());
    }

    #[test]
    fn test_home_note_addressing() {
        let urls = test_identity().urls;
        let mut note = local_note("n1", "u1", "hello");
        note.visibility = Visibility::Home;
        let ap = note.to_ap_note(&urls, &NoteLinks::default());
        assert_eq!(ap.to, vec!["https://local.example/users/u1/followers".to_string()]);
        assert_eq!(ap.cc, vec![PUBLIC_COLLECTION.to_string()]);
    }

    #[test]
    fn test_create_and_announce() {
        let urls = test_identity().urls;
        let note = local_note("n1", "u1", "hello");
        let create = note.to_ap_activity(&urls, &NoteLinks::default());
        assert_eq!(create.kind, ApActivityKind::Create);
        assert_eq!(create.id, "https://local.example/notes/n1/activity");

        let mut renote = local_note("n2", "u1", "");
        renote.text = None;
        renote.renote_id = Some("n0".to_string());
        let links = NoteLinks {
            reply: None,
            renote: Some("https://remote.example/notes/x".to_string()),
        };
        let announce = renote.to_ap_activity(&urls, &links);
        assert_eq!(announce.kind, ApActivityKind::Announce);
        let json = serde_json::to_value(&announce).unwrap();
        assert_eq!(json["object"], "https://remote.example/notes/x");
    }

    #[test]
    fn test_quote_links() {
        let urls = test_identity().urls;
        let mut quote = local_note("n3", "u1", "look");
        quote.renote_id = Some("n0".to_string());
        let links = NoteLinks {
            reply: Some("https://remote.example/notes/r".to_string()),
            renote: Some("https://local.example/notes/n0".to_string()),
        };
        let ap = quote.to_ap_note(&urls, &links);
        assert_eq!(ap.quote_url.as_deref(), Some("https://local.example/notes/n0"));
        assert_eq!(ap.in_reply_to.as_deref(), Some("https://remote.example/notes/r"));
    }
}
