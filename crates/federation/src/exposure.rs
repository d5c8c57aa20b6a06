//! Rules deciding which local entities may be exposed over federation.

use apserve_common::SelfHosts;
use apserve_db::entities::{note, user, user_profile::FfVisibility};

/// Cache policy of successful responses when `GET` signatures are not checked.
pub const PUBLIC_CACHE: &str = "public, max-age=180";

/// Cache policy of visibility refusals when `GET` signatures are not checked.
pub const REFUSAL_CACHE: &str = "public, max-age=30";

/// Whether a user may be served at all: local, not suspended, not deleted.
#[must_use]
pub const fn is_exposable_user(user: &user::Model) -> bool {
    user.is_local() && !user.is_suspended && !user.is_deleted
}

/// Whether a note may appear in outbox, featured or single-note responses.
#[must_use]
pub const fn is_listable_note(note: &note::Model) -> bool {
    !note.local_only
        && matches!(
            note.visibility,
            note::Visibility::Public | note::Visibility::Home
        )
}

/// How a request for a single note is answered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NoteExposure {
    /// Render the local note.
    Serve,
    /// Send the requester to the note's origin.
    Redirect(String),
    /// Not eligible, answered as missing.
    NotFound,
    /// A remote note claiming one of our own hosts, or without a URI.
    Inconsistent,
}

/// Decide how to answer for `note`.
#[must_use]
pub fn note_exposure(note: &note::Model, self_hosts: &SelfHosts) -> NoteExposure {
    if !is_listable_note(note) {
        return NoteExposure::NotFound;
    }
    let Some(ref host) = note.user_host else {
        return NoteExposure::Serve;
    };
    if self_hosts.is_self_host(Some(host)) {
        return NoteExposure::Inconsistent;
    }
    note.uri
        .clone()
        .map_or(NoteExposure::Inconsistent, NoteExposure::Redirect)
}

/// Whether a followers or following list with `visibility` may be listed.
#[must_use]
pub const fn is_follow_list_public(visibility: FfVisibility) -> bool {
    matches!(visibility, FfVisibility::Public)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{local_note, local_user, remote_user};

    fn hosts() -> SelfHosts {
        SelfHosts::new("local.example", ["old.example"])
    }

    #[test]
    fn test_user_rules() {
        assert!(is_exposable_user(&local_user("u1", "alice")));
        assert!(!is_exposable_user(&remote_user("r1", "remote.example")));
        let mut suspended = local_user("u1", "alice");
        suspended.is_suspended = true;
        assert!(!is_exposable_user(&suspended));
        let mut deleted = local_user("u1", "alice");
        deleted.is_deleted = true;
        assert!(!is_exposable_user(&deleted));
    }

    #[test]
    fn test_listable_visibility() {
        let mut note = local_note("n1", "u1", "hi");
        assert!(is_listable_note(&note));
        note.visibility = note::Visibility::Home;
        assert!(is_listable_note(&note));
        note.visibility = note::Visibility::Followers;
        assert!(!is_listable_note(&note));
        note.visibility = note::Visibility::Specified;
        assert!(!is_listable_note(&note));

        let mut local_only = local_note("n2", "u1", "hi");
        local_only.local_only = true;
        assert!(!is_listable_note(&local_only));
    }

    #[test]
    fn test_note_exposure() {
        let local = local_note("n1", "u1", "hi");
        assert_eq!(note_exposure(&local, &hosts()), NoteExposure::Serve);

        let mut remote = local_note("n2", "r1", "hi");
        remote.user_host = Some("remote.example".to_string());
        remote.uri = Some("https://remote.example/notes/x".to_string());
        assert_eq!(
            note_exposure(&remote, &hosts()),
            NoteExposure::Redirect("https://remote.example/notes/x".to_string())
        );

        remote.uri = None;
        assert_eq!(note_exposure(&remote, &hosts()), NoteExposure::Inconsistent);

        let mut looped = local_note("n3", "u1", "hi");
        looped.user_host = Some("old.example".to_string());
        looped.uri = Some("https://old.example/notes/n3".to_string());
        assert_eq!(note_exposure(&looped, &hosts()), NoteExposure::Inconsistent);

        let mut hidden = local_note("n4", "u1", "hi");
        hidden.visibility = note::Visibility::Specified;
        assert_eq!(note_exposure(&hidden, &hosts()), NoteExposure::NotFound);
    }

    #[test]
    fn test_follow_list_visibility() {
        assert!(is_follow_list_public(FfVisibility::Public));
        assert!(!is_follow_list_public(FfVisibility::Followers));
        assert!(!is_follow_list_public(FfVisibility::Private));
    }
}
