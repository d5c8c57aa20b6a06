//! Test utilities: RSA keys, an in-memory store, a stub key fetcher and a
//! recording inbox queue.

#![allow(clippy::missing_panics_doc, clippy::unwrap_used, clippy::expect_used)]

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, OnceLock};

use async_trait::async_trait;
use axum::http::{HeaderMap, Method};
use chrono::Utc;
use pkcs8::{EncodePrivateKey, EncodePublicKey, LineEnding};
use rsa::RsaPrivateKey;
use serde_json::json;
use url::Url;

use apserve_common::{AppError, AppResult};
use apserve_db::entities::{
    emoji, follow_request, following, note, reaction, user, user_keypair, user_note_pining,
    user_profile, user_publickey,
};

use crate::client::ApClientError;
use crate::intake::{InboxJob, InboxQueue};
use crate::local::{InstanceActor, LocalIdentity};
use crate::request::ApRequest;
use crate::resolver::{FetchedKey, KeyFetcher};
use crate::signature::HttpSigner;
use crate::store::FederationStore;

/// Base URL of the instance in tests.
pub const LOCAL_URL: &str = "https://local.example";

/// An RSA keypair in PEM form.
#[derive(Debug, Clone)]
pub struct TestKeys {
    pub private_pem: String,
    pub public_pem: String,
}

impl TestKeys {
    /// Generate a fresh keypair.
    #[must_use]
    pub fn generate() -> Self {
        let private_key = RsaPrivateKey::new(&mut rand::thread_rng(), 1024).expect("keygen");
        Self {
            private_pem: private_key
                .to_pkcs8_pem(LineEnding::LF)
                .expect("encode private key")
                .to_string(),
            public_pem: private_key
                .to_public_key()
                .to_public_key_pem(LineEnding::LF)
                .expect("encode public key"),
        }
    }

    /// A keypair shared by all tests in the process.
    pub fn shared() -> &'static Self {
        static KEYS: OnceLock<TestKeys> = OnceLock::new();
        KEYS.get_or_init(Self::generate)
    }

    /// The instance actor's keypair.
    pub fn instance() -> &'static Self {
        static KEYS: OnceLock<TestKeys> = OnceLock::new();
        KEYS.get_or_init(Self::generate)
    }
}

/// Identity of the test instance at [`LOCAL_URL`], answering for `old.example` too.
#[must_use]
pub fn test_identity() -> LocalIdentity {
    let keys = TestKeys::instance();
    LocalIdentity::new(
        &Url::parse(LOCAL_URL).expect("url"),
        &["old.example".to_string()],
        InstanceActor {
            id: "instanceactor".to_string(),
            username: "instance.actor".to_string(),
            public_key_pem: keys.public_pem.clone(),
            private_key_pem: keys.private_pem.clone(),
        },
    )
}

/// Signature headers for a request to `path` on [`LOCAL_URL`].
#[must_use]
pub fn sign_headers(
    keys: &TestKeys,
    key_id: &str,
    method: &Method,
    path: &str,
    body: Option<&[u8]>,
) -> HeaderMap {
    let signer = HttpSigner::new(&keys.private_pem, key_id.to_string()).expect("signer");
    let url = Url::parse(&format!("{LOCAL_URL}{path}")).expect("url");
    signer
        .sign_request(method.as_str(), &url, body)
        .expect("sign")
}

/// A signed request to `path` on [`LOCAL_URL`].
#[must_use]
pub fn signed_request(
    keys: &TestKeys,
    key_id: &str,
    method: Method,
    path: &str,
    body: Option<&[u8]>,
) -> ApRequest {
    let headers = sign_headers(keys, key_id, &method, path, body);
    ApRequest::new(method, path.parse().expect("uri"), headers)
}

/// A key as served by a remote actor document.
#[must_use]
pub fn fetched_key(actor_uri: &str, keys: &TestKeys) -> FetchedKey {
    FetchedKey {
        actor_id: actor_uri.to_string(),
        key_id: format!("{actor_uri}#main-key"),
        owner: actor_uri.to_string(),
        pem: keys.public_pem.clone(),
    }
}

/// A local user.
#[must_use]
pub fn local_user(id: &str, username: &str) -> user::Model {
    user::Model {
        id: id.to_string(),
        username: username.to_string(),
        username_lower: username.to_lowercase(),
        host: None,
        name: Some(username.to_string()),
        description: None,
        avatar_url: None,
        banner_url: None,
        is_bot: false,
        is_locked: false,
        is_suspended: false,
        is_deleted: false,
        inbox: None,
        shared_inbox: None,
        featured: None,
        uri: None,
        created_at: Utc::now().into(),
        updated_at: None,
    }
}

/// A remote user whose URI is `https://<host>/users/<id>`.
#[must_use]
pub fn remote_user(id: &str, host: &str) -> user::Model {
    let uri = format!("https://{host}/users/{id}");
    user::Model {
        host: Some(host.to_string()),
        inbox: Some(format!("{uri}/inbox")),
        shared_inbox: Some(format!("https://{host}/inbox")),
        uri: Some(uri),
        ..local_user(id, id)
    }
}

/// A public local note.
#[must_use]
pub fn local_note(id: &str, user_id: &str, text: &str) -> note::Model {
    note::Model {
        id: id.to_string(),
        user_id: user_id.to_string(),
        user_host: None,
        text: Some(text.to_string()),
        cw: None,
        visibility: note::Visibility::Public,
        local_only: false,
        reply_id: None,
        renote_id: None,
        file_ids: json!([]),
        has_poll: false,
        uri: None,
        url: None,
        created_at: Utc::now().into(),
        updated_at: None,
    }
}

/// A following edge.
#[must_use]
pub fn follow_edge(id: &str, follower: &user::Model, followee: &user::Model) -> following::Model {
    following::Model {
        id: id.to_string(),
        follower_id: follower.id.clone(),
        followee_id: followee.id.clone(),
        follower_host: follower.host.clone(),
        followee_host: followee.host.clone(),
        created_at: Utc::now().into(),
    }
}

#[derive(Default)]
struct Tables {
    users: BTreeMap<String, user::Model>,
    profiles: HashMap<String, user_profile::Model>,
    keypairs: HashMap<String, user_keypair::Model>,
    public_keys: HashMap<String, user_publickey::Model>,
    notes: BTreeMap<String, note::Model>,
    pinings: Vec<user_note_pining::Model>,
    followings: BTreeMap<String, following::Model>,
    follow_requests: HashMap<String, follow_request::Model>,
    emojis: Vec<emoji::Model>,
    reactions: HashMap<String, reaction::Model>,
}

/// In-memory [`FederationStore`].
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    fn tables(&self) -> std::sync::MutexGuard<'_, Tables> {
        self.tables.lock().expect("store lock")
    }

    pub fn add_user(&self, user: user::Model) {
        self.tables().users.insert(user.id.clone(), user);
    }

    pub fn add_profile(&self, user_id: &str, followers: user_profile::FfVisibility) {
        let profile = user_profile::Model {
            user_id: user_id.to_string(),
            followers_visibility: followers,
            following_visibility: followers,
            url: None,
            created_at: Utc::now().into(),
            updated_at: None,
        };
        self.tables().profiles.insert(user_id.to_string(), profile);
    }

    pub fn add_keypair(&self, user_id: &str, keys: &TestKeys) {
        let keypair = user_keypair::Model {
            user_id: user_id.to_string(),
            public_key: keys.public_pem.clone(),
            private_key: keys.private_pem.clone(),
            key_id: format!("{LOCAL_URL}/users/{user_id}#main-key"),
            created_at: Utc::now().into(),
        };
        self.tables().keypairs.insert(user_id.to_string(), keypair);
    }

    pub fn add_public_key(&self, user_id: &str, key_id: &str, pem: &str) {
        let key = user_publickey::Model {
            user_id: user_id.to_string(),
            key_id: key_id.to_string(),
            key_pem: pem.to_string(),
        };
        self.tables().public_keys.insert(user_id.to_string(), key);
    }

    pub fn clear_public_keys(&self) {
        self.tables().public_keys.clear();
    }

    /// Stored key PEM of a remote user.
    #[must_use]
    pub fn public_key_pem(&self, user_id: &str) -> Option<String> {
        self.tables()
            .public_keys
            .get(user_id)
            .map(|k| k.key_pem.clone())
    }

    pub fn add_note(&self, note: note::Model) {
        self.tables().notes.insert(note.id.clone(), note);
    }

    pub fn pin(&self, id: &str, user_id: &str, note_id: &str) {
        self.tables().pinings.push(user_note_pining::Model {
            id: id.to_string(),
            user_id: user_id.to_string(),
            note_id: note_id.to_string(),
            created_at: Utc::now().into(),
        });
    }

    pub fn add_following(&self, edge: following::Model) {
        self.tables().followings.insert(edge.id.clone(), edge);
    }

    pub fn add_follow_request(&self, request: follow_request::Model) {
        self.tables()
            .follow_requests
            .insert(request.id.clone(), request);
    }

    pub fn add_emoji(&self, emoji: emoji::Model) {
        self.tables().emojis.push(emoji);
    }

    pub fn add_reaction(&self, reaction: reaction::Model) {
        self.tables().reactions.insert(reaction.id.clone(), reaction);
    }
}

fn is_federated(note: &note::Model, user_id: &str) -> bool {
    note.user_id == user_id
        && !note.local_only
        && matches!(
            note.visibility,
            note::Visibility::Public | note::Visibility::Home
        )
}

fn take_window<T: Clone>(
    items: impl DoubleEndedIterator<Item = (String, T)>,
    since_id: Option<&str>,
    until_id: Option<&str>,
    take: u64,
) -> Vec<T> {
    let take = usize::try_from(take).unwrap_or(usize::MAX);
    match since_id {
        Some(since) => items
            .filter(|(id, _)| id.as_str() > since)
            .take(take)
            .map(|(_, item)| item)
            .collect(),
        None => items
            .rev()
            .filter(|(id, _)| until_id.is_none_or(|until| id.as_str() < until))
            .take(take)
            .map(|(_, item)| item)
            .collect(),
    }
}

#[async_trait]
impl FederationStore for MemoryStore {
    async fn find_local_user(&self, id: &str) -> AppResult<Option<user::Model>> {
        Ok(self.tables().users.get(id).filter(|u| u.is_local()).cloned())
    }

    async fn find_local_user_by_username(
        &self,
        username: &str,
    ) -> AppResult<Option<user::Model>> {
        let lower = username.to_lowercase();
        Ok(self
            .tables()
            .users
            .values()
            .find(|u| u.is_local() && u.username_lower == lower)
            .cloned())
    }

    async fn find_user(&self, id: &str) -> AppResult<Option<user::Model>> {
        Ok(self.tables().users.get(id).cloned())
    }

    async fn find_users(&self, ids: &[String]) -> AppResult<Vec<user::Model>> {
        let tables = self.tables();
        Ok(ids.iter().filter_map(|id| tables.users.get(id).cloned()).collect())
    }

    async fn find_remote_user_by_uri(&self, uri: &str) -> AppResult<Option<user::Model>> {
        Ok(self
            .tables()
            .users
            .values()
            .find(|u| !u.is_local() && u.uri.as_deref() == Some(uri))
            .cloned())
    }

    async fn find_profile(&self, user_id: &str) -> AppResult<Option<user_profile::Model>> {
        Ok(self.tables().profiles.get(user_id).cloned())
    }

    async fn find_keypair(&self, user_id: &str) -> AppResult<Option<user_keypair::Model>> {
        Ok(self.tables().keypairs.get(user_id).cloned())
    }

    async fn find_public_key_by_key_id(
        &self,
        key_id: &str,
    ) -> AppResult<Option<user_publickey::Model>> {
        Ok(self
            .tables()
            .public_keys
            .values()
            .find(|k| k.key_id == key_id)
            .cloned())
    }

    async fn find_public_key_by_user(
        &self,
        user_id: &str,
    ) -> AppResult<Option<user_publickey::Model>> {
        Ok(self.tables().public_keys.get(user_id).cloned())
    }

    async fn save_public_key(&self, key: user_publickey::Model) -> AppResult<()> {
        self.tables().public_keys.insert(key.user_id.clone(), key);
        Ok(())
    }

    async fn find_note(&self, id: &str) -> AppResult<Option<note::Model>> {
        Ok(self.tables().notes.get(id).cloned())
    }

    async fn find_notes(&self, ids: &[String]) -> AppResult<Vec<note::Model>> {
        let tables = self.tables();
        Ok(ids.iter().filter_map(|id| tables.notes.get(id).cloned()).collect())
    }

    async fn outbox_window(
        &self,
        user_id: &str,
        since_id: Option<&str>,
        until_id: Option<&str>,
        take: u64,
    ) -> AppResult<Vec<note::Model>> {
        let tables = self.tables();
        let notes = tables
            .notes
            .iter()
            .filter(|(_, n)| is_federated(n, user_id))
            .map(|(id, n)| (id.clone(), n.clone()));
        Ok(take_window(notes, since_id, until_id, take))
    }

    async fn count_outbox(&self, user_id: &str) -> AppResult<u64> {
        let tables = self.tables();
        Ok(tables
            .notes
            .values()
            .filter(|n| is_federated(n, user_id))
            .count() as u64)
    }

    async fn pinned_notes(&self, user_id: &str) -> AppResult<Vec<user_note_pining::Model>> {
        let mut pins: Vec<_> = self
            .tables()
            .pinings
            .iter()
            .filter(|p| p.user_id == user_id)
            .cloned()
            .collect();
        pins.sort_by(|a, b| b.id.cmp(&a.id));
        Ok(pins)
    }

    async fn followers_window(
        &self,
        user_id: &str,
        until_id: Option<&str>,
        take: u64,
    ) -> AppResult<Vec<following::Model>> {
        let tables = self.tables();
        let edges = tables
            .followings
            .iter()
            .filter(|(_, f)| f.followee_id == user_id)
            .map(|(id, f)| (id.clone(), f.clone()));
        Ok(take_window(edges, None, until_id, take))
    }

    async fn following_window(
        &self,
        user_id: &str,
        until_id: Option<&str>,
        take: u64,
    ) -> AppResult<Vec<following::Model>> {
        let tables = self.tables();
        let edges = tables
            .followings
            .iter()
            .filter(|(_, f)| f.follower_id == user_id)
            .map(|(id, f)| (id.clone(), f.clone()));
        Ok(take_window(edges, None, until_id, take))
    }

    async fn count_followers(&self, user_id: &str) -> AppResult<u64> {
        Ok(self
            .tables()
            .followings
            .values()
            .filter(|f| f.followee_id == user_id)
            .count() as u64)
    }

    async fn count_following(&self, user_id: &str) -> AppResult<u64> {
        Ok(self
            .tables()
            .followings
            .values()
            .filter(|f| f.follower_id == user_id)
            .count() as u64)
    }

    async fn find_following_pair(
        &self,
        follower_id: &str,
        followee_id: &str,
    ) -> AppResult<Option<following::Model>> {
        Ok(self
            .tables()
            .followings
            .values()
            .find(|f| f.follower_id == follower_id && f.followee_id == followee_id)
            .cloned())
    }

    async fn find_follow_request(&self, id: &str) -> AppResult<Option<follow_request::Model>> {
        Ok(self.tables().follow_requests.get(id).cloned())
    }

    async fn find_local_emoji(&self, name: &str) -> AppResult<Option<emoji::Model>> {
        Ok(self
            .tables()
            .emojis
            .iter()
            .find(|e| e.host.is_none() && e.name == name)
            .cloned())
    }

    async fn find_reaction(&self, id: &str) -> AppResult<Option<reaction::Model>> {
        Ok(self.tables().reactions.get(id).cloned())
    }
}

/// [`KeyFetcher`] returning a preset key and recording requested URIs.
#[derive(Default)]
pub struct StubFetcher {
    key: Mutex<Option<FetchedKey>>,
    requested: Mutex<Vec<String>>,
    calls: AtomicUsize,
}

impl StubFetcher {
    /// A fetcher that always returns `key`.
    #[must_use]
    pub fn returning(key: FetchedKey) -> Self {
        let fetcher = Self::default();
        fetcher.set(Some(key));
        fetcher
    }

    /// A fetcher whose fetches all fail.
    #[must_use]
    pub fn failing() -> Self {
        Self::default()
    }

    /// Replace the key served from now on.
    pub fn set(&self, key: Option<FetchedKey>) {
        *self.key.lock().expect("fetcher lock") = key;
    }

    /// Number of fetches performed.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// URIs requested so far.
    #[must_use]
    pub fn requested(&self) -> Vec<String> {
        self.requested.lock().expect("fetcher lock").clone()
    }
}

#[async_trait]
impl KeyFetcher for StubFetcher {
    async fn fetch_key(&self, actor_uri: &str) -> Result<FetchedKey, ApClientError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requested
            .lock()
            .expect("fetcher lock")
            .push(actor_uri.to_string());
        self.key
            .lock()
            .expect("fetcher lock")
            .clone()
            .ok_or(ApClientError::FetchFailed { status: 404 })
    }
}

/// [`InboxQueue`] that keeps jobs in memory.
#[derive(Default)]
pub struct RecordingQueue {
    jobs: Mutex<Vec<InboxJob>>,
    fail: bool,
}

impl RecordingQueue {
    /// A queue whose enqueues all fail.
    #[must_use]
    pub fn failing() -> Self {
        Self {
            jobs: Mutex::default(),
            fail: true,
        }
    }

    /// Jobs enqueued so far.
    #[must_use]
    pub fn jobs(&self) -> Vec<InboxJob> {
        self.jobs.lock().expect("queue lock").clone()
    }
}

#[async_trait]
impl InboxQueue for RecordingQueue {
    async fn enqueue(&self, job: InboxJob) -> AppResult<()> {
        if self.fail {
            return Err(AppError::Queue("queue unavailable".to_string()));
        }
        self.jobs.lock().expect("queue lock").push(job);
        Ok(())
    }
}
