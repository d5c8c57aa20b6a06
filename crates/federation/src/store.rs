//! Read access to the data served over federation.

use std::sync::Arc;

use async_trait::async_trait;
use sea_orm::DatabaseConnection;

use apserve_common::AppResult;
use apserve_db::entities::{
    emoji, follow_request, following, note, reaction, user, user_keypair, user_note_pining,
    user_profile, user_publickey,
};
use apserve_db::repositories::{
    EmojiRepository, FollowRequestRepository, FollowingRepository, NoteRepository,
    ReactionRepository, UserKeypairRepository, UserNotePiningRepository, UserProfileRepository,
    UserPublickeyRepository, UserRepository,
};

/// Storage capability used by the endpoint layer.
#[async_trait]
pub trait FederationStore: Send + Sync {
    async fn find_local_user(&self, id: &str) -> AppResult<Option<user::Model>>;
    async fn find_local_user_by_username(&self, username: &str)
    -> AppResult<Option<user::Model>>;
    async fn find_user(&self, id: &str) -> AppResult<Option<user::Model>>;
    async fn find_users(&self, ids: &[String]) -> AppResult<Vec<user::Model>>;
    async fn find_remote_user_by_uri(&self, uri: &str) -> AppResult<Option<user::Model>>;

    async fn find_profile(&self, user_id: &str) -> AppResult<Option<user_profile::Model>>;
    async fn find_keypair(&self, user_id: &str) -> AppResult<Option<user_keypair::Model>>;
    async fn find_public_key_by_key_id(
        &self,
        key_id: &str,
    ) -> AppResult<Option<user_publickey::Model>>;
    async fn find_public_key_by_user(
        &self,
        user_id: &str,
    ) -> AppResult<Option<user_publickey::Model>>;
    async fn save_public_key(&self, key: user_publickey::Model) -> AppResult<()>;

    async fn find_note(&self, id: &str) -> AppResult<Option<note::Model>>;
    async fn find_notes(&self, ids: &[String]) -> AppResult<Vec<note::Model>>;
    /// Outbox notes; ascending after `since_id`, otherwise descending before `until_id`.
    async fn outbox_window(
        &self,
        user_id: &str,
        since_id: Option<&str>,
        until_id: Option<&str>,
        take: u64,
    ) -> AppResult<Vec<note::Model>>;
    async fn count_outbox(&self, user_id: &str) -> AppResult<u64>;
    async fn pinned_notes(&self, user_id: &str) -> AppResult<Vec<user_note_pining::Model>>;

    /// Follower edges of a user, newest first, before `until_id`.
    async fn followers_window(
        &self,
        user_id: &str,
        until_id: Option<&str>,
        take: u64,
    ) -> AppResult<Vec<following::Model>>;
    /// Following edges of a user, newest first, before `until_id`.
    async fn following_window(
        &self,
        user_id: &str,
        until_id: Option<&str>,
        take: u64,
    ) -> AppResult<Vec<following::Model>>;
    async fn count_followers(&self, user_id: &str) -> AppResult<u64>;
    async fn count_following(&self, user_id: &str) -> AppResult<u64>;
    async fn find_following_pair(
        &self,
        follower_id: &str,
        followee_id: &str,
    ) -> AppResult<Option<following::Model>>;
    async fn find_follow_request(&self, id: &str) -> AppResult<Option<follow_request::Model>>;

    async fn find_local_emoji(&self, name: &str) -> AppResult<Option<emoji::Model>>;
    async fn find_reaction(&self, id: &str) -> AppResult<Option<reaction::Model>>;
}

/// [`FederationStore`] backed by the database repositories.
#[derive(Clone)]
pub struct DbFederationStore {
    users: UserRepository,
    profiles: UserProfileRepository,
    keypairs: UserKeypairRepository,
    public_keys: UserPublickeyRepository,
    notes: NoteRepository,
    pinings: UserNotePiningRepository,
    followings: FollowingRepository,
    follow_requests: FollowRequestRepository,
    emojis: EmojiRepository,
    reactions: ReactionRepository,
}

impl DbFederationStore {
    #[must_use]
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self {
            users: UserRepository::new(db.clone()),
            profiles: UserProfileRepository::new(db.clone()),
            keypairs: UserKeypairRepository::new(db.clone()),
            public_keys: UserPublickeyRepository::new(db.clone()),
            notes: NoteRepository::new(db.clone()),
            pinings: UserNotePiningRepository::new(db.clone()),
            followings: FollowingRepository::new(db.clone()),
            follow_requests: FollowRequestRepository::new(db.clone()),
            emojis: EmojiRepository::new(db.clone()),
            reactions: ReactionRepository::new(db),
        }
    }
}

#[async_trait]
impl FederationStore for DbFederationStore {
    async fn find_local_user(&self, id: &str) -> AppResult<Option<user::Model>> {
        self.users.find_local_by_id(id).await
    }

    async fn find_local_user_by_username(
        &self,
        username: &str,
    ) -> AppResult<Option<user::Model>> {
        self.users.find_local_by_username(username).await
    }

    async fn find_user(&self, id: &str) -> AppResult<Option<user::Model>> {
        self.users.find_by_id(id).await
    }

    async fn find_users(&self, ids: &[String]) -> AppResult<Vec<user::Model>> {
        self.users.find_by_ids(ids).await
    }

    async fn find_remote_user_by_uri(&self, uri: &str) -> AppResult<Option<user::Model>> {
        Ok(self
            .users
            .find_by_uri(uri)
            .await?
            .filter(|u| !u.is_local()))
    }

    async fn find_profile(&self, user_id: &str) -> AppResult<Option<user_profile::Model>> {
        self.profiles.find_by_user_id(user_id).await
    }

    async fn find_keypair(&self, user_id: &str) -> AppResult<Option<user_keypair::Model>> {
        self.keypairs.find_by_user_id(user_id).await
    }

    async fn find_public_key_by_key_id(
        &self,
        key_id: &str,
    ) -> AppResult<Option<user_publickey::Model>> {
        self.public_keys.find_by_key_id(key_id).await
    }

    async fn find_public_key_by_user(
        &self,
        user_id: &str,
    ) -> AppResult<Option<user_publickey::Model>> {
        self.public_keys.find_by_user_id(user_id).await
    }

    async fn save_public_key(&self, key: user_publickey::Model) -> AppResult<()> {
        self.public_keys.upsert(key).await
    }

    async fn find_note(&self, id: &str) -> AppResult<Option<note::Model>> {
        self.notes.find_by_id(id).await
    }

    async fn find_notes(&self, ids: &[String]) -> AppResult<Vec<note::Model>> {
        self.notes.find_by_ids(ids).await
    }

    async fn outbox_window(
        &self,
        user_id: &str,
        since_id: Option<&str>,
        until_id: Option<&str>,
        take: u64,
    ) -> AppResult<Vec<note::Model>> {
        self.notes
            .find_federated_by_user(user_id, since_id, until_id, take)
            .await
    }

    async fn count_outbox(&self, user_id: &str) -> AppResult<u64> {
        self.notes.count_federated_by_user(user_id).await
    }

    async fn pinned_notes(&self, user_id: &str) -> AppResult<Vec<user_note_pining::Model>> {
        self.pinings.find_by_user(user_id).await
    }

    async fn followers_window(
        &self,
        user_id: &str,
        until_id: Option<&str>,
        take: u64,
    ) -> AppResult<Vec<following::Model>> {
        self.followings.find_followers(user_id, take, until_id).await
    }

    async fn following_window(
        &self,
        user_id: &str,
        until_id: Option<&str>,
        take: u64,
    ) -> AppResult<Vec<following::Model>> {
        self.followings.find_following(user_id, take, until_id).await
    }

    async fn count_followers(&self, user_id: &str) -> AppResult<u64> {
        self.followings.count_followers(user_id).await
    }

    async fn count_following(&self, user_id: &str) -> AppResult<u64> {
        self.followings.count_following(user_id).await
    }

    async fn find_following_pair(
        &self,
        follower_id: &str,
        followee_id: &str,
    ) -> AppResult<Option<following::Model>> {
        self.followings.find_by_pair(follower_id, followee_id).await
    }

    async fn find_follow_request(&self, id: &str) -> AppResult<Option<follow_request::Model>> {
        self.follow_requests.find_by_id(id).await
    }

    async fn find_local_emoji(&self, name: &str) -> AppResult<Option<emoji::Model>> {
        self.emojis.find_local_by_name(name).await
    }

    async fn find_reaction(&self, id: &str) -> AppResult<Option<reaction::Model>> {
        self.reactions.find_by_id(id).await
    }
}
