//! Database entities read by the federation layer.

pub mod emoji;
pub mod follow_request;
pub mod following;
pub mod instance;
pub mod note;
pub mod reaction;
pub mod user;
pub mod user_keypair;
pub mod user_note_pining;
pub mod user_profile;
pub mod user_publickey;

pub use emoji::Entity as Emoji;
pub use follow_request::Entity as FollowRequest;
pub use following::Entity as Following;
pub use instance::Entity as Instance;
pub use note::Entity as Note;
pub use reaction::Entity as Reaction;
pub use user::Entity as User;
pub use user_keypair::Entity as UserKeypair;
pub use user_note_pining::Entity as UserNotePining;
pub use user_profile::Entity as UserProfile;
pub use user_publickey::Entity as UserPublickey;
