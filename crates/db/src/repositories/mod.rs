//! Repositories for the tables read by the federation layer.

mod emoji;
mod follow_request;
mod following;
mod instance;
mod note;
mod reaction;
mod user;
mod user_keypair;
mod user_note_pining;
mod user_profile;
mod user_publickey;

pub use emoji::EmojiRepository;
pub use follow_request::FollowRequestRepository;
pub use following::FollowingRepository;
pub use instance::InstanceRepository;
pub use note::NoteRepository;
pub use reaction::ReactionRepository;
pub use user::UserRepository;
pub use user_keypair::UserKeypairRepository;
pub use user_note_pining::UserNotePiningRepository;
pub use user_profile::UserProfileRepository;
pub use user_publickey::UserPublickeyRepository;
