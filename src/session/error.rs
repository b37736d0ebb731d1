use super::UserId;

/// Misuse of the search engine. Absence of a session is not an error; see
/// [`SessionRegistry::get`](super::SessionRegistry::get).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    /// A search was requested over an empty (or unaddressable) frame range.
    #[error("cannot bisect {total_frames} frames: the video needs at least one frame")]
    InvalidArgument { total_frames: u64 },

    /// An answer arrived for a search that has already converged.
    #[error("search for user {user_id} has already finished")]
    InvalidState { user_id: UserId },
}
