/// Identity of the logged-in user, produced by the auth collaborator
/// from a decoded, non-expired credential.
///
/// The session is passed explicitly to everything that needs identity
/// or the bearer token. It exists from successful login until
/// logout/expiry; without one there are no live subscriptions.
#[derive(Debug, Clone)]
pub struct Session {
    pub user_id: String,
    pub username: String,
    pub token: String,
}

impl Session {
    pub fn new(user_id: impl Into<String>, username: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            username: username.into(),
            token: token.into(),
        }
    }
}
