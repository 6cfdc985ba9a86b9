/// Endpoint configuration for the core.
///
/// `live_url` is the base of the live layer: the user notification
/// channel appends a user id, the chat channel appends `chat/` and an
/// event id. `notify_url` is the expiration-alert endpoint, which
/// appends an event id.
#[derive(Debug, Clone)]
pub struct CoreConfig {
    pub api_url: String,
    pub live_url: String,
    pub notify_url: String,
}

impl CoreConfig {
    pub fn new(api_url: &str, live_url: &str, notify_url: &str) -> Self {
        Self {
            api_url: with_trailing_slash(api_url),
            live_url: with_trailing_slash(live_url),
            notify_url: with_trailing_slash(notify_url),
        }
    }
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self::new(
            "http://127.0.0.1:8000",
            "ws://127.0.0.1:8000/ws",
            "ws://127.0.0.1:8000/ws/notification",
        )
    }
}

fn with_trailing_slash(base: &str) -> String {
    let mut s = base.to_string();
    if !s.ends_with('/') {
        s.push('/');
    }
    s
}
