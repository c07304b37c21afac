use std::sync::RwLock;

/// Holder of the bearer credential every request carries.
///
/// Loaded once at startup and cleared on logout; the store is injected into
/// the client rather than read ambiently, so each request observes the
/// credential current at send time.
#[derive(Debug, Default)]
pub struct CredentialStore {
    token: RwLock<Option<String>>,
}

impl CredentialStore {
    /// Store with no credential loaded. Requests go out unauthenticated and
    /// the server answers 401.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with_token(token: impl Into<String>) -> Self {
        Self { token: RwLock::new(Some(token.into())) }
    }

    pub fn set_token(&self, token: impl Into<String>) {
        *self.token.write().expect("credential lock poisoned") = Some(token.into());
    }

    /// Invalidate the credential (logout).
    pub fn clear(&self) {
        *self.token.write().expect("credential lock poisoned") = None;
    }

    pub fn token(&self) -> Option<String> {
        self.token.read().expect("credential lock poisoned").clone()
    }
}
