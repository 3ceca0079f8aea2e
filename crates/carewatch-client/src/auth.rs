//! Access token lookup.

/// Supplies the bearer token used to authenticate connections.
///
/// Consulted on every connection attempt, so a source may rotate tokens
/// between reconnects.
pub trait TokenSource: Send + Sync + 'static {
    /// Returns the current token, or `None` if the user is signed out.
    fn access_token(&self) -> Option<String>;
}

impl<F> TokenSource for F
where
    F: Fn() -> Option<String> + Send + Sync + 'static,
{
    fn access_token(&self) -> Option<String> {
        self()
    }
}

/// A fixed token, e.g. from the command line.
#[derive(Debug, Clone, Default)]
pub struct StaticToken(Option<String>);

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(Some(token.into()))
    }

    /// A source that never has a token.
    pub fn none() -> Self {
        Self(None)
    }
}

impl TokenSource for StaticToken {
    fn access_token(&self) -> Option<String> {
        self.0.clone()
    }
}
