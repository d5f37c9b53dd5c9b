use std::{fmt, sync::Arc};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallerKind {
    /// An API user authenticated with a password.
    User,

    #[cfg(test)]
    MockCaller,
}

pub trait ApiCaller: Send + Sync {
    fn kind(&self) -> CallerKind;

    /// The name certificates requested by this caller are recorded under.
    fn username(&self) -> &str;
}

/// The authenticated identity behind a request. Certificates belong to the
/// username of the caller that requested them.
#[derive(Clone)]
pub struct Caller(Arc<dyn ApiCaller>);

impl fmt::Debug for Caller {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Caller")
            .field("kind", &self.0.kind())
            .field("username", &self.0.username())
            .finish()
    }
}

impl Caller {
    pub fn new(api_caller: Arc<dyn ApiCaller>) -> Self {
        Self(api_caller)
    }

    pub fn kind(&self) -> CallerKind {
        self.0.kind()
    }

    /// The owner name used to scope certificate lookups for this caller.
    pub fn owner(&self) -> &str {
        self.0.username()
    }
}
