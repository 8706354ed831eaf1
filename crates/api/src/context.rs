use bizbooks_core::UserId;

/// Acting user for a request, as forwarded by the upstream auth layer.
///
/// Read-only routes may run without one; mutating routes never do.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub struct ActorContext {
    user_id: Option<UserId>,
}

impl ActorContext {
    pub fn new(user_id: UserId) -> Self {
        Self {
            user_id: Some(user_id),
        }
    }

    pub fn anonymous() -> Self {
        Self { user_id: None }
    }

    pub fn user_id(&self) -> Option<UserId> {
        self.user_id
    }
}
