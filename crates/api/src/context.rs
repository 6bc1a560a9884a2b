use creditshop_core::UserId;

/// The staff member a write request is made on behalf of.
///
/// Present on every write route; inserted by `middleware::actor_middleware`.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ActorContext {
    user_id: UserId,
}

impl ActorContext {
    pub fn new(user_id: UserId) -> Self {
        Self { user_id }
    }

    pub fn user_id(&self) -> UserId {
        self.user_id
    }
}
