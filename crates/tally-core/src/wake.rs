use crate::CoreResult;

use std::time::Duration;

use async_trait::async_trait;
use uuid::Uuid;

/// Ceiling on any wake token's lifetime, enforced by the provider.
///
/// A safety net independent of the session layer: even if release were
/// never called, the host regains its power management after this long.
pub const MAX_WAKE_LIFETIME: Duration = Duration::from_secs(24 * 60 * 60);

/// Proof of an acquired wake hold, minted by [`WakeSource::acquire`].
#[derive(Debug)]
pub struct WakeToken {
    id: Uuid,
}

impl WakeToken {
    /// Mint a token with a fresh id.
    pub fn new() -> Self {
        Self { id: Uuid::new_v4() }
    }

    /// The provider's key for this hold.
    pub fn id(&self) -> Uuid {
        self.id
    }
}

impl Default for WakeToken {
    fn default() -> Self {
        Self::new()
    }
}

/// Keeps the host from sleeping while a session runs.
#[async_trait]
pub trait WakeSource: Send + Sync {
    /// Acquire a wake hold bounded by `max_lifetime`.
    async fn acquire(&self, max_lifetime: Duration) -> CoreResult<WakeToken>;

    /// Release a hold. Idempotent: releasing an already-released or expired
    /// token does nothing. Failures are the provider's to log.
    async fn release(&self, token: WakeToken);
}
