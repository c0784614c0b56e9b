use super::*;

impl SessionService {
    /// Applies a session change pushed by the backend.
    ///
    /// Sign-out resets to anonymous without a round trip; every other change
    /// triggers a refresh.
    pub async fn handle_auth_state_change(&self, change: &AuthStateChange) -> AppResult<Identity> {
        debug!(kind = ?change.kind, "auth state changed");

        match change.kind {
            AuthStateChangeKind::SignedOut => {
                self.clear_identity();
                Ok(Identity::Anonymous)
            }
            AuthStateChangeKind::SignedIn
            | AuthStateChangeKind::TokenRefreshed
            | AuthStateChangeKind::UserUpdated => self.refresh_identity().await,
        }
    }

    /// Spawns a task applying every pushed session change until the backend
    /// closes its channel.
    #[must_use]
    pub fn spawn_auth_state_listener(&self) -> JoinHandle<()> {
        let service = self.clone();
        let mut receiver = self.backend.subscribe();

        tokio::spawn(async move {
            loop {
                match receiver.recv().await {
                    Ok(change) => {
                        if let Err(error) = service.handle_auth_state_change(&change).await {
                            warn!(kind = ?change.kind, error = %error, "failed to apply auth state change");
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "auth state listener lagged, refreshing identity");
                        if let Err(error) = service.refresh_identity().await {
                            warn!(error = %error, "identity refresh after lag failed");
                        }
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        info!("auth state channel closed");
                        break;
                    }
                }
            }
        })
    }
}
