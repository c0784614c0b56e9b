use super::*;

impl SessionService {
    /// Registers a listener invoked whenever the cached identity changes,
    /// including transitions to and from anonymous.
    pub fn on_identity_change(&self, listener: Arc<dyn IdentityListener>) -> ListenerId {
        let id = ListenerId(self.state.next_listener_id.fetch_add(1, Ordering::SeqCst));
        self.state
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, listener));
        id
    }

    /// Removes a listener. Returns `false` when it was already removed.
    pub fn remove_listener(&self, id: ListenerId) -> bool {
        let mut listeners = self
            .state
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let before = listeners.len();
        listeners.retain(|(registered, _)| *registered != id);
        listeners.len() != before
    }

    /// Runs listeners in registration order over a snapshot, so listeners
    /// may register or remove listeners while being notified.
    pub(super) fn notify_listeners(&self, identity: &Identity) {
        let snapshot: Vec<(ListenerId, Arc<dyn IdentityListener>)> = self
            .state
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();

        for (id, listener) in snapshot {
            if let Err(error) = listener.on_identity_change(identity) {
                warn!(listener_id = %id, error = %error, "identity listener failed");
            }
        }
    }
}
