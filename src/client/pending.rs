use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

/// PendingFlag
///
/// At most one outstanding exchange per action site. Clones share the flag, so every
/// handle to the same view sees the same pending state.
#[derive(Debug, Clone, Default)]
pub struct PendingFlag {
    busy: Arc<AtomicBool>,
}

impl PendingFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_pending(&self) -> bool {
        self.busy.load(Ordering::SeqCst)
    }

    /// Claims the flag, or `None` when an exchange is already in flight.
    pub fn begin(&self) -> Option<Pending<'_>> {
        self.busy
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()
            .map(|_| Pending { flag: self })
    }
}

/// Clears the pending flag when the action finishes, however it finishes.
pub struct Pending<'a> {
    flag: &'a PendingFlag,
}

impl Drop for Pending<'_> {
    fn drop(&mut self) {
        self.flag.busy.store(false, Ordering::SeqCst);
    }
}
