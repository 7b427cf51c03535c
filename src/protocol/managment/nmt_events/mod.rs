//! Network management state notifications and reset requests.
//!
//! State changes go out through an explicitly attached publisher, so any
//! number of tasks can subscribe to the same `PubSubChannel` and the link is
//! cut again with [`NmtNotifier::detach`].
use embassy_sync::pubsub::DynImmediatePublisher;

/// NMT state reported to subscribers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum NmtEvent {
    Initializing,
    PreOperational,
    Operational,
    Stopped,
}

/// Publishes NMT state changes without ever blocking the caller.
///
/// A lagging subscriber loses the oldest events.
#[derive(Default)]
pub struct NmtNotifier<'a> {
    publisher: Option<DynImmediatePublisher<'a, NmtEvent>>,
}

impl<'a> NmtNotifier<'a> {
    pub const fn new() -> Self {
        Self { publisher: None }
    }

    pub fn attach(&mut self, publisher: DynImmediatePublisher<'a, NmtEvent>) {
        self.publisher = Some(publisher);
    }

    pub fn detach(&mut self) {
        self.publisher = None;
    }

    pub fn is_attached(&self) -> bool {
        self.publisher.is_some()
    }

    pub fn on_state_change(&self, state: NmtEvent) {
        #[cfg(feature = "defmt")]
        defmt::debug!("NMT state: {}", state);
        if let Some(publisher) = &self.publisher {
            publisher.publish_immediate(state);
        }
    }
}

//==================================================================================RESET
/// Reset requested by the network, the stack or local code, in rising priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ResetRequest {
    #[default]
    None,
    /// Rebuild the communication layer with a possibly new node id.
    Communication,
    /// Restart the application (reboot).
    Application,
    /// Stop communicating until power cycle.
    Quit,
}

/// Pending reset request. A new request only replaces a lower one.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResetLatch {
    pending: ResetRequest,
}

impl ResetLatch {
    pub const fn new() -> Self {
        Self {
            pending: ResetRequest::None,
        }
    }

    pub fn request(&mut self, request: ResetRequest) {
        if request > self.pending {
            self.pending = request;
        }
    }

    pub fn pending(&self) -> ResetRequest {
        self.pending
    }

    /// Hand the pending request to the caller and clear it.
    pub fn take(&mut self) -> ResetRequest {
        core::mem::take(&mut self.pending)
    }
}
