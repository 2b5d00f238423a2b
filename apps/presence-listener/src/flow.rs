//! Login flow driven by card taps.
//!
//! Tapping a card logs its user in. Tapping the same card again logs them
//! out, and tapping a different card switches users. Removing a card from
//! the reader does nothing; sessions end by tapping, not by walking away.

use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FlowAction {
    Login,
    Logout,
}

/// Where login and logout notifications go. The production transport lives
/// outside this program; [`LogNotifier`] stands in for it here.
#[cfg_attr(test, mockall::automock)]
pub(crate) trait FlowNotifier {
    fn notify(&self, action: FlowAction, token: &str);
}

/// Reports each action to the log.
pub(crate) struct LogNotifier;

impl FlowNotifier for LogNotifier {
    fn notify(&self, action: FlowAction, token: &str) {
        info!(?action, token, "flow notification");
    }
}

/// Tracks the active user token and turns each tap into the right actions.
pub(crate) struct FlowState<N> {
    notifier: N,
    active_token: Option<String>,
}

impl<N: FlowNotifier> FlowState<N> {
    pub(crate) fn new(notifier: N) -> Self {
        Self {
            notifier,
            active_token: None,
        }
    }

    pub(crate) fn card_tapped(&mut self, token: &str) {
        match self.active_token.take() {
            None => {
                self.notifier.notify(FlowAction::Login, token);
                self.active_token = Some(token.to_owned());
            }
            Some(active) if active == token => {
                self.notifier.notify(FlowAction::Logout, token);
            }
            Some(active) => {
                self.notifier.notify(FlowAction::Logout, &active);
                self.notifier.notify(FlowAction::Login, token);
                self.active_token = Some(token.to_owned());
            }
        }
    }

    /// Logs out whoever is active. Used at shutdown so nobody stays logged
    /// in on the flow manager after the listener exits.
    pub(crate) fn logout(&mut self) {
        if let Some(token) = self.active_token.take() {
            self.notifier.notify(FlowAction::Logout, &token);
        }
    }
}
