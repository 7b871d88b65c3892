// crates/ava-broker/src/channel.rs
// ============================================================================
// Module: Broadcast Channels
// Description: The three named channels the broadcast hub fans out on.
// ============================================================================

/// A named broadcast channel.
///
/// `Widget` carries intervention frames back to the originating session's
/// widget; `Dashboard` carries `track_event`/`evaluation`/`intervention`/
/// `onboarding_progress` frames for operator dashboards; `Demo` carries the
/// same dashboard frames scoped to a demo environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Channel {
    /// Pushed to the widget that owns the session an intervention fired for.
    Widget,
    /// Read-only push of track/evaluation/intervention frames to dashboards.
    Dashboard,
    /// Same frames as `Dashboard`, scoped to demo environments.
    Demo,
}

#[cfg(test)]
mod tests {
    #![allow(
        clippy::panic,
        clippy::unwrap_used,
        clippy::expect_used,
        reason = "Test-only panic-based assertions are permitted."
    )]

    use super::Channel;

    #[test]
    fn channels_compare_by_identity() {
        assert_eq!(Channel::Widget, Channel::Widget);
        assert_ne!(Channel::Widget, Channel::Dashboard);
    }
}
