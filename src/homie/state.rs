/// Lifecycle state advertised on `$state`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DeviceState {
    /// Bootstrapping: the tree is being published.
    Init,
    /// Fully operational.
    Ready,
    /// Operational, but some values may be stale (e.g. a sensor stopped
    /// answering).
    Alert,
    /// Disconnected. Only ever published as the last will or on shutdown.
    Lost,
}

impl DeviceState {
    pub const fn as_str(&self) -> &'static str {
        match self {
            DeviceState::Init => "init",
            DeviceState::Ready => "ready",
            DeviceState::Alert => "alert",
            DeviceState::Lost => "lost",
        }
    }

    /// Transitions allowed at runtime. Going back to `Init` requires a fresh
    /// bootstrap and is not a transition.
    pub const fn can_transition(&self, to: DeviceState) -> bool {
        matches!(
            (self, to),
            (DeviceState::Init, DeviceState::Ready)
                | (DeviceState::Ready, DeviceState::Alert)
                | (DeviceState::Alert, DeviceState::Ready)
        )
    }

    /// Whether the device has been bootstrapped and not shut down.
    pub const fn is_running(&self) -> bool {
        matches!(self, DeviceState::Ready | DeviceState::Alert)
    }
}

#[cfg(test)]
mod tests {
    use super::DeviceState::*;

    #[test]
    fn transitions() {
        assert!(Init.can_transition(Ready));
        assert!(Ready.can_transition(Alert));
        assert!(Alert.can_transition(Ready));

        assert!(!Init.can_transition(Alert));
        assert!(!Ready.can_transition(Init));
        assert!(!Alert.can_transition(Alert));
        assert!(!Ready.can_transition(Ready));
        assert!(!Lost.can_transition(Ready));
    }

    #[test]
    fn wire_names() {
        assert_eq!(Init.as_str(), "init");
        assert_eq!(Alert.as_str(), "alert");
        assert_eq!(Lost.as_str(), "lost");
    }
}
