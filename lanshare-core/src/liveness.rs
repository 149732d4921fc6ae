#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Liveness {
    Connected,
    Disconnected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub from: Option<Liveness>,
    pub to: Liveness,
}

impl Transition {
    /// True when the service came back after being unreachable.
    pub fn is_reconnect(&self) -> bool {
        self.from == Some(Liveness::Disconnected) && self.to == Liveness::Connected
    }
}

/// Reachability of the peer service, reported only when it changes.
#[derive(Debug, Default)]
pub struct LivenessTracker {
    current: Option<Liveness>,
}

impl LivenessTracker {
    pub fn current(&self) -> Option<Liveness> {
        self.current
    }

    pub fn observe(&mut self, reachable: bool) -> Option<Transition> {
        let next = if reachable {
            Liveness::Connected
        } else {
            Liveness::Disconnected
        };
        if self.current == Some(next) {
            return None;
        }
        let from = self.current.replace(next);
        Some(Transition { from, to: next })
    }
}
