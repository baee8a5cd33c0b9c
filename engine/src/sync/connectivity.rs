//! Connectivity signal consumed by the persistence queue
//!
//! The engine never checks the network itself; whoever owns the heartbeat
//! publishes through a `watch` channel and the queue reads the latest value.

use serde::{Deserialize, Serialize};
use tokio::sync::watch;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkQuality {
    Excellent,
    Good,
    Poor,
    Offline,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Connectivity {
    pub online: bool,
    pub quality: LinkQuality,
}

impl Connectivity {
    pub fn online(quality: LinkQuality) -> Self {
        Self {
            online: quality != LinkQuality::Offline,
            quality,
        }
    }

    pub fn offline() -> Self {
        Self {
            online: false,
            quality: LinkQuality::Offline,
        }
    }

    /// Whether writes should be attempted at all
    pub fn is_usable(&self) -> bool {
        self.online && self.quality != LinkQuality::Offline
    }
}

impl Default for Connectivity {
    fn default() -> Self {
        Self::online(LinkQuality::Good)
    }
}

/// A receiver that always reports a usable link
pub fn always_online() -> watch::Receiver<Connectivity> {
    let (_tx, rx) = watch::channel(Connectivity::default());
    rx
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offline_quality_is_never_usable() {
        assert!(Connectivity::online(LinkQuality::Poor).is_usable());
        assert!(!Connectivity::online(LinkQuality::Offline).is_usable());
        assert!(!Connectivity::offline().is_usable());
        let odd = Connectivity {
            online: true,
            quality: LinkQuality::Offline,
        };
        assert!(!odd.is_usable());
    }

    #[test]
    fn test_always_online_survives_sender_drop() {
        let rx = always_online();
        assert!(rx.borrow().is_usable());
    }
}
