//! Process-wide instrumentation. Counters are only maintained with the
//! `debug-stats` feature (and in unit tests); otherwise they read as zero.

#[cfg(any(test, feature = "debug-stats"))]
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MarkupStats {
    /// Byte-domain combinations redone in the text domain.
    pub escalations: u64,
}

#[cfg(any(test, feature = "debug-stats"))]
static ESCALATIONS: AtomicU64 = AtomicU64::new(0);

pub(crate) fn record_escalation() {
    #[cfg(any(test, feature = "debug-stats"))]
    ESCALATIONS.fetch_add(1, Ordering::Relaxed);
}

pub fn snapshot() -> MarkupStats {
    #[cfg(any(test, feature = "debug-stats"))]
    {
        MarkupStats {
            escalations: ESCALATIONS.load(Ordering::Relaxed),
        }
    }
    #[cfg(not(any(test, feature = "debug-stats")))]
    {
        MarkupStats::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::safe::SafeBytes;

    #[test]
    fn escalations_are_counted() {
        let before = snapshot().escalations;
        SafeBytes::new(b"a".to_vec()).concat(b"\xFF").unwrap();
        assert!(snapshot().escalations > before);
    }
}
