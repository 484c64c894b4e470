//! Debounce decision for the host-side screenshot observer.
//!
//! The platform layer subscribes to media-store change events and asks this
//! type, per event, whether to deliver a "screenshot taken" notification or
//! drop the event. Keeping the decision pure (event timestamp vs. the last
//! accepted one) leaves observer registration as the only side-effecting
//! shell around it.

pub const DEBOUNCE_WINDOW_MS: u64 = 2000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Deliver,
    Suppress,
}

#[derive(Debug, Clone)]
pub struct ScreenshotDebounce {
    window_ms: u64,
    last_accepted_ms: Option<u64>,
}

impl ScreenshotDebounce {
    pub fn new(window_ms: u64) -> Self {
        ScreenshotDebounce {
            window_ms,
            last_accepted_ms: None,
        }
    }

    /// Accept the event if strictly more than the window has elapsed since
    /// the last accepted one. Only accepted events advance the timestamp:
    /// a suppressed burst cannot keep pushing delivery into the future.
    pub fn observe(&mut self, now_ms: u64) -> Decision {
        let accept = match self.last_accepted_ms {
            None => true,
            Some(last) => now_ms.saturating_sub(last) > self.window_ms,
        };
        if accept {
            self.last_accepted_ms = Some(now_ms);
            Decision::Deliver
        } else {
            Decision::Suppress
        }
    }
}

impl Default for ScreenshotDebounce {
    fn default() -> Self {
        ScreenshotDebounce::new(DEBOUNCE_WINDOW_MS)
    }
}
