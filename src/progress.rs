//! Progress-callback trait for extraction cascade events.
//!
//! Inject an [`Arc<dyn ExtractionProgressCallback>`] via
//! [`crate::config::ExtractionConfigBuilder::progress_callback`] to follow a
//! run as it moves through text extraction, repair, the text and vision
//! cascades, and the heuristic fallback.
//!
//! # Example
//!
//! ```rust
//! use scanfile_rename::{ExtractionConfig, ExtractionProgressCallback};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct PassCounter {
//!     passes: AtomicUsize,
//! }
//!
//! impl ExtractionProgressCallback for PassCounter {
//!     fn on_text_pass(&self, pass: usize, total: usize, budget: usize) {
//!         self.passes.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("text pass {pass}/{total}: budget={budget}");
//!     }
//! }
//!
//! let counter = Arc::new(PassCounter { passes: AtomicUsize::new(0) });
//!
//! let config = ExtractionConfig::builder()
//!     .progress_callback(counter as Arc<dyn ExtractionProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use std::sync::Arc;

/// Which cascade a stop event refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Modality {
    Text,
    Vision,
}

impl std::fmt::Display for Modality {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Modality::Text => "text",
            Modality::Vision => "vision",
        })
    }
}

/// Called by the orchestrator as a run progresses.
///
/// A run is strictly sequential, so events arrive in order. All methods have
/// default no-op implementations so callers only override what they care
/// about.
pub trait ExtractionProgressCallback: Send + Sync {
    /// Text extraction finished. `ok` is false when the extractor failed;
    /// `chars` is the trimmed length of whatever it returned.
    fn on_text_extracted(&self, chars: usize, ok: bool) {
        let _ = (chars, ok);
    }

    /// A repair-eligible failure was seen and the repairer is starting.
    fn on_repair_start(&self) {}

    /// The single repair attempt of this run finished.
    fn on_repair_complete(&self, success: bool) {
        let _ = success;
    }

    /// A text-cascade request is about to be sent.
    ///
    /// # Arguments
    /// * `pass`  : 1-indexed pass number
    /// * `total` : number of budgets
    /// * `budget`: character budget of this pass
    fn on_text_pass(&self, pass: usize, total: usize, budget: usize) {
        let _ = (pass, total, budget);
    }

    /// A vision-cascade pass is starting (rasterization, then the request).
    fn on_vision_pass(&self, pass: usize, total: usize, pages: u32) {
        let _ = (pass, total, pages);
    }

    /// A cascade ended without a result for a reason other than exhaustion.
    fn on_cascade_stopped(&self, modality: Modality, reason: &str) {
        let _ = (modality, reason);
    }

    /// Every model attempt failed; pattern matching over the raw text is used.
    fn on_heuristic_fallback(&self) {}
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl ExtractionProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ExtractionConfig`].
pub type ProgressCallback = Arc<dyn ExtractionProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        text_passes: AtomicUsize,
        vision_passes: AtomicUsize,
        stops: Mutex<Vec<String>>,
    }

    impl ExtractionProgressCallback for Recorder {
        fn on_text_pass(&self, _pass: usize, _total: usize, _budget: usize) {
            self.text_passes.fetch_add(1, Ordering::SeqCst);
        }

        fn on_vision_pass(&self, _pass: usize, _total: usize, _pages: u32) {
            self.vision_passes.fetch_add(1, Ordering::SeqCst);
        }

        fn on_cascade_stopped(&self, modality: Modality, reason: &str) {
            self.stops.lock().unwrap().push(format!("{modality}: {reason}"));
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_text_extracted(10, true);
        cb.on_repair_start();
        cb.on_repair_complete(false);
        cb.on_text_pass(1, 4, 7000);
        cb.on_vision_pass(1, 3, 3);
        cb.on_cascade_stopped(Modality::Text, "boom");
        cb.on_heuristic_fallback();
    }

    #[test]
    fn recorder_receives_events() {
        let rec = Recorder::default();
        rec.on_text_pass(1, 4, 7000);
        rec.on_text_pass(2, 4, 4500);
        rec.on_vision_pass(1, 3, 3);
        rec.on_cascade_stopped(Modality::Vision, "HTTP 401");
        assert_eq!(rec.text_passes.load(Ordering::SeqCst), 2);
        assert_eq!(rec.vision_passes.load(Ordering::SeqCst), 1);
        assert_eq!(rec.stops.lock().unwrap().as_slice(), ["vision: HTTP 401"]);
    }

    #[test]
    fn arc_dyn_callback_works() {
        let cb: ProgressCallback = Arc::new(NoopProgressCallback);
        cb.on_repair_start();
        cb.on_heuristic_fallback();
    }
}
