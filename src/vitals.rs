//! Core web vitals reported as histogram observations.
//!
//! The host shell measures the vitals (its WebView exposes the performance
//! callbacks) and delivers one [`VitalSample`] per metric per page load.
//! The reporter registers its instruments once per process, no matter how
//! often the host UI re-mounts.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

use opentelemetry::global;
use opentelemetry::metrics::{Histogram, Meter};
use opentelemetry::KeyValue;

const METER_SCOPE: &str = "web-vitals";

/// Core web vital delivered by the host shell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebVital {
    /// Largest Contentful Paint, milliseconds.
    Lcp,
    /// Cumulative Layout Shift, unitless.
    Cls,
    /// Interaction to Next Paint, milliseconds.
    Inp,
    /// Time to First Byte, milliseconds.
    Ttfb,
}

impl WebVital {
    fn index(self) -> usize {
        match self {
            WebVital::Lcp => 0,
            WebVital::Cls => 1,
            WebVital::Inp => 2,
            WebVital::Ttfb => 3,
        }
    }
}

/// Qualitative rating attached by the vital's measurement source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VitalRating {
    Good,
    NeedsImprovement,
    Poor,
}

impl VitalRating {
    fn as_str(self) -> &'static str {
        match self {
            VitalRating::Good => "good",
            VitalRating::NeedsImprovement => "needs-improvement",
            VitalRating::Poor => "poor",
        }
    }
}

/// One vital observation: the measured value plus the measurement id and
/// rating assigned by the source.
#[derive(Debug, Clone)]
pub struct VitalSample {
    pub vital: WebVital,
    pub value: f64,
    pub id: String,
    pub rating: VitalRating,
}

/// Records core web vitals, at most one observation per vital per page load.
pub(crate) struct VitalsReporter {
    lcp: Histogram<f64>,
    cls: Histogram<f64>,
    inp: Histogram<f64>,
    ttfb: Histogram<f64>,
    seen: [AtomicBool; 4],
}

static ACTIVE: OnceLock<Arc<VitalsReporter>> = OnceLock::new();

impl VitalsReporter {
    fn new(meter: &Meter) -> Self {
        Self {
            lcp: meter
                .f64_histogram("web_vital.lcp")
                .with_description("Largest Contentful Paint (ms)")
                .with_unit("ms")
                .build(),
            cls: meter
                .f64_histogram("web_vital.cls")
                .with_description("Cumulative Layout Shift")
                .build(),
            inp: meter
                .f64_histogram("web_vital.inp")
                .with_description("Interaction to Next Paint (ms)")
                .with_unit("ms")
                .build(),
            ttfb: meter
                .f64_histogram("web_vital.ttfb")
                .with_description("Time to First Byte (ms)")
                .with_unit("ms")
                .build(),
            seen: Default::default(),
        }
    }

    /// Register the process-wide reporter. Repeated activation across
    /// re-mounts returns the instance that is already live instead of
    /// registering duplicate instruments.
    pub(crate) fn activate() -> Arc<VitalsReporter> {
        Arc::clone(ACTIVE.get_or_init(|| Arc::new(VitalsReporter::new(&global::meter(METER_SCOPE)))))
    }

    /// Record one observation, tagged with the measurement id and rating.
    ///
    /// Returns `false` when this vital already fired during the current page
    /// load; the sources fire at most once per metric, and the latch keeps
    /// that true even for a misbehaving host.
    pub(crate) fn record(&self, sample: &VitalSample) -> bool {
        if self.seen[sample.vital.index()].swap(true, Ordering::SeqCst) {
            return false;
        }
        let attrs = [
            KeyValue::new("metric.id", sample.id.clone()),
            KeyValue::new("metric.rating", sample.rating.as_str()),
        ];
        self.histogram(sample.vital).record(sample.value, &attrs);
        true
    }

    fn histogram(&self, vital: WebVital) -> &Histogram<f64> {
        match vital {
            WebVital::Lcp => &self.lcp,
            WebVital::Cls => &self.cls,
            WebVital::Inp => &self.inp,
            WebVital::Ttfb => &self.ttfb,
        }
    }
}

/// Route a vital observation to the active reporter.
///
/// Returns `false` when the reporter has not been activated or the vital
/// already fired this page load.
pub fn record_web_vital(sample: &VitalSample) -> bool {
    ACTIVE
        .get()
        .map(|reporter| reporter.record(sample))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(vital: WebVital) -> VitalSample {
        VitalSample {
            vital,
            value: 100.0,
            id: "v1-test".to_owned(),
            rating: VitalRating::Good,
        }
    }

    #[test]
    fn each_vital_records_at_most_once() {
        let reporter = VitalsReporter::new(&global::meter("vitals-latch-test"));

        assert!(reporter.record(&sample(WebVital::Lcp)));
        assert!(!reporter.record(&sample(WebVital::Lcp)));

        // The latch is per vital, not global.
        assert!(reporter.record(&sample(WebVital::Cls)));
        assert!(reporter.record(&sample(WebVital::Inp)));
        assert!(reporter.record(&sample(WebVital::Ttfb)));
        assert!(!reporter.record(&sample(WebVital::Ttfb)));
    }

    #[test]
    fn rating_strings_match_the_measurement_sources() {
        assert_eq!(VitalRating::Good.as_str(), "good");
        assert_eq!(VitalRating::NeedsImprovement.as_str(), "needs-improvement");
        assert_eq!(VitalRating::Poor.as_str(), "poor");
    }

    // Covers the whole activation story in one test because the guard is a
    // process-wide one-shot; no other test activates the reporter.
    #[test]
    fn activation_happens_once_per_process() {
        assert!(!record_web_vital(&sample(WebVital::Inp)));

        let first = VitalsReporter::activate();
        let second = VitalsReporter::activate();
        assert!(Arc::ptr_eq(&first, &second));

        assert!(record_web_vital(&sample(WebVital::Inp)));
        assert!(!record_web_vital(&sample(WebVital::Inp)));
    }
}
