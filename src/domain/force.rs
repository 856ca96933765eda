//! Force-plate traces of a single countermovement jump.

use serde::Serialize;

/// One force-plate sample.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ForceSample {
    pub time_s: f64,
    pub force_n: f64,
}

/// Samples of one jump in non-decreasing time order.
#[derive(Debug, Clone, PartialEq)]
pub struct ForceTrace {
    samples: Vec<ForceSample>,
}

impl ForceTrace {
    /// Wrap samples already checked by the loader.
    pub fn new(samples: Vec<ForceSample>) -> Self {
        debug_assert!(samples.windows(2).all(|w| w[0].time_s <= w[1].time_s));
        Self { samples }
    }

    pub fn samples(&self) -> &[ForceSample] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Time of the first sample, the origin of every relative metric.
    pub fn start_time(&self) -> Option<f64> {
        self.samples.first().map(|s| s.time_s)
    }

    /// Samples per second implied by the timestamps.
    pub fn observed_rate_hz(&self) -> Option<f64> {
        let first = self.samples.first()?.time_s;
        let last = self.samples.last()?.time_s;
        let span = last - first;
        if span > 0.0 {
            Some((self.samples.len() - 1) as f64 / span)
        } else {
            None
        }
    }
}

/// Metrics of one jump. Times are relative to the first sample.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ForceMetrics {
    pub bw_n: f64,
    pub peak_force_n: f64,
    /// Peak force in bodyweights; `None` when the bodyweight estimate is zero.
    pub peak_force_xbw: Option<f64>,
    pub net_peak_force_n: f64,
    pub time_to_peak_ms: f64,
    pub rfd_0_50_n_per_s: f64,
    pub rfd_0_100_n_per_s: f64,
    pub rfd_0_200_n_per_s: f64,
    pub impulse_0_200_ns: f64,
    pub net_impulse_0_200_ns: f64,
}

impl ForceMetrics {
    /// `(label, value)` pairs in report order.
    pub fn labelled(&self) -> [(&'static str, Option<f64>); 10] {
        [
            ("Bodyweight Estimate (N)", Some(self.bw_n)),
            ("Peak Force (N)", Some(self.peak_force_n)),
            ("Peak Force (×BW)", self.peak_force_xbw),
            ("Net Peak Force (N)", Some(self.net_peak_force_n)),
            ("Time to Peak (ms)", Some(self.time_to_peak_ms)),
            ("RFD 0–50 ms (N/s)", Some(self.rfd_0_50_n_per_s)),
            ("RFD 0–100 ms (N/s)", Some(self.rfd_0_100_n_per_s)),
            ("RFD 0–200 ms (N/s)", Some(self.rfd_0_200_n_per_s)),
            ("Impulse 0–200 ms (N·s)", Some(self.impulse_0_200_ns)),
            ("Net Impulse 0–200 ms (N·s)", Some(self.net_impulse_0_200_ns)),
        ]
    }
}
