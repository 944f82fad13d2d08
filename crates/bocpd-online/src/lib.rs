// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

pub mod detector;
pub mod hazard;
pub mod posterior;
pub mod predictive;
pub mod prior;
pub mod recursion;
pub mod segmentation;

pub use detector::{BocpdConfig, BocpdDetector, Inference, MIN_SERIES_LEN};
pub use hazard::{ConstantHazard, DEFAULT_HAZARD_RATE, GeometricHazard, HazardFunction, HazardSpec};
pub use posterior::RunLengthMatrix;
pub use predictive::{student_t_densities, student_t_log_densities};
pub use prior::{NormalGammaParams, NormalGammaPrior, ParameterTrajectories};
pub use recursion::{RunLengthRecursion, StepSummary, Truncation};
pub use segmentation::{ChangepointCommit, MapSegmenter, SegmentStep, SegmenterState, TentativePath};

/// Online detector namespace.
pub fn crate_name() -> &'static str {
    let _ = bocpd_core::crate_name();
    "bocpd-online"
}
