// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use bocpd_core::BocpdError;
use tracing::debug;

/// A changepoint decision that rewrote part of the committed path.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChangepointCommit {
    /// Column at which the tentative path reached the lag threshold.
    pub detected_at: usize,
    /// First step of the new segment (`detected_at - run_length`).
    pub changepoint_at: usize,
    /// Run length committed at `detected_at`.
    pub run_length: usize,
}

/// Consecutive MAP run lengths that disagree with the committed path.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TentativePath {
    last: usize,
    len: usize,
}

impl TentativePath {
    fn starting_at(run_length: usize) -> Self {
        Self {
            last: run_length,
            len: 1,
        }
    }

    /// Most recent run length on the path.
    pub fn last(&self) -> usize {
        self.last
    }

    /// Consecutive columns the path has persisted, always at least 1.
    pub fn columns(&self) -> usize {
        self.len
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum SegmenterState {
    /// The committed path agrees with the posterior.
    #[default]
    Tracking,
    /// A competing path is accumulating evidence.
    Tentative(TentativePath),
}

/// Outcome of one [`MapSegmenter::observe`] call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SegmentStep {
    /// The MAP extended the committed path.
    Continued { run_length: usize },
    /// A placeholder was committed while a tentative path is below the lag.
    Provisional { tentative_len: usize },
    Committed(ChangepointCommit),
}

/// Indices attaining the maximum of `column`, ascending. Exact equality.
pub fn max_indices(column: &[f64]) -> Vec<usize> {
    let max = column.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    column
        .iter()
        .enumerate()
        .filter(|(_, value)| **value == max)
        .map(|(idx, _)| idx)
        .collect()
}

/// Lag-smoothed MAP path extractor.
///
/// Consumes posterior columns `1..len` in order and maintains the committed
/// run-length path. A discontinuous MAP only rewrites the path once it has
/// persisted for `lag` consecutive columns; `lag` 0 and 1 commit immediately.
#[derive(Clone, Debug)]
pub struct MapSegmenter {
    lag: usize,
    next_t: usize,
    committed: Vec<usize>,
    commits: Vec<ChangepointCommit>,
    state: SegmenterState,
}

impl MapSegmenter {
    /// Segmenter for a series of `series_len` observations. The committed
    /// path has `series_len + 1` entries, all starting at zero.
    pub fn new(lag: usize, series_len: usize) -> Self {
        Self {
            lag,
            next_t: 1,
            committed: vec![0; series_len + 1],
            commits: Vec::new(),
            state: SegmenterState::Tracking,
        }
    }

    /// Columns a competing path must persist before it is committed.
    pub fn lag(&self) -> usize {
        self.lag
    }

    /// Whether a competing path is pending.
    pub fn state(&self) -> &SegmenterState {
        &self.state
    }

    /// Committed path so far, `series_len + 1` entries.
    pub fn run_lengths(&self) -> &[usize] {
        &self.committed
    }

    /// Commits in detection order.
    pub fn commits(&self) -> &[ChangepointCommit] {
        &self.commits
    }

    /// Consumes the segmenter, returning the path and its commits.
    pub fn into_parts(self) -> (Vec<usize>, Vec<ChangepointCommit>) {
        (self.committed, self.commits)
    }

    /// Folds posterior column `t` into the committed path.
    pub fn observe(&mut self, t: usize, column: &[f64]) -> Result<SegmentStep, BocpdError> {
        if t != self.next_t {
            return Err(BocpdError::invalid_input(format!(
                "segmenter expected column {} but received column {t}",
                self.next_t
            )));
        }
        if t + 1 >= self.committed.len() {
            return Err(BocpdError::invalid_input(format!(
                "segmenter column {t} is outside the series (len={})",
                self.committed.len() - 1
            )));
        }
        let candidates = max_indices(column);
        if candidates.is_empty() {
            return Err(BocpdError::invalid_input(format!(
                "posterior column {t} has no maximum"
            )));
        }

        let continuation = self.committed[t - 1] + 1;
        let tentative_next = match &self.state {
            SegmenterState::Tentative(path) => Some(path.last + 1),
            SegmenterState::Tracking => None,
        };
        let candidate = if candidates.binary_search(&continuation).is_ok() {
            continuation
        } else if let Some(next) = tentative_next
            && candidates.binary_search(&next).is_ok()
        {
            next
        } else {
            candidates[0]
        };

        self.next_t += 1;

        if candidate == continuation {
            self.committed[t] = continuation;
            self.state = SegmenterState::Tracking;
            return Ok(SegmentStep::Continued {
                run_length: continuation,
            });
        }

        let path = match std::mem::take(&mut self.state) {
            SegmenterState::Tentative(mut path) if candidate == path.last + 1 => {
                path.last = candidate;
                path.len += 1;
                path
            }
            _ => TentativePath::starting_at(candidate),
        };

        if path.len >= self.lag {
            for i in 0..=candidate.min(t - 1) {
                self.committed[t - i] = candidate - i;
            }
            let commit = ChangepointCommit {
                detected_at: t,
                changepoint_at: t - candidate.min(t - 1),
                run_length: candidate,
            };
            debug!(
                detected_at = commit.detected_at,
                changepoint_at = commit.changepoint_at,
                run_length = commit.run_length,
                lag = self.lag,
                "bocpd changepoint committed"
            );
            self.commits.push(commit);
            return Ok(SegmentStep::Committed(commit));
        }

        self.committed[t] = continuation;
        let tentative_len = path.len;
        self.state = SegmenterState::Tentative(path);
        Ok(SegmentStep::Provisional { tentative_len })
    }
}
