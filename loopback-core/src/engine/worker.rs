use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::models::diagnostics::LoopStats;
use crate::models::error::DeviceError;
use crate::processing::frame_buffer::FrameBuffer;
use crate::processing::gain::{GainSetting, GainStage};
use crate::session::device_session::DeviceSession;
use crate::traits::endpoint::{CaptureEndpoint, PlaybackEndpoint};

const NO_SAMPLES: &str = "capture returned no samples";

/// Consecutive-failure accounting for the loop.
struct FailureBudget {
    consecutive: u32,
    limit: u32,
}

impl FailureBudget {
    fn new(limit: u32) -> Self {
        Self { consecutive: 0, limit }
    }

    fn succeeded(&mut self) {
        self.consecutive = 0;
    }

    /// Count a transient failure; `Err` once the limit is exceeded.
    ///
    /// `cause` is only formatted into an owned string on escalation.
    fn failed(&mut self, cause: &dyn fmt::Display) -> Result<(), DeviceError> {
        self.consecutive += 1;
        if self.consecutive > self.limit {
            return Err(DeviceError::TooManyFailures {
                consecutive: self.consecutive,
                last: cause.to_string(),
            });
        }
        log::debug!(
            "Transient loopback I/O failure {}/{}: {}",
            self.consecutive,
            self.limit,
            cause
        );
        Ok(())
    }
}

/// Capture → gain → playback, one frame per iteration, while `run` holds.
///
/// Blocks in the capture read and the playback write only. Empty or failed
/// reads and failed writes skip the frame; more than `max_consecutive_failures`
/// in a row ends the loop with [`DeviceError::TooManyFailures`]. A released
/// endpoint while still running ends it with [`DeviceError::Released`].
/// Endpoints are left open on exit; teardown belongs to the engine.
pub(crate) fn run_loop<C, P>(
    session: &DeviceSession<C, P>,
    frame: &mut FrameBuffer,
    gain: &GainSetting,
    run: &AtomicBool,
    stats: &LoopStats,
    max_consecutive_failures: u32,
) -> Result<(), DeviceError>
where
    C: CaptureEndpoint,
    P: PlaybackEndpoint,
{
    let mut budget = FailureBudget::new(max_consecutive_failures);

    while run.load(Ordering::Acquire) {
        match session.read_frame(frame) {
            Ok(count) if count > 0 => {}
            outcome => {
                if !run.load(Ordering::Acquire) {
                    break;
                }
                match outcome {
                    Err(DeviceError::Released) => return Err(DeviceError::Released),
                    Err(e) => {
                        stats.record_read_failure();
                        budget.failed(&e)?;
                    }
                    Ok(_) => {
                        stats.record_read_failure();
                        budget.failed(&NO_SAMPLES)?;
                    }
                }
                continue;
            }
        }

        // One gain read per frame: every sample of a frame sees the same value.
        GainStage::apply(frame.frame_mut(), gain.get());

        match session.write_frame(frame) {
            Ok(()) => {
                budget.succeeded();
                stats.record_frame(frame.len());
            }
            Err(e) => {
                if !run.load(Ordering::Acquire) {
                    break;
                }
                if e == DeviceError::Released {
                    return Err(e);
                }
                stats.record_write_failure();
                budget.failed(&e)?;
            }
        }
    }

    Ok(())
}
