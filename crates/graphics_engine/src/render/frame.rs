//! Frame lifecycle: acquire, submit, present, and recreation on staleness

use crate::render::error::EngineResult;

/// Result of asking the swapchain for an image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquireOutcome {
    /// Image index ready to render into
    Acquired(u32),
    /// Surface changed; the chain must be rebuilt before drawing
    OutOfDate,
}

/// Result of queueing an image for display
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresentOutcome {
    /// Presented and the chain still matches the surface
    Presented,
    /// Presented or dropped, but the chain is out of date or suboptimal
    Stale,
}

/// The presentable image chain the frame controller drives
pub trait PresentationTarget {
    /// Request the next image, signalling "image available" when ready
    fn acquire(&mut self) -> EngineResult<AcquireOutcome>;

    /// Submit the prerecorded commands for `image_index` and block until the
    /// queue is idle
    fn submit(&mut self, image_index: u32) -> EngineResult<()>;

    /// Present `image_index` once rendering has finished
    fn present(&mut self, image_index: u32) -> EngineResult<PresentOutcome>;

    /// Wait for the device, then rebuild every surface-dependent object
    fn recreate(&mut self) -> EngineResult<()>;
}

/// Frame controller state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameState {
    /// Waiting for the next frame
    Idle,
    /// An image is acquired and waits for submission
    ImageAcquired(u32),
    /// Commands for the image are submitted and complete
    Submitted(u32),
    /// The image was handed to the presentation engine
    Presented(u32),
    /// Surface-dependent objects are being rebuilt
    Recreating,
}

/// What happened during one [`FrameController::draw_frame`] call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    /// A frame reached the display
    Presented,
    /// The surface was rebuilt; recorded commands are stale
    Recreated {
        /// Whether a frame was presented before the rebuild
        presented: bool,
    },
}

/// Drives one acquire, submit, present cycle at a time
///
/// Frames are not pipelined: `submit` waits for the queue, so at most one
/// frame's work is ever in flight.
#[derive(Debug)]
pub struct FrameController {
    state: FrameState,
    resize_pending: bool,
    frames_presented: u64,
    recreations: u64,
}

impl Default for FrameController {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameController {
    /// Controller in the idle state
    pub const fn new() -> Self {
        Self {
            state: FrameState::Idle,
            resize_pending: false,
            frames_presented: 0,
            recreations: 0,
        }
    }

    /// Current state
    pub const fn state(&self) -> FrameState {
        self.state
    }

    /// Frames presented so far
    pub const fn frames_presented(&self) -> u64 {
        self.frames_presented
    }

    /// Completed recreations so far
    pub const fn recreations(&self) -> u64 {
        self.recreations
    }

    /// Rebuild the chain at the start of the next frame
    pub fn notify_resized(&mut self) {
        self.resize_pending = true;
    }

    /// True when a resize is waiting to be handled
    pub const fn resize_pending(&self) -> bool {
        self.resize_pending
    }

    /// Run one frame against `target`
    ///
    /// An out-of-date surface is rebuilt here and reported as
    /// [`FrameOutcome::Recreated`]; callers re-record their commands and draw
    /// again next tick. Any other failure is returned and leaves the
    /// controller idle. A failed rebuild stays pending and is retried first
    /// thing on the next call.
    pub fn draw_frame(&mut self, target: &mut impl PresentationTarget) -> EngineResult<FrameOutcome> {
        let result = if self.resize_pending {
            self.recreate(target)
                .map(|()| FrameOutcome::Recreated { presented: false })
        } else {
            self.run_cycle(target)
        };
        if result.is_err() {
            self.state = FrameState::Idle;
        }
        result
    }

    fn run_cycle(&mut self, target: &mut impl PresentationTarget) -> EngineResult<FrameOutcome> {
        let image_index = match target.acquire()? {
            AcquireOutcome::Acquired(image_index) => image_index,
            AcquireOutcome::OutOfDate => {
                log::debug!("[FRAME] Acquire reported out of date");
                self.recreate(target)?;
                return Ok(FrameOutcome::Recreated { presented: false });
            }
        };
        self.state = FrameState::ImageAcquired(image_index);

        target.submit(image_index)?;
        self.state = FrameState::Submitted(image_index);

        let outcome = target.present(image_index)?;
        self.state = FrameState::Presented(image_index);
        self.frames_presented += 1;

        if outcome == PresentOutcome::Stale || self.resize_pending {
            log::debug!("[FRAME] Present reported stale surface");
            self.recreate(target)?;
            return Ok(FrameOutcome::Recreated { presented: true });
        }

        self.state = FrameState::Idle;
        Ok(FrameOutcome::Presented)
    }

    fn recreate(&mut self, target: &mut impl PresentationTarget) -> EngineResult<()> {
        self.state = FrameState::Recreating;
        // Cleared only once the rebuild succeeds
        self.resize_pending = true;
        target.recreate()?;
        self.resize_pending = false;
        self.recreations += 1;
        self.state = FrameState::Idle;
        log::info!("[FRAME] Surface recreated ({} total)", self.recreations);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::error::EngineError;
    use std::collections::VecDeque;

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum Call {
        Acquire,
        Submit(u32),
        Present(u32),
        Recreate,
    }

    #[derive(Default)]
    struct ScriptedTarget {
        acquires: VecDeque<AcquireOutcome>,
        presents: VecDeque<PresentOutcome>,
        calls: Vec<Call>,
        generation: u32,
        recorded_generation: Option<u32>,
        fail_submit: bool,
        failing_recreates: u32,
    }

    impl PresentationTarget for ScriptedTarget {
        fn acquire(&mut self) -> EngineResult<AcquireOutcome> {
            self.calls.push(Call::Acquire);
            Ok(self.acquires.pop_front().unwrap_or(AcquireOutcome::Acquired(0)))
        }

        fn submit(&mut self, image_index: u32) -> EngineResult<()> {
            self.calls.push(Call::Submit(image_index));
            if self.fail_submit {
                return Err(EngineError::Api(ash::vk::Result::ERROR_DEVICE_LOST));
            }
            // commands recorded against an older chain would reference freed objects
            assert_eq!(self.recorded_generation, Some(self.generation));
            Ok(())
        }

        fn present(&mut self, image_index: u32) -> EngineResult<PresentOutcome> {
            self.calls.push(Call::Present(image_index));
            Ok(self.presents.pop_front().unwrap_or(PresentOutcome::Presented))
        }

        fn recreate(&mut self) -> EngineResult<()> {
            self.calls.push(Call::Recreate);
            if self.failing_recreates > 0 {
                self.failing_recreates -= 1;
                return Err(EngineError::Api(ash::vk::Result::ERROR_OUT_OF_DEVICE_MEMORY));
            }
            self.generation += 1;
            Ok(())
        }
    }

    impl ScriptedTarget {
        fn record(&mut self) {
            self.recorded_generation = Some(self.generation);
        }
    }

    #[test]
    fn test_normal_frame_visits_every_state() {
        let mut controller = FrameController::new();
        let mut target = ScriptedTarget::default();
        target.acquires.push_back(AcquireOutcome::Acquired(2));
        target.record();

        assert_eq!(controller.draw_frame(&mut target).unwrap(), FrameOutcome::Presented);
        assert_eq!(target.calls, vec![Call::Acquire, Call::Submit(2), Call::Present(2)]);
        assert_eq!(controller.state(), FrameState::Idle);
        assert_eq!(controller.frames_presented(), 1);
    }

    #[test]
    fn test_out_of_date_acquire_skips_frame_and_recreates() {
        let mut controller = FrameController::new();
        let mut target = ScriptedTarget::default();
        target.acquires.push_back(AcquireOutcome::OutOfDate);
        target.record();

        assert_eq!(
            controller.draw_frame(&mut target).unwrap(),
            FrameOutcome::Recreated { presented: false }
        );
        assert_eq!(target.calls, vec![Call::Acquire, Call::Recreate]);
        assert_eq!(controller.state(), FrameState::Idle);
        assert_eq!(controller.frames_presented(), 0);
    }

    #[test]
    fn test_stale_present_recreates_after_presenting() {
        let mut controller = FrameController::new();
        let mut target = ScriptedTarget::default();
        target.presents.push_back(PresentOutcome::Stale);
        target.record();

        assert_eq!(
            controller.draw_frame(&mut target).unwrap(),
            FrameOutcome::Recreated { presented: true }
        );
        assert_eq!(target.calls.last(), Some(&Call::Recreate));
        assert_eq!(controller.recreations(), 1);
    }

    #[test]
    fn test_resize_then_rerecord_then_draw() {
        let mut controller = FrameController::new();
        let mut target = ScriptedTarget::default();
        target.record();
        controller.draw_frame(&mut target).unwrap();

        controller.notify_resized();
        assert!(controller.resize_pending());
        let outcome = controller.draw_frame(&mut target).unwrap();
        assert_eq!(outcome, FrameOutcome::Recreated { presented: false });
        assert!(!controller.resize_pending());

        // the caller re-records against the rebuilt chain before drawing again
        target.record();
        target.calls.clear();
        assert_eq!(controller.draw_frame(&mut target).unwrap(), FrameOutcome::Presented);
        assert_eq!(target.calls, vec![Call::Acquire, Call::Submit(0), Call::Present(0)]);
        assert_eq!(controller.frames_presented(), 2);
    }

    #[test]
    fn test_submit_failure_is_fatal_and_resets_state() {
        let mut controller = FrameController::new();
        let mut target = ScriptedTarget {
            fail_submit: true,
            ..ScriptedTarget::default()
        };

        assert!(matches!(
            controller.draw_frame(&mut target),
            Err(EngineError::Api(ash::vk::Result::ERROR_DEVICE_LOST))
        ));
        assert_eq!(controller.state(), FrameState::Idle);
        assert!(!target.calls.contains(&Call::Present(0)));
    }

    #[test]
    fn test_failed_recreation_is_retried_next_frame() {
        let mut controller = FrameController::new();
        let mut target = ScriptedTarget {
            failing_recreates: 1,
            ..ScriptedTarget::default()
        };
        target.acquires.push_back(AcquireOutcome::OutOfDate);
        target.record();

        assert!(controller.draw_frame(&mut target).is_err());
        assert_eq!(controller.state(), FrameState::Idle);
        assert!(controller.resize_pending());
        assert_eq!(controller.recreations(), 0);

        target.calls.clear();
        assert_eq!(
            controller.draw_frame(&mut target).unwrap(),
            FrameOutcome::Recreated { presented: false }
        );
        assert_eq!(target.calls, vec![Call::Recreate]);
        assert!(!controller.resize_pending());

        target.record();
        assert_eq!(controller.draw_frame(&mut target).unwrap(), FrameOutcome::Presented);
    }

    #[test]
    fn test_failed_rebuild_after_stale_present_stays_pending() {
        let mut controller = FrameController::new();
        let mut target = ScriptedTarget {
            failing_recreates: 2,
            ..ScriptedTarget::default()
        };
        target.presents.push_back(PresentOutcome::Stale);
        target.record();

        assert!(controller.draw_frame(&mut target).is_err());
        assert!(controller.draw_frame(&mut target).is_err());
        assert!(controller.resize_pending());
        assert_eq!(controller.frames_presented(), 1);

        assert_eq!(
            controller.draw_frame(&mut target).unwrap(),
            FrameOutcome::Recreated { presented: false }
        );
        assert_eq!(controller.recreations(), 1);
    }
}
