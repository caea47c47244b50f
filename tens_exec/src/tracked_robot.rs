//! # Tracked robot
//!
//! The robot and its tracker together, the interface used to run gait trials: set an actuation
//! vector, wait for the struts to finish and read back where the robot ended up.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::time::Duration;

use comms_if::eqpt::cam::Position;
use log::{debug, info};

use crate::{
    robot_ctrl::{RobotCtrl, RobotError},
    strut_ctrl::{BootReport, PollPolicy, Transport},
    tracker::PositionSource,
};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

pub struct TrackedRobot<T, P> {
    robot: RobotCtrl<T>,
    tracker: P,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum TrackedRobotError {
    #[error(transparent)]
    Robot(#[from] RobotError),

    #[error("Robot still {distance_px:.1} px from the centre after {attempts} polls")]
    RecenterTimeout { distance_px: f64, attempts: u32 },
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl<T: Transport, P: PositionSource> TrackedRobot<T, P> {
    pub fn new(robot: RobotCtrl<T>, tracker: P) -> Self {
        Self { robot, tracker }
    }

    /// Boot check every strut.
    pub fn boot(&mut self) -> Result<Vec<BootReport>, TrackedRobotError> {
        Ok(self.robot.boot_all()?)
    }

    /// Run `values` on the struts and block until they have all finished.
    ///
    /// Struts which restarted during the previous run are boot checked first.
    pub fn set_and_wait(&mut self, values: &[u8]) -> Result<(), TrackedRobotError> {
        self.robot.reboot_aborted()?;
        self.robot.run_vector(values, true)?;
        Ok(())
    }

    /// Run `values` on the struts, then sleep for `duration` instead of waiting on completion.
    pub fn set_and_sleep(
        &mut self,
        values: &[u8],
        duration: Duration,
    ) -> Result<(), TrackedRobotError> {
        self.robot.reboot_aborted()?;
        self.robot.run_vector(values, false)?;
        std::thread::sleep(duration);
        Ok(())
    }

    /// Bring every strut to rest.
    pub fn stop(&mut self) -> Result<(), TrackedRobotError> {
        info!("Stopping all struts");
        self.robot.reboot_aborted()?;
        self.robot.set_uniform(0)?;
        Ok(())
    }

    pub fn position(&self) -> Position {
        self.tracker.current_position()
    }

    pub fn frame_center(&self) -> (u32, u32) {
        self.tracker.frame_center()
    }

    /// Distance from `position` to the frame centre, infinite if the position is unknown.
    pub fn distance_from_center(&self, position: &Position) -> f64 {
        if position.is_unknown() {
            return f64::INFINITY;
        }

        let (cx, cy) = self.frame_center();
        position.distance_to(&Position::new(cx as f64, cy as f64))
    }

    /// Block until the robot is within `threshold_px` of the frame centre.
    ///
    /// The robot is moved back by hand, this only watches.
    pub fn recenter_blocking(
        &self,
        threshold_px: f64,
        poll: &PollPolicy,
    ) -> Result<Position, TrackedRobotError> {
        let mut attempts = 0;
        let mut prompted = false;

        loop {
            attempts += 1;

            let position = self.position();
            let distance = self.distance_from_center(&position);
            if distance <= threshold_px {
                debug!("Robot centred at {} after {} polls", position, attempts);
                return Ok(position);
            }

            if !prompted {
                info!(
                    "Please return the robot to the centre {:?}, it is at {}",
                    self.frame_center(),
                    position
                );
                prompted = true;
            }

            if poll.exhausted(attempts) {
                return Err(TrackedRobotError::RecenterTimeout {
                    distance_px: distance,
                    attempts,
                });
            }
            poll.wait();
        }
    }

    pub fn robot(&self) -> &RobotCtrl<T> {
        &self.robot
    }

    pub fn tracker(&self) -> &P {
        &self.tracker
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------
