//! # Tensegrity library.
//!
//! Control of a tensegrity robot made of independently actuated struts, with the robot's position
//! tracked by an overhead camera. Used by the `tens_exec` executable and by anything that wants to
//! run gait trials on the robot.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// Strut control - the link to and lifecycle of a single strut
pub mod strut_ctrl;

/// Robot control - runs actuation vectors over all struts
pub mod robot_ctrl;

/// Tracker - camera frames in, robot position out
pub mod tracker;

/// Tracked robot - the robot and its tracker together
pub mod tracked_robot;

/// Parameters for the executable
pub mod params;

/// Trial console commands and records
pub mod console;
