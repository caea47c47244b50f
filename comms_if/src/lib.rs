//! # Communications interface crate.
//!
//! Provides the interfaces shared between the strut control and camera tracking sides of the
//! software.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// Protocol and calibration definitions for equipment (struts and the tracking camera)
pub mod eqpt;
