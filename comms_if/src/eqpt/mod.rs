//! # Equipment Interface
//!
//! This module defines the interface structures exchanged with the tensegrity's equipment: the
//! struts over their wireless link and the tracking camera.

// -----------------------------------------------------------------------------------------------
// MODULES
// -----------------------------------------------------------------------------------------------

pub mod cam;
pub mod strut;
