//! # Robot control module
//!
//! Groups the struts of a tensegrity into a single robot. Struts are indexed in the order they were
//! registered, and an actuation vector is applied to the struts in that order.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use log::{info, warn};

use crate::strut_ctrl::{BootReport, Completion, StrutCtrl, StrutError, StrutState, Transport};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// An ordered collection of strut controllers.
pub struct RobotCtrl<T> {
    struts: Vec<StrutCtrl<T>>,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RobotError {
    #[error("Strut {index} ({name}) failed: {source}")]
    Strut {
        index: usize,
        name: String,
        source: StrutError,
    },

    #[error("Expected {expected} actuation values (one per strut) but got {got}")]
    VectorLength { expected: usize, got: usize },

    #[error("The wait on strut {index} panicked")]
    WaitPanicked { index: usize },
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl<T: Transport> RobotCtrl<T> {
    pub fn new(struts: Vec<StrutCtrl<T>>) -> Self {
        Self { struts }
    }

    pub fn len(&self) -> usize {
        self.struts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.struts.is_empty()
    }

    pub fn struts(&self) -> &[StrutCtrl<T>] {
        &self.struts
    }

    /// Boot check every strut in registration order.
    pub fn boot_all(&mut self) -> Result<Vec<BootReport>, RobotError> {
        let mut reports = Vec::with_capacity(self.struts.len());

        for (index, strut) in self.struts.iter_mut().enumerate() {
            reports.push(strut.boot_check().map_err(|e| strut_error(index, strut, e))?);
        }

        info!("All {} struts booted", self.struts.len());

        Ok(reports)
    }

    /// Start `values[i]` on strut `i`, in order, then optionally wait for all of them to finish.
    ///
    /// The length of `values` is checked before anything is sent.
    pub fn run_vector(&mut self, values: &[u8], wait: bool) -> Result<(), RobotError> {
        if values.len() != self.struts.len() {
            return Err(RobotError::VectorLength {
                expected: self.struts.len(),
                got: values.len(),
            });
        }

        for (index, (strut, value)) in self.struts.iter_mut().zip(values).enumerate() {
            strut
                .start(*value)
                .map_err(|e| strut_error(index, strut, e))?;
        }

        if wait {
            self.await_all_completion()?;
        }

        Ok(())
    }

    /// Wait for every strut to report it has finished.
    ///
    /// Each strut is waited on from its own thread so that one slow strut does not hold up polling
    /// of the others. All waits are joined before returning, the first failure by index is
    /// reported.
    pub fn await_all_completion(&mut self) -> Result<Vec<Completion>, RobotError> {
        let results: Vec<_> = std::thread::scope(|s| {
            let handles: Vec<_> = self
                .struts
                .iter_mut()
                .map(|strut| s.spawn(move || strut.await_completion()))
                .collect();

            handles.into_iter().map(|h| h.join()).collect()
        });

        let mut completions = Vec::with_capacity(results.len());

        for (index, result) in results.into_iter().enumerate() {
            match result {
                Ok(Ok(c)) => {
                    if c.is_aborted() {
                        warn!(
                            "Strut {} restarted during the run, rebooting it before the next run",
                            self.struts[index].name()
                        );
                    }
                    completions.push(c)
                }
                Ok(Err(e)) => return Err(strut_error(index, &self.struts[index], e)),
                Err(_) => return Err(RobotError::WaitPanicked { index }),
            }
        }

        Ok(completions)
    }

    /// Run the same value on every strut and wait for them to finish.
    pub fn set_uniform(&mut self, value: u8) -> Result<(), RobotError> {
        let values = vec![value; self.struts.len()];
        self.run_vector(&values, true)
    }

    /// Boot check any strut which restarted during its last run.
    pub fn reboot_aborted(&mut self) -> Result<(), RobotError> {
        for (index, strut) in self.struts.iter_mut().enumerate() {
            if strut.state() == StrutState::Aborted {
                info!("Rebooting strut {}", strut.name());
                strut
                    .boot_check()
                    .map_err(|e| strut_error(index, strut, e))?;
            }
        }

        Ok(())
    }
}

fn strut_error<T>(index: usize, strut: &StrutCtrl<T>, source: StrutError) -> RobotError {
    RobotError::Strut {
        index,
        name: strut.name().to_string(),
        source,
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------
