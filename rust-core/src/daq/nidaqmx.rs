//! NI-DAQmx analog input task
//!
//! Thin FFI layer over the NI-DAQmx ANSI C driver. Only the calls needed for
//! a single-channel, finite, sample-clocked voltage acquisition are bound.

use super::{AnalogInputTask, Backend, DaqError, SampleMode, TaskInfo, TerminalConfig};
use crate::config::AcquisitionConfig;
use std::ffi::{c_char, c_void, CString};
use std::ptr;
use std::time::Duration;

type TaskHandle = *mut c_void;

const DAQMX_VAL_CFG_DEFAULT: i32 = -1;
const DAQMX_VAL_RSE: i32 = 10083;
const DAQMX_VAL_NRSE: i32 = 10078;
const DAQMX_VAL_DIFF: i32 = 10106;
const DAQMX_VAL_PSEUDO_DIFF: i32 = 12529;
const DAQMX_VAL_VOLTS: i32 = 10348;
const DAQMX_VAL_RISING: i32 = 10280;
const DAQMX_VAL_FINITE_SAMPS: i32 = 10178;
const DAQMX_VAL_CONT_SAMPS: i32 = 10123;
const DAQMX_VAL_GROUP_BY_CHANNEL: u32 = 0;

/// Returned by DAQmxWaitUntilTaskDone and DAQmxReadAnalogF64 on timeout
const DAQMX_ERROR_TIMEOUT: i32 = -200474;

const ERROR_BUFFER_LEN: usize = 2048;

#[cfg_attr(windows, link(name = "NIDAQmx"))]
#[cfg_attr(not(windows), link(name = "nidaqmx"))]
extern "C" {
    fn DAQmxCreateTask(task_name: *const c_char, task_handle: *mut TaskHandle) -> i32;
    fn DAQmxCreateAIVoltageChan(
        task_handle: TaskHandle,
        physical_channel: *const c_char,
        name_to_assign_to_channel: *const c_char,
        terminal_config: i32,
        min_val: f64,
        max_val: f64,
        units: i32,
        custom_scale_name: *const c_char,
    ) -> i32;
    fn DAQmxCfgSampClkTiming(
        task_handle: TaskHandle,
        source: *const c_char,
        rate: f64,
        active_edge: i32,
        sample_mode: i32,
        samps_per_chan: u64,
    ) -> i32;
    fn DAQmxStartTask(task_handle: TaskHandle) -> i32;
    fn DAQmxStopTask(task_handle: TaskHandle) -> i32;
    fn DAQmxClearTask(task_handle: TaskHandle) -> i32;
    fn DAQmxWaitUntilTaskDone(task_handle: TaskHandle, time_to_wait: f64) -> i32;
    fn DAQmxReadAnalogF64(
        task_handle: TaskHandle,
        num_samps_per_chan: i32,
        timeout: f64,
        fill_mode: u32,
        read_array: *mut f64,
        array_size_in_samps: u32,
        samps_per_chan_read: *mut i32,
        reserved: *mut u32,
    ) -> i32;
    fn DAQmxGetExtendedErrorInfo(error_string: *mut c_char, buffer_size: u32) -> i32;
}

fn terminal_code(terminal: TerminalConfig) -> i32 {
    match terminal {
        TerminalConfig::Default => DAQMX_VAL_CFG_DEFAULT,
        TerminalConfig::Rse => DAQMX_VAL_RSE,
        TerminalConfig::Nrse => DAQMX_VAL_NRSE,
        TerminalConfig::Differential => DAQMX_VAL_DIFF,
        TerminalConfig::PseudoDifferential => DAQMX_VAL_PSEUDO_DIFF,
    }
}

fn sample_mode_code(mode: SampleMode) -> i32 {
    match mode {
        SampleMode::Finite => DAQMX_VAL_FINITE_SAMPS,
        SampleMode::Continuous => DAQMX_VAL_CONT_SAMPS,
    }
}

/// Text of the most recent driver error on this thread
fn extended_error_info() -> String {
    let mut buffer = vec![0u8; ERROR_BUFFER_LEN];
    // SAFETY: the buffer is writable for ERROR_BUFFER_LEN bytes and the
    // driver NUL-terminates within the given size.
    let status = unsafe {
        DAQmxGetExtendedErrorInfo(buffer.as_mut_ptr() as *mut c_char, ERROR_BUFFER_LEN as u32)
    };
    if status < 0 {
        return String::from("(no extended error information)");
    }
    let end = buffer.iter().position(|&b| b == 0).unwrap_or(buffer.len());
    String::from_utf8_lossy(&buffer[..end]).into_owned()
}

/// Map a DAQmx status code to a result, logging warnings
fn check(status: i32, call: &str) -> Result<(), DaqError> {
    if status == DAQMX_ERROR_TIMEOUT {
        return Err(DaqError::Timeout);
    }
    if status < 0 {
        let message = extended_error_info();
        log::error!("{} failed with {}: {}", call, status, message);
        return Err(DaqError::Driver {
            code: status,
            message,
        });
    }
    if status > 0 {
        log::warn!("{} returned warning {}", call, status);
    }
    Ok(())
}

fn c_string(value: &str) -> Result<CString, DaqError> {
    CString::new(value)
        .map_err(|_| DaqError::InvalidParameter(format!("'{}' contains a NUL byte", value)))
}

/// Hardware analog input task
pub struct NiTask {
    handle: TaskHandle,
    info: TaskInfo,
    running: bool,
}

// SAFETY: DAQmx task handles may be used from any thread; the session only
// ever touches a task from one thread at a time through its mutex.
unsafe impl Send for NiTask {}

impl NiTask {
    /// Create the task, add the voltage channel and configure the clock
    pub fn new(config: &AcquisitionConfig) -> Result<Self, DaqError> {
        let name = c_string(&config.task_name)?;
        let channel = c_string(&config.physical_channel)?;
        let samples = u64::try_from(config.samples_per_channel)
            .map_err(|_| DaqError::InvalidParameter("samples_per_channel is too large".into()))?;

        let mut handle: TaskHandle = ptr::null_mut();
        // SAFETY: `name` outlives the call and `handle` is a valid out pointer.
        check(
            unsafe { DAQmxCreateTask(name.as_ptr(), &mut handle) },
            "DAQmxCreateTask",
        )?;

        // Cleared on drop from here on, including when configuration fails
        let task = Self {
            handle,
            info: TaskInfo::from_config(config, Backend::NiDaqmx),
            running: false,
        };

        // SAFETY: the handle is live; strings outlive the calls and null is
        // accepted for the channel name and custom scale.
        check(
            unsafe {
                DAQmxCreateAIVoltageChan(
                    task.handle,
                    channel.as_ptr(),
                    ptr::null(),
                    terminal_code(config.terminal),
                    config.min_voltage,
                    config.max_voltage,
                    DAQMX_VAL_VOLTS,
                    ptr::null(),
                )
            },
            "DAQmxCreateAIVoltageChan",
        )?;

        // SAFETY: null source selects the onboard clock.
        check(
            unsafe {
                DAQmxCfgSampClkTiming(
                    task.handle,
                    ptr::null(),
                    config.sample_rate,
                    DAQMX_VAL_RISING,
                    sample_mode_code(config.sample_mode),
                    samples,
                )
            },
            "DAQmxCfgSampClkTiming",
        )?;

        Ok(task)
    }
}

impl AnalogInputTask for NiTask {
    fn start(&mut self) -> Result<(), DaqError> {
        if self.running {
            return Err(DaqError::InvalidState("task is already running"));
        }
        // SAFETY: the handle stays valid until drop.
        check(unsafe { DAQmxStartTask(self.handle) }, "DAQmxStartTask")?;
        self.running = true;
        Ok(())
    }

    fn wait_until_done(&mut self, timeout: Duration) -> Result<(), DaqError> {
        // SAFETY: see `start`.
        check(
            unsafe { DAQmxWaitUntilTaskDone(self.handle, timeout.as_secs_f64()) },
            "DAQmxWaitUntilTaskDone",
        )
    }

    fn read(&mut self, buffer: &mut [f64], timeout: Duration) -> Result<usize, DaqError> {
        let requested = i32::try_from(buffer.len())
            .map_err(|_| DaqError::InvalidParameter("read buffer is too large".into()))?;
        let mut read: i32 = 0;

        // SAFETY: `buffer` is writable for `requested` samples, which is
        // also passed as the array size.
        check(
            unsafe {
                DAQmxReadAnalogF64(
                    self.handle,
                    requested,
                    timeout.as_secs_f64(),
                    DAQMX_VAL_GROUP_BY_CHANNEL,
                    buffer.as_mut_ptr(),
                    requested as u32,
                    &mut read,
                    ptr::null_mut(),
                )
            },
            "DAQmxReadAnalogF64",
        )?;

        Ok(read.max(0) as usize)
    }

    fn stop(&mut self) -> Result<(), DaqError> {
        if !self.running {
            return Ok(());
        }
        // SAFETY: see `start`.
        check(unsafe { DAQmxStopTask(self.handle) }, "DAQmxStopTask")?;
        self.running = false;
        Ok(())
    }

    fn info(&self) -> &TaskInfo {
        &self.info
    }
}

impl Drop for NiTask {
    fn drop(&mut self) {
        if self.handle.is_null() {
            return;
        }
        // SAFETY: the handle is cleared exactly once.
        let status = unsafe { DAQmxClearTask(self.handle) };
        if status < 0 {
            log::warn!("DAQmxClearTask failed with {}", status);
        }
        self.handle = ptr::null_mut();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_codes() {
        assert_eq!(terminal_code(TerminalConfig::Differential), 10106);
        assert_eq!(terminal_code(TerminalConfig::Rse), 10083);
        assert_eq!(terminal_code(TerminalConfig::Default), -1);
        assert_eq!(sample_mode_code(SampleMode::Finite), 10178);
    }

    #[test]
    fn test_nul_in_channel_rejected() {
        assert!(matches!(
            c_string("Dev1\0/ai1"),
            Err(DaqError::InvalidParameter(_))
        ));
    }
}
