//! Sound-card input as an analog input task
//!
//! A cpal input stream runs for the lifetime of the task and copies the
//! first channel into a ring buffer while a finite acquisition is armed.
//! `cpal::Stream` cannot leave the thread that built it, so it lives on a
//! dedicated thread that only waits for the shutdown signal.

use super::buffer::{SampleConsumer, SampleRingBuffer};
use super::{AnalogInputTask, Backend, DaqError, TaskInfo};
use crate::config::AcquisitionConfig;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, StreamConfig};
use crossbeam_channel::{bounded, Sender};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

const POLL_INTERVAL: Duration = Duration::from_millis(2);

/// Input device description
#[derive(Debug, Clone)]
pub struct InputDeviceInfo {
    pub name: String,
    pub sample_rate: u32,
    pub channels: u16,
}

/// List available input devices with their default configuration
pub fn list_input_devices() -> Result<Vec<InputDeviceInfo>, DaqError> {
    let host = cpal::default_host();
    let mut devices = Vec::new();

    let device_iter = host
        .input_devices()
        .map_err(|e| DaqError::Stream(e.to_string()))?;

    for device in device_iter {
        if let Ok(name) = device.name() {
            if let Ok(config) = device.default_input_config() {
                devices.push(InputDeviceInfo {
                    name,
                    sample_rate: config.sample_rate().0,
                    channels: config.channels(),
                });
            }
        }
    }

    Ok(devices)
}

fn find_device(name: Option<&str>) -> Result<Device, DaqError> {
    let host = cpal::default_host();
    match name {
        None => host.default_input_device().ok_or(DaqError::NoDevice),
        Some(wanted) => host
            .input_devices()
            .map_err(|e| DaqError::Stream(e.to_string()))?
            .find(|device| device.name().map_or(false, |n| n == wanted))
            .ok_or(DaqError::NoDevice),
    }
}

/// State shared with the audio callback
struct Capture {
    /// Samples still wanted by the armed acquisition; 0 when disarmed
    remaining: AtomicUsize,
    overruns: AtomicUsize,
    error: Mutex<Option<String>>,
}

pub struct SoundCardTask {
    info: TaskInfo,
    consumer: SampleConsumer,
    capture: Arc<Capture>,
    shutdown: Option<Sender<()>>,
    stream_thread: Option<JoinHandle<()>>,
    running: bool,
}

impl SoundCardTask {
    /// Open `device_name` (or the default input) at the configured rate
    pub fn new(config: &AcquisitionConfig, device_name: Option<&str>) -> Result<Self, DaqError> {
        config
            .validate()
            .map_err(|e| DaqError::InvalidParameter(e.to_string()))?;
        let samples = config.samples_per_channel;
        let requested = config.sample_rate;
        let (producer, consumer) = SampleRingBuffer::new(samples.saturating_mul(2)).split();
        let capture = Arc::new(Capture {
            remaining: AtomicUsize::new(0),
            overruns: AtomicUsize::new(0),
            error: Mutex::new(None),
        });

        let (ready_tx, ready_rx) = bounded::<Result<String, DaqError>>(1);
        let (shutdown_tx, shutdown_rx) = bounded::<()>(1);
        let device_name = device_name.map(str::to_owned);
        let callback_capture = Arc::clone(&capture);
        let error_capture = Arc::clone(&capture);

        let stream_thread = std::thread::Builder::new()
            .name("soundcard-stream".into())
            .spawn(move || {
                let opened = (|| -> Result<(cpal::Stream, String), DaqError> {
                    let device = find_device(device_name.as_deref())?;
                    let name = device
                        .name()
                        .map_err(|e| DaqError::Stream(e.to_string()))?;
                    let default = device
                        .default_input_config()
                        .map_err(|e| DaqError::Stream(e.to_string()))?;

                    let actual = default.sample_rate().0 as f64;
                    if (actual - requested).abs() > f64::EPSILON {
                        return Err(DaqError::UnsupportedSampleRate { requested, actual });
                    }

                    let channels = default.channels() as usize;
                    let stream_config: StreamConfig = default.into();
                    let mut producer = producer;

                    let stream = device
                        .build_input_stream(
                            &stream_config,
                            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                                let remaining =
                                    callback_capture.remaining.load(Ordering::Acquire);
                                if remaining == 0 || channels == 0 {
                                    return;
                                }
                                let frames = (data.len() / channels).min(remaining);
                                let written =
                                    producer.write_channel(&data[..frames * channels], channels, 0);
                                if written < frames {
                                    callback_capture.overruns.fetch_add(1, Ordering::Relaxed);
                                }
                                callback_capture
                                    .remaining
                                    .fetch_sub(written, Ordering::AcqRel);
                            },
                            move |err| {
                                if let Ok(mut slot) = error_capture.error.lock() {
                                    *slot = Some(err.to_string());
                                }
                            },
                            None,
                        )
                        .map_err(|e| DaqError::Stream(e.to_string()))?;
                    stream
                        .play()
                        .map_err(|e| DaqError::Stream(e.to_string()))?;
                    Ok((stream, name))
                })();

                match opened {
                    Ok((stream, name)) => {
                        let _ = ready_tx.send(Ok(name));
                        let _ = shutdown_rx.recv();
                        drop(stream);
                    }
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                    }
                }
            })
            .map_err(|e| DaqError::Stream(e.to_string()))?;

        let opened = ready_rx
            .recv()
            .map_err(|_| DaqError::Stream("audio thread exited during setup".into()))
            .and_then(|result| result);

        let name = match opened {
            Ok(name) => name,
            Err(e) => {
                let _ = stream_thread.join();
                return Err(e);
            }
        };
        log::info!("Sound card input '{}' at {} Hz", name, requested);

        Ok(Self {
            info: TaskInfo::from_config(config, Backend::SoundCard),
            consumer,
            capture,
            shutdown: Some(shutdown_tx),
            stream_thread: Some(stream_thread),
            running: false,
        })
    }

    fn take_stream_error(&self) -> Option<String> {
        self.capture
            .error
            .lock()
            .ok()
            .and_then(|mut slot| slot.take())
    }
}

impl AnalogInputTask for SoundCardTask {
    fn start(&mut self) -> Result<(), DaqError> {
        if self.running {
            return Err(DaqError::InvalidState("task is already running"));
        }
        self.consumer.clear();
        self.capture.overruns.store(0, Ordering::Relaxed);
        self.capture
            .remaining
            .store(self.info.samples_per_channel, Ordering::Release);
        self.running = true;
        Ok(())
    }

    fn wait_until_done(&mut self, timeout: Duration) -> Result<(), DaqError> {
        if !self.running {
            return Err(DaqError::InvalidState("task is not running"));
        }
        let deadline = Instant::now() + timeout;
        while self.consumer.available() < self.info.samples_per_channel {
            if let Some(message) = self.take_stream_error() {
                return Err(DaqError::Stream(message));
            }
            if Instant::now() >= deadline {
                return Err(DaqError::Timeout);
            }
            std::thread::sleep(POLL_INTERVAL);
        }

        let overruns = self.capture.overruns.load(Ordering::Relaxed);
        if overruns > 0 {
            log::warn!("Sound card buffer overran {} times", overruns);
        }
        Ok(())
    }

    fn read(&mut self, buffer: &mut [f64], _timeout: Duration) -> Result<usize, DaqError> {
        if !self.running {
            return Err(DaqError::InvalidState("task is not running"));
        }
        Ok(self.consumer.read(buffer))
    }

    fn stop(&mut self) -> Result<(), DaqError> {
        self.capture.remaining.store(0, Ordering::Release);
        self.running = false;
        Ok(())
    }

    fn info(&self) -> &TaskInfo {
        &self.info
    }
}

impl Drop for SoundCardTask {
    fn drop(&mut self) {
        self.capture.remaining.store(0, Ordering::Release);
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        if let Some(handle) = self.stream_thread.take() {
            if handle.join().is_err() {
                log::error!("Sound card stream thread panicked");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_devices() {
        // Hosts without audio hardware return an empty list or an error
        let _ = list_input_devices();
    }

    #[test]
    fn test_oversized_frame_is_rejected() {
        let config = AcquisitionConfig {
            samples_per_channel: usize::MAX,
            ..AcquisitionConfig::default()
        };
        assert!(matches!(
            SoundCardTask::new(&config, None),
            Err(DaqError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_unknown_device_is_rejected() {
        let config = AcquisitionConfig::default();
        assert!(SoundCardTask::new(&config, Some("no such device")).is_err());
    }
}
