//! Main window: controls, waveform plot, spectrum plot and status bar

use crate::decimate::min_max_decimate;
use eframe::egui;
use egui_plot::{Line, Plot, PlotPoints};
use pulse_visualizer::session::{AcquisitionSession, SessionEvent, SessionState};
use pulse_visualizer::spectrum::{MagnitudeScale, SpectrumConfig, WindowType};
use pulse_visualizer::{Frame, FrameStats, Spectrum};
use std::sync::Arc;
use std::time::Duration;

/// Points handed to each plot after decimation
const MAX_PLOT_POINTS: usize = 4000;

const REPAINT_INTERVAL: Duration = Duration::from_millis(50);

/// Plot data prepared once per new frame or spectrum
#[derive(Default)]
struct PlotCache {
    waveform: Vec<[f64; 2]>,
    spectrum: Vec<[f64; 2]>,
    stats: Option<FrameStats>,
    peak: Option<(f64, f64)>,
    spectrum_scale: MagnitudeScale,
}

pub struct PulseVisualizerApp {
    session: AcquisitionSession,
    stop_checked: bool,
    spectrum_config: SpectrumConfig,
    cache: PlotCache,
}

impl PulseVisualizerApp {
    pub fn new(_cc: &eframe::CreationContext<'_>, session: AcquisitionSession) -> Self {
        let spectrum_config = session.config().spectrum;
        Self {
            session,
            stop_checked: false,
            spectrum_config,
            cache: PlotCache::default(),
        }
    }

    fn start(&mut self) {
        match self.session.start() {
            Ok(true) => {
                // A STOP left checked before START gives a single frame
                if self.stop_checked {
                    self.session.request_stop();
                }
            }
            Ok(false) => log::debug!("START ignored, acquisition already running"),
            Err(e) => log::error!("Failed to start acquisition: {}", e),
        }
    }

    fn process_events(&mut self) {
        for event in self.session.poll() {
            match event {
                SessionEvent::FrameReady(frame) => self.update_waveform(&frame),
                SessionEvent::SpectrumReady(spectrum) => self.update_spectrum(&spectrum),
                SessionEvent::Stopped => self.stop_checked = false,
                SessionEvent::Failed(message) => log::warn!("{}", message),
            }
        }
    }

    fn update_waveform(&mut self, frame: &Arc<Frame>) {
        let axis = self.session.time_axis();
        self.cache.waveform = if frame.len() == axis.len() {
            min_max_decimate(axis, &frame.samples, MAX_PLOT_POINTS)
        } else {
            min_max_decimate(&frame.time_axis(), &frame.samples, MAX_PLOT_POINTS)
        };
        self.cache.stats = frame.stats();
    }

    fn update_spectrum(&mut self, spectrum: &Arc<Spectrum>) {
        self.cache.spectrum =
            min_max_decimate(&spectrum.frequencies, &spectrum.magnitudes, MAX_PLOT_POINTS);
        self.cache.peak = spectrum.peak();
        self.cache.spectrum_scale = spectrum.scale;
    }

    fn menu_bar(&self, ctx: &egui::Context, ui: &mut egui::Ui) {
        egui::menu::bar(ui, |ui| {
            ui.menu_button("File", |ui| {
                let exit = ui.add(
                    egui::Button::new("Exit")
                        .shortcut_text(ctx.format_shortcut(&exit_shortcut())),
                );
                if exit.clicked() {
                    ctx.send_viewport_cmd(egui::ViewportCommand::Close);
                }
            });
        });
    }

    fn controls(&mut self, ui: &mut egui::Ui) {
        ui.horizontal(|ui| {
            let idle = self.session.state() == SessionState::Idle;
            if ui
                .add_enabled(idle, egui::Button::new("START"))
                .on_hover_text("Start acquiring")
                .clicked()
            {
                self.start();
            }

            if ui
                .toggle_value(&mut self.stop_checked, "STOP")
                .on_hover_text("Stop after the current acquisition")
                .clicked()
                && self.stop_checked
            {
                self.session.request_stop();
            }

            ui.separator();

            let mut config = self.spectrum_config;
            ui.label("Window:");
            egui::ComboBox::from_id_salt("window_select")
                .selected_text(config.window.name())
                .show_ui(ui, |ui| {
                    for window in WindowType::ALL {
                        ui.selectable_value(&mut config.window, window, window.name())
                            .on_hover_text(format!(
                                "Highest sidelobe {:.1} dB",
                                window.sidelobe_level_db()
                            ));
                    }
                });
            ui.label("Scale:");
            ui.selectable_value(&mut config.scale, MagnitudeScale::Linear, "Linear");
            ui.selectable_value(&mut config.scale, MagnitudeScale::Decibel, "dB");

            if config != self.spectrum_config {
                self.spectrum_config = config;
                self.session.set_spectrum_config(config);
            }
        });
    }

    fn status_bar(&self, ui: &mut egui::Ui) {
        ui.horizontal(|ui| {
            ui.label(format!("State: {}", self.session.state().label()));
            ui.separator();
            ui.label(format!("Frames: {}", self.session.frames_acquired()));

            if let Some(stats) = &self.cache.stats {
                ui.separator();
                ui.label(format!(
                    "Min {:.4} V  Max {:.4} V  Vpp {:.4} V  RMS {:.4} V",
                    stats.min, stats.max, stats.peak_to_peak, stats.rms
                ));
            }

            if let Some((freq, magnitude)) = self.cache.peak {
                ui.separator();
                let unit = match self.cache.spectrum_scale {
                    MagnitudeScale::Linear => "V",
                    MagnitudeScale::Decibel => "dBV",
                };
                ui.label(format!("Peak {:.1} Hz @ {:.4} {}", freq, magnitude, unit));
            }

            if let Some(error) = self.session.last_error() {
                ui.separator();
                ui.colored_label(egui::Color32::LIGHT_RED, error);
            }
        });
    }

    fn plots(&self, ui: &mut egui::Ui) {
        let width = (ui.available_width() - ui.spacing().item_spacing.x) / 2.0;

        ui.horizontal(|ui| {
            ui.vertical(|ui| {
                ui.label("Time domain");
                Plot::new("time_plot")
                    .width(width)
                    .height(ui.available_height())
                    .x_axis_label("Time (s)")
                    .y_axis_label("Voltage (V)")
                    .show(ui, |plot_ui| {
                        plot_ui.line(
                            Line::new(PlotPoints::new(self.cache.waveform.clone()))
                                .color(egui::Color32::from_rgb(100, 200, 255))
                                .name("signal"),
                        );
                    });
            });

            ui.vertical(|ui| {
                ui.label("Frequency domain");
                let y_label = match self.cache.spectrum_scale {
                    MagnitudeScale::Linear => "Magnitude (V)",
                    MagnitudeScale::Decibel => "Magnitude (dBV)",
                };
                Plot::new("frequency_plot")
                    .width(width)
                    .height(ui.available_height())
                    .x_axis_label("Frequency (Hz)")
                    .y_axis_label(y_label)
                    .show(ui, |plot_ui| {
                        plot_ui.line(
                            Line::new(PlotPoints::new(self.cache.spectrum.clone()))
                                .color(egui::Color32::from_rgb(255, 200, 50))
                                .name("spectrum"),
                        );
                    });
            });
        });
    }
}

fn exit_shortcut() -> egui::KeyboardShortcut {
    egui::KeyboardShortcut::new(egui::Modifiers::COMMAND, egui::Key::W)
}

impl eframe::App for PulseVisualizerApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.process_events();

        if ctx.input_mut(|i| i.consume_shortcut(&exit_shortcut())) {
            ctx.send_viewport_cmd(egui::ViewportCommand::Close);
        }

        egui::TopBottomPanel::top("controls").show(ctx, |ui| {
            self.menu_bar(ctx, ui);
            self.controls(ui);
        });

        egui::TopBottomPanel::bottom("status").show(ctx, |ui| {
            self.status_bar(ui);
        });

        egui::CentralPanel::default().show(ctx, |ui| {
            self.plots(ui);
        });

        if self.session.is_running() {
            ctx.request_repaint_after(REPAINT_INTERVAL);
        }
    }
}
