use eframe::egui;
use egui_plot::{Line, Plot, PlotPoints};

use crate::conversion::ConvertedSession;
use crate::sink::SinkError;

pub const PLOT_TITLE: &str = "Bun Hopper Distance Testing";
pub const X_AXIS_LABEL: &str = "Time (sec)";
pub const Y_AXIS_LABEL: &str = "Distance (in)";

struct DistancePlot {
    session_index: u64,
    points: Vec<[f64; 2]>,
}

impl DistancePlot {
    fn new(session: &ConvertedSession) -> Self {
        Self {
            session_index: session.index,
            points: session.samples.iter().map(|s| [s.time, s.distance]).collect(),
        }
    }
}

impl eframe::App for DistancePlot {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        egui::CentralPanel::default().show(ctx, |ui| {
            ui.heading(PLOT_TITLE);
            ui.label(format!(
                "Session {} - {} samples. Close the window to arm the trigger again.",
                self.session_index,
                self.points.len()
            ));

            let line = Line::new(PlotPoints::from_iter(self.points.iter().copied())).name("distance");
            Plot::new("distance_vs_time")
                .x_axis_label(X_AXIS_LABEL)
                .y_axis_label(Y_AXIS_LABEL)
                .show(ui, |plot_ui| plot_ui.line(line));
        });
    }
}

/// Open the plot window and block until the user closes it.
pub fn show_blocking(session: &ConvertedSession) -> Result<(), SinkError> {
    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_title(PLOT_TITLE)
            .with_inner_size([900.0, 500.0]),
        ..Default::default()
    };

    let app = DistancePlot::new(session);
    log::debug!("Showing plot for session {}", session.index);
    eframe::run_native(PLOT_TITLE, options, Box::new(|_cc| Ok(Box::new(app))))
        .map_err(|e| SinkError::Plot(e.to_string()))
}
