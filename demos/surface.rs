use iced::widget::{Container, button, column, row, text};
use iced::{Element, Length, Theme};
use surface_plot::colormap::ColormapName;
use surface_plot::{BackendPreference, LinkGroup, SampleGrid, SurfacePlot, SurfacePlotOptions};
use tracing_subscriber::EnvFilter;

const ROWS: usize = 24;
const COLS: usize = 24;

pub fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    iced::application(SurfaceExample::new, SurfaceExample::update, SurfaceExample::view)
        .theme(Theme::Light)
        .run()
        .unwrap()
}

#[derive(Debug, Clone)]
enum Message {
    NextWave,
}

struct SurfaceExample {
    wave: f64,
    hardware: SurfacePlot,
    software: SurfacePlot,
}

/// A ripple whose frequency grows with `wave`.
fn ripple(wave: f64) -> SampleGrid {
    let values = (0..ROWS * COLS)
        .map(|k| {
            let x = (k / COLS) as f64 / (ROWS - 1) as f64 - 0.5;
            let y = (k % COLS) as f64 / (COLS - 1) as f64 - 0.5;
            let r = (x * x + y * y).sqrt();
            10.0 + 10.0 * (wave * r * std::f64::consts::TAU).cos() * (-2.0 * r).exp()
        })
        .collect();
    SampleGrid::new(ROWS, COLS, values).unwrap()
}

impl SurfaceExample {
    fn new() -> Self {
        let wave = 2.0;
        let tooltips = (0..ROWS * COLS)
            .map(|k| format!("row {}, column {}", k / COLS, k % COLS))
            .collect();

        let hardware = SurfacePlot::new(
            ripple(wave),
            SurfacePlotOptions::builder()
                .x_title("x")
                .y_title("y")
                .z_title("height")
                .colormap(ColormapName::Viridis)
                .backend(BackendPreference::Auto)
                .build(),
        )
        .unwrap();
        let software = SurfacePlot::new(
            ripple(wave),
            SurfacePlotOptions::builder()
                .x_title("x")
                .y_title("y")
                .z_title("height")
                .show_tooltips(true)
                .tooltips(tooltips)
                .backend(BackendPreference::Software)
                .build(),
        )
        .unwrap();

        let group = LinkGroup::new();
        hardware.link(&group);
        software.link(&group);

        Self {
            wave,
            hardware,
            software,
        }
    }

    fn update(&mut self, message: Message) {
        match message {
            Message::NextWave => {
                self.wave = self.wave % 6.0 + 1.0;
                for plot in [&self.hardware, &self.software] {
                    if let Err(err) = plot.set_data(ripple(self.wave)) {
                        tracing::error!(%err, "could not replace data");
                    }
                }
            }
        }
    }

    fn view(&self) -> Element<'_, Message> {
        let backend = |plot: &SurfacePlot| format!("{:?}", plot.backend());
        let controls = column![
            text("Drag to rotate, shift-drag or right-drag to scale."),
            text(format!(
                "left: {}, right: {}",
                backend(&self.hardware),
                backend(&self.software)
            )),
            button("Next wave").on_press(Message::NextWave),
        ]
        .spacing(8)
        .padding(12);

        column![
            controls,
            row![
                Container::new(self.hardware.draw())
                    .width(Length::FillPortion(1))
                    .height(Length::Fill),
                Container::new(self.software.draw())
                    .width(Length::FillPortion(1))
                    .height(Length::Fill),
            ]
            .spacing(8)
            .width(Length::Fill)
            .height(Length::Fill),
        ]
        .into()
    }
}
