//! # Spectrum Widget
//!
//! Magnitude spectrum of the latest frame as a bar chart, in dB below the
//! frame's peak. Only the bins up to [`MAX_DISPLAY_HZ`] are drawn, which
//! covers the singing range and its first few harmonics.
//!
//! A marker is drawn at the detected fundamental, if any.

use iced::widget::canvas::{self, Geometry, Path, Stroke};
use iced::widget::container;
use iced::{mouse, Color, Element, Point, Rectangle, Renderer, Size, Theme};

/// Highest frequency shown.
const MAX_DISPLAY_HZ: f32 = 4_000.0;
/// Bars below this level relative to the peak are not drawn.
const FLOOR_DB: f32 = -70.0;
const EPSILON: f32 = 1e-12;

pub struct Spectrum {
    magnitudes: Vec<f32>,
    /// Hz per bin: sample_rate / window_size.
    bin_hz: f32,
    fundamental: Option<f32>,
}

impl Spectrum {
    pub fn new(magnitudes: Vec<f32>, bin_hz: f32, fundamental: Option<f32>) -> Self {
        Self { magnitudes, bin_hz, fundamental }
    }

    pub fn view(self) -> Element<'static, crate::Message> {
        container(
            canvas::Canvas::new(self)
                .width(iced::Length::Fill)
                .height(iced::Length::Fill),
        )
        .into()
    }

    fn visible_bins(&self) -> usize {
        if !(self.bin_hz > 0.0) {
            return self.magnitudes.len();
        }
        ((MAX_DISPLAY_HZ / self.bin_hz) as usize).min(self.magnitudes.len())
    }
}

impl<Message> canvas::Program<Message> for Spectrum {
    type State = ();

    fn draw(
        &self,
        _state: &Self::State,
        renderer: &Renderer,
        _theme: &Theme,
        bounds: Rectangle,
        _cursor: mouse::Cursor,
    ) -> Vec<Geometry> {
        let mut frame = canvas::Frame::new(renderer, bounds.size());
        frame.fill(
            &Path::rectangle(Point::ORIGIN, bounds.size()),
            Color::from_rgb8(0x20, 0x22, 0x26),
        );

        let bins = self.visible_bins();
        if bins == 0 || !bounds.width.is_finite() || !bounds.height.is_finite() {
            return vec![frame.into_geometry()];
        }

        let shown = &self.magnitudes[..bins];
        let peak = shown.iter().fold(0.0f32, |max, &m| m.max(max));
        if peak <= 0.0 {
            return vec![frame.into_geometry()];
        }

        let bar_width = bounds.width / bins as f32;
        for (i, &magnitude) in shown.iter().enumerate() {
            let db = 20.0 * ((magnitude + EPSILON) / peak).log10();
            let level = (1.0 - db / FLOOR_DB).clamp(0.0, 1.0);
            let height = level * bounds.height;
            if height > 0.5 {
                let bar = Path::rectangle(
                    Point::new(i as f32 * bar_width, bounds.height - height),
                    Size::new(bar_width.max(1.0), height),
                );
                frame.fill(&bar, Color::from_rgb8(0x34, 0x98, 0xDB));
            }
        }

        if let Some(f0) = self.fundamental.filter(|&f| f < MAX_DISPLAY_HZ && self.bin_hz > 0.0) {
            let x = f0 / self.bin_hz * bar_width;
            frame.stroke(
                &Path::line(Point::new(x, 0.0), Point::new(x, bounds.height)),
                Stroke::default()
                    .with_width(1.5)
                    .with_color(Color::from_rgb8(0xFF, 0xC3, 0x00)),
            );
        }

        vec![frame.into_geometry()]
    }
}
