//! # Quality Meter Widget
//!
//! Horizontal bar showing the 0-100 input quality score, coloured by grade,
//! with tick marks at the grade boundaries. The frame outline turns red while
//! the input is clipping.

use iced::widget::canvas::{self, Geometry, Path, Stroke};
use iced::widget::container;
use iced::{mouse, Color, Element, Point, Rectangle, Renderer, Size, Theme};
use solfege_core::quality::{QualityGrade, QualityReport};

/// Score boundaries between grades.
const GRADE_TICKS: [f32; 3] = [40.0, 60.0, 80.0];

pub struct QualityMeter {
    report: Option<QualityReport>,
}

impl QualityMeter {
    pub fn new(report: Option<QualityReport>) -> Self {
        Self { report }
    }

    pub fn view(self) -> Element<'static, crate::Message> {
        container(
            canvas::Canvas::new(self)
                .width(iced::Length::Fill)
                .height(iced::Length::Fixed(36.0)),
        )
        .into()
    }
}

pub fn grade_color(grade: QualityGrade) -> Color {
    match grade {
        QualityGrade::Excellent => Color::from_rgb8(0x34, 0xDB, 0x98),
        QualityGrade::Good => Color::from_rgb8(0x9B, 0xD7, 0x4A),
        QualityGrade::Fair => Color::from_rgb8(0xFF, 0xC3, 0x00),
        QualityGrade::Poor => Color::from_rgb8(0xFF, 0x33, 0x33),
    }
}

impl<Message> canvas::Program<Message> for QualityMeter {
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

        let background = Path::rectangle(Point::ORIGIN, bounds.size());
        frame.fill(&background, Color::from_rgb8(0x40, 0x40, 0x40));

        if let Some(report) = self.report {
            let width = report.score.min(100) as f32 / 100.0 * bounds.width;
            let bar = Path::rectangle(Point::ORIGIN, Size::new(width, bounds.height));
            frame.fill(&bar, grade_color(report.grade));

            if report.clipping > 0.0 {
                frame.stroke(
                    &background,
                    Stroke::default()
                        .with_width(3.0)
                        .with_color(Color::from_rgb8(0xFF, 0x33, 0x33)),
                );
            }
        }

        for tick in GRADE_TICKS {
            let x = tick / 100.0 * bounds.width;
            frame.stroke(
                &Path::line(Point::new(x, 0.0), Point::new(x, bounds.height)),
                Stroke::default()
                    .with_width(1.0)
                    .with_color(Color::from_rgba(1.0, 1.0, 1.0, 0.5)),
            );
        }

        vec![frame.into_geometry()]
    }
}
