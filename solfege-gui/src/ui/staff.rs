//! # Staff Widget
//!
//! Draws the evolving score on a single five-line staff.
//!
//! ## Features
//! - Treble or bass clef, chosen from the score's register
//! - Note heads, stems, flags, dots, sharps, ledger lines and ties
//! - Rests for each note value
//! - Bar lines from the score's time signature
//! - Only the most recent measures that fit are shown, so the staff scrolls
//!   as the score grows
//! - A ghost note for the pitch currently being sung

use iced::widget::canvas::{self, Geometry, Path, Stroke};
use iced::widget::container;
use iced::{mouse, Color, Element, Pixels, Point, Rectangle, Renderer, Size, Theme, Vector};
use solfege_core::duration::NoteValue;
use solfege_core::notes::Pitch;
use solfege_core::score::{Clef, Measure, Score, ScoreEvent, TimeSignature};

const INK: Color = Color::from_rgb(0.92, 0.92, 0.92);
const GHOST: Color = Color::from_rgba(0.2, 0.6, 0.86, 0.8);
/// Width reserved for clef and time signature.
const HEADER_WIDTH: f32 = 70.0;

pub struct Staff {
    measures: Vec<Measure>,
    time_signature: TimeSignature,
    clef: Clef,
    live: Option<Pitch>,
}

impl Staff {
    pub fn new(score: &Score, live: Option<Pitch>) -> Self {
        Self {
            measures: score.measures(),
            time_signature: score.time_signature,
            clef: score.suggested_clef(),
            live,
        }
    }

    pub fn view(self) -> Element<'static, crate::Message> {
        container(
            canvas::Canvas::new(self)
                .width(iced::Length::Fill)
                .height(iced::Length::Fill),
        )
        .into()
    }
}

/// Vertical geometry of the staff.
#[derive(Debug, Clone, Copy)]
struct Layout {
    /// Distance between two staff lines.
    space: f32,
    /// y of the bottom line.
    bottom_y: f32,
    /// Staff step of the bottom line.
    bottom_step: i32,
}

impl Layout {
    fn y(&self, step: i32) -> f32 {
        self.bottom_y - (step - self.bottom_step) as f32 * self.space / 2.0
    }

    fn top_step(&self) -> i32 {
        self.bottom_step + 8
    }

    fn middle_step(&self) -> i32 {
        self.bottom_step + 4
    }
}

fn event_width(event: &ScoreEvent, space: f32) -> f32 {
    space * (2.2 + event.beats() as f32 * 1.2)
}

fn measure_width(measure: &Measure, space: f32) -> f32 {
    measure.events.iter().map(|e| event_width(e, space)).sum::<f32>() + space
}

fn stroke(width: f32, color: Color) -> Stroke<'static> {
    Stroke::default().with_width(width).with_color(color)
}

fn label(frame: &mut canvas::Frame, content: impl Into<String>, position: Point, size: f32, color: Color) {
    frame.fill_text(canvas::Text {
        content: content.into(),
        position,
        color,
        size: Pixels(size),
        ..canvas::Text::default()
    });
}

fn draw_ledgers(frame: &mut canvas::Frame, layout: &Layout, step: i32, x: f32, color: Color) {
    let half = layout.space * 0.9;
    let mut ledger = |s: i32| {
        let y = layout.y(s);
        frame.stroke(&Path::line(Point::new(x - half, y), Point::new(x + half, y)), stroke(1.0, color));
    };
    let mut s = layout.bottom_step - 2;
    while s >= step {
        ledger(s);
        s -= 2;
    }
    let mut s = layout.top_step() + 2;
    while s <= step {
        ledger(s);
        s += 2;
    }
}

/// Draws one note; returns the head centre for ties.
fn draw_note(
    frame: &mut canvas::Frame,
    layout: &Layout,
    pitch: Pitch,
    value: NoteValue,
    dotted: bool,
    x: f32,
    color: Color,
) -> Point {
    let step = pitch.staff_step();
    let center = Point::new(x, layout.y(step));
    let radius = layout.space * 0.55;

    draw_ledgers(frame, layout, step, x, color);

    let head = Path::circle(center, radius);
    if value.is_hollow() {
        frame.stroke(&head, stroke(1.6, color));
    } else {
        frame.fill(&head, color);
    }

    if pitch.is_sharp() {
        label(frame, "♯", Point::new(x - radius * 3.2, center.y - layout.space), layout.space * 1.8, color);
    }
    if dotted {
        frame.fill(&Path::circle(Point::new(x + radius * 1.9, center.y), 1.8), color);
    }

    if value.has_stem() {
        let length = layout.space * 3.5;
        let up = step < layout.middle_step();
        let (stem_x, tip_y) = if up {
            (x + radius, center.y - length)
        } else {
            (x - radius, center.y + length)
        };
        frame.stroke(&Path::line(Point::new(stem_x, center.y), Point::new(stem_x, tip_y)), stroke(1.4, color));

        for i in 0..value.flags() {
            let offset = i as f32 * layout.space * 0.8;
            let (start, end) = if up {
                let y = tip_y + offset;
                (Point::new(stem_x, y), Point::new(stem_x + layout.space, y + layout.space * 1.2))
            } else {
                let y = tip_y - offset;
                (Point::new(stem_x, y), Point::new(stem_x + layout.space, y - layout.space * 1.2))
            };
            frame.stroke(&Path::line(start, end), stroke(1.6, color));
        }
    }
    center
}

fn draw_rest(frame: &mut canvas::Frame, layout: &Layout, value: NoteValue, dotted: bool, x: f32) {
    let s = layout.space;
    let middle = layout.y(layout.middle_step());
    match value {
        // Whole hangs from the fourth line, half sits on the middle line.
        NoteValue::Whole => {
            frame.fill(&Path::rectangle(Point::new(x - s * 0.6, middle - s), Size::new(s * 1.2, s * 0.5)), INK);
        }
        NoteValue::Half => {
            frame.fill(&Path::rectangle(Point::new(x - s * 0.6, middle - s * 0.5), Size::new(s * 1.2, s * 0.5)), INK);
        }
        NoteValue::Quarter => {
            let zigzag = Path::new(|b| {
                b.move_to(Point::new(x - s * 0.3, middle - s * 1.5));
                b.line_to(Point::new(x + s * 0.3, middle - s * 0.7));
                b.line_to(Point::new(x - s * 0.3, middle + s * 0.1));
                b.line_to(Point::new(x + s * 0.3, middle + s * 0.9));
            });
            frame.stroke(&zigzag, stroke(2.0, INK));
        }
        NoteValue::Eighth | NoteValue::Sixteenth => {
            frame.stroke(
                &Path::line(Point::new(x + s * 0.4, middle - s), Point::new(x - s * 0.2, middle + s * 1.2)),
                stroke(1.4, INK),
            );
            for i in 0..value.flags() {
                let y = middle - s + i as f32 * s * 0.8;
                frame.fill(&Path::circle(Point::new(x - s * 0.2, y), s * 0.25), INK);
            }
        }
    }
    if dotted {
        frame.fill(&Path::circle(Point::new(x + s, middle - s * 0.5), 1.8), INK);
    }
}

fn draw_tie(frame: &mut canvas::Frame, from: Point, to: Point, space: f32) {
    let start = from + Vector::new(space * 0.6, space * 0.6);
    let end = to + Vector::new(-space * 0.6, space * 0.6);
    let control = Point::new((start.x + end.x) / 2.0, start.y + space * 1.2);
    let arc = Path::new(|b| {
        b.move_to(start);
        b.quadratic_curve_to(control, end);
    });
    frame.stroke(&arc, stroke(1.2, INK));
}

impl<Message> canvas::Program<Message> for Staff {
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
        if !bounds.width.is_finite() || !bounds.height.is_finite() {
            return vec![frame.into_geometry()];
        }

        let space = (bounds.height / 14.0).clamp(6.0, 14.0);
        let layout = Layout {
            space,
            bottom_y: bounds.height / 2.0 + 2.0 * space,
            bottom_step: self.clef.bottom_line_step(),
        };
        let left = 10.0;
        let right = bounds.width - 10.0;

        for line in 0..5 {
            let y = layout.y(layout.bottom_step + line * 2);
            frame.stroke(&Path::line(Point::new(left, y), Point::new(right, y)), stroke(1.0, INK));
        }

        let clef_name = match self.clef {
            Clef::Treble => "G",
            Clef::Bass => "F",
        };
        label(&mut frame, clef_name, Point::new(left + 4.0, layout.y(layout.top_step()) - space * 0.5), space * 4.0, INK);
        let time_x = left + space * 3.5;
        label(&mut frame, self.time_signature.beats.to_string(), Point::new(time_x, layout.y(layout.top_step())), space * 2.0, INK);
        label(&mut frame, self.time_signature.unit.to_string(), Point::new(time_x, layout.y(layout.middle_step())), space * 2.0, INK);

        // Keep the newest measures that fit, leaving room for the ghost note.
        let available = right - (left + HEADER_WIDTH) - space * 4.0;
        let mut used = 0.0;
        let mut first_visible = self.measures.len();
        for (i, measure) in self.measures.iter().enumerate().rev() {
            let width = measure_width(measure, space);
            if used + width > available {
                break;
            }
            used += width;
            first_visible = i;
        }

        let mut x = left + HEADER_WIDTH;
        let mut open_tie: Option<Point> = None;
        for measure in &self.measures[first_visible..] {
            for event in &measure.events {
                let width = event_width(event, space);
                let center_x = x + width * 0.4;
                match *event {
                    ScoreEvent::Note { pitch, duration, tied } => {
                        let head = draw_note(&mut frame, &layout, pitch, duration.value, duration.dotted, center_x, INK);
                        if let Some(from) = open_tie.take() {
                            draw_tie(&mut frame, from, head, space);
                        }
                        open_tie = tied.then_some(head);
                    }
                    ScoreEvent::Rest { duration } => {
                        open_tie = None;
                        draw_rest(&mut frame, &layout, duration.value, duration.dotted, center_x);
                    }
                }
                x += width;
            }
            x += space * 0.5;
            frame.stroke(
                &Path::line(Point::new(x, layout.y(layout.top_step())), Point::new(x, layout.bottom_y)),
                stroke(1.0, INK),
            );
            x += space * 0.5;
        }

        if let Some(pitch) = self.live {
            draw_note(&mut frame, &layout, pitch, NoteValue::Quarter, false, x + space * 2.0, GHOST);
        }

        vec![frame.into_geometry()]
    }
}
