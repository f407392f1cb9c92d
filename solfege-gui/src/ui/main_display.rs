//! # Main Display Module
//!
//! This module contains the main display components and layout logic
//! for the solfège transcriber.

use iced::widget::{button, column, container, horizontal_space, row, text, Space};
use iced::{Alignment, Color, Element, Length};
use solfege_core::gate::GateDecision;
use solfege_core::score::Score;

use super::{quality_meter, spectrum, staff};
use crate::{AppDisplayData, Message};

/// Configuration for a single button in the sidebar.
#[derive(Debug, Clone)]
struct ButtonConfig {
    label: &'static str,
    message: Message,
    kind: ButtonKind,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum ButtonKind {
    /// Always enabled.
    Standard,
    /// Starts a session; highlighted while that session runs.
    Source(crate::SessionKind),
    /// Needs a non-empty score.
    NeedsScore,
    /// Needs an input file from the command line.
    NeedsFile(crate::SessionKind),
    /// Shows the state of a panel.
    Panel(Panel),
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Panel {
    Readout,
    Spectrum,
    Staff,
}

const SIDEBAR_CONFIG: &[(&str, &[ButtonConfig])] = &[
    ("Input", &[
        ButtonConfig { label: "Listen", message: Message::StartListening, kind: ButtonKind::Source(crate::SessionKind::Microphone) },
        ButtonConfig { label: "Play File", message: Message::PlayFile, kind: ButtonKind::NeedsFile(crate::SessionKind::File) },
        ButtonConfig { label: "Stop", message: Message::Stop, kind: ButtonKind::Standard },
    ]),
    ("Score", &[
        ButtonConfig { label: "Play Score", message: Message::PlayScore, kind: ButtonKind::NeedsScore },
        ButtonConfig { label: "Clear", message: Message::ClearScore, kind: ButtonKind::NeedsScore },
        ButtonConfig { label: "Save JSON", message: Message::SaveScore, kind: ButtonKind::NeedsScore },
        ButtonConfig { label: "Export LilyPond", message: Message::ExportLilyPond, kind: ButtonKind::NeedsScore },
        ButtonConfig { label: "Export WAV", message: Message::ExportWav, kind: ButtonKind::NeedsScore },
    ]),
    ("View", &[
        ButtonConfig { label: "Do Ré Mi / C D E", message: Message::ToggleNaming, kind: ButtonKind::Standard },
        ButtonConfig { label: "Note readout", message: Message::ToggleReadout, kind: ButtonKind::Panel(Panel::Readout) },
        ButtonConfig { label: "Spectrum", message: Message::ToggleSpectrum, kind: ButtonKind::Panel(Panel::Spectrum) },
        ButtonConfig { label: "Staff", message: Message::ToggleStaff, kind: ButtonKind::Panel(Panel::Staff) },
    ]),
];

/// Creates the complete main application view.
pub fn create_main_view(data: &AppDisplayData, score: &Score) -> Element<'static, Message> {
    log::trace!("[VIEW] Rendering GUI...");

    let title = row![
        text("Solfège").size(28),
        horizontal_space(),
        text(data.status.clone()).size(14),
    ]
    .align_y(Alignment::Center);

    let top_row = match (create_readout_panel(data), create_spectrum_panel(data)) {
        (Some(r), Some(s)) => row![r, Space::with_width(10), s],
        (Some(r), None) => row![r],
        (None, Some(s)) => row![s],
        (None, None) => row![],
    }
    .align_y(Alignment::Start);

    let mut body = column![title, Space::with_height(20), top_row].spacing(10).width(Length::Fill);
    if let Some(staff_panel) = create_staff_panel(data, score) {
        body = body.push(staff_panel);
    }

    let main_content = row![body, Space::with_width(10), create_sidebar(data, score)]
        .align_y(Alignment::Start)
        .padding(20);

    container(main_content)
        .width(Length::Fill)
        .height(Length::Fill)
        .into()
}

/// Large note name, frequency, cents and the quality meter.
fn create_readout_panel(data: &AppDisplayData) -> Option<Element<'static, Message>> {
    if !data.readout_visible {
        return None;
    }

    let frame = data.last_frame.as_ref();
    let note_name = frame
        .and_then(|f| f.pitch)
        .map(|p| p.name(data.naming))
        .unwrap_or_else(|| "--".to_string());
    let freq_text = frame
        .and_then(|f| f.frequency)
        .map(|f| format!("{:.1} Hz", f))
        .unwrap_or_else(|| "-- Hz".to_string());
    let cents_text = data
        .smoothed_cents()
        .map(|c| format!("{:+.0}¢", c))
        .unwrap_or_default();
    let gate_text = frame.map(|f| f.gate.label()).unwrap_or("idle");
    let gate_color = match frame.map(|f| &f.gate) {
        Some(GateDecision::Pitched(_)) => Color::from_rgb8(0x34, 0xDB, 0x98),
        Some(_) => Color::from_rgb8(0xA0, 0xA0, 0xA0),
        None => Color::from_rgb8(0x60, 0x60, 0x60),
    };

    let quality = frame.map(|f| f.quality);
    let quality_text = quality
        .map(|q| format!("{} ({:?}) {:.0} dB", q.score, q.grade, q.level_db))
        .unwrap_or_else(|| "--".to_string());

    let content = column![
        row![
            text(note_name).size(56),
            Space::with_width(20),
            column![text(freq_text).size(22), text(cents_text).size(18)].spacing(4),
            horizontal_space(),
            text(gate_text).size(14).color(gate_color),
        ]
        .align_y(Alignment::Center),
        Space::with_height(10),
        row![text("Quality").size(14), horizontal_space(), text(quality_text).size(14)],
        quality_meter::QualityMeter::new(quality).view(),
    ]
    .spacing(5);

    let panel = container(column![text("Note").size(18), Space::with_height(10), content].spacing(5).padding(15))
        .width(Length::Fill)
        .height(Length::Fixed(220.0));

    Some(panel.into())
}

fn create_spectrum_panel(data: &AppDisplayData) -> Option<Element<'static, Message>> {
    if !data.spectrum_visible {
        return None;
    }

    let (magnitudes, bin_hz, fundamental) = match (&data.last_frame, data.sample_rate) {
        (Some(frame), Some(rate)) if frame.window_size > 0 => (
            frame.spectrum.clone(),
            rate as f32 / frame.window_size as f32,
            frame.frequency,
        ),
        _ => (Vec::new(), 0.0, None),
    };

    let window_text = data
        .last_frame
        .as_ref()
        .map(|f| format!("window {}", f.window_size))
        .unwrap_or_default();

    let panel = container(
        column![
            row![text("Spectrum").size(18), horizontal_space(), text(window_text).size(12)],
            Space::with_height(10),
            container(spectrum::Spectrum::new(magnitudes, bin_hz, fundamental).view())
                .width(Length::Fill)
                .height(Length::Fill),
        ]
        .spacing(5)
        .padding(15),
    )
    .width(Length::Fill)
    .height(Length::Fixed(220.0));

    Some(panel.into())
}

fn create_staff_panel(data: &AppDisplayData, score: &Score) -> Option<Element<'static, Message>> {
    if !data.staff_visible {
        return None;
    }

    let live = if data.session.is_some_and(|s| s.transcribes()) {
        data.last_frame.as_ref().and_then(|f| f.pitch)
    } else {
        None
    };
    let summary = format!(
        "{} notes, {:.0} bpm {}/{}",
        score.note_count(),
        score.tempo_bpm,
        score.time_signature.beats,
        score.time_signature.unit
    );

    let panel = container(
        column![
            row![text("Score").size(18), horizontal_space(), text(summary).size(12)],
            Space::with_height(10),
            container(staff::Staff::new(score, live).view())
                .width(Length::Fill)
                .height(Length::Fill),
        ]
        .spacing(5)
        .padding(15),
    )
    .width(Length::Fill)
    .height(Length::Fixed(240.0));

    Some(panel.into())
}

fn create_sidebar(data: &AppDisplayData, score: &Score) -> Element<'static, Message> {
    let sections = SIDEBAR_CONFIG.iter().fold(column![].spacing(10), |col, (title, buttons)| {
        col.push(make_section(title, buttons, data, score))
    });

    container(sections.padding(15))
        .width(Length::Fixed(220.0))
        .height(Length::Fill)
        .into()
}

fn make_section(
    title: &'static str,
    buttons: &[ButtonConfig],
    data: &AppDisplayData,
    score: &Score,
) -> Element<'static, Message> {
    let items = buttons
        .iter()
        .fold(column![].spacing(8), |col, config| col.push(make_button(config, data, score)));

    column![text(title).size(18), Space::with_height(10), items].spacing(5).into()
}

fn make_button(config: &ButtonConfig, data: &AppDisplayData, score: &Score) -> Element<'static, Message> {
    let (enabled, highlighted) = match config.kind {
        ButtonKind::Standard => (true, false),
        ButtonKind::Source(kind) => (true, data.session == Some(kind)),
        ButtonKind::NeedsFile(kind) => (data.input_file.is_some(), data.session == Some(kind)),
        ButtonKind::NeedsScore => (!score.is_empty(), false),
        ButtonKind::Panel(panel) => (
            true,
            match panel {
                Panel::Readout => data.readout_visible,
                Panel::Spectrum => data.spectrum_visible,
                Panel::Staff => data.staff_visible,
            },
        ),
    };

    let mut btn = button(text(config.label).size(14).width(Length::Fill)).padding([6, 10]);

    if !enabled {
        btn = btn.style(|_theme, _status| button::Style {
            background: Some(iced::Background::Color(Color::from_rgb(0.3, 0.3, 0.3))),
            text_color: Color::from_rgb(0.6, 0.6, 0.6),
            ..button::Style::default()
        });
        return btn.into();
    }

    if highlighted {
        let color = match config.kind {
            ButtonKind::Source(_) | ButtonKind::NeedsFile(_) => Color::from_rgb(0.8, 0.2, 0.2),
            _ => Color::from_rgb(0.2, 0.45, 0.7),
        };
        btn = btn.style(move |_theme, _status| button::Style {
            background: Some(iced::Background::Color(color)),
            text_color: Color::WHITE,
            ..button::Style::default()
        });
    }

    btn.on_press(config.message.clone()).into()
}
