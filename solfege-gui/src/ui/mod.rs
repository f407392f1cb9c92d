//! # UI Module
//!
//! This module contains all UI components for the solfège transcriber.

pub mod main_display;
pub mod quality_meter;
pub mod spectrum;
pub mod staff;
