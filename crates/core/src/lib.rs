#![forbid(unsafe_code)]

pub mod countdown;
pub mod items;
pub mod model;
pub mod navigation;
pub mod scoring;
pub mod settings;
pub mod time;

pub use countdown::{Countdown, TickEvent};
pub use items::{ItemError, ItemStore};
pub use navigation::Navigator;
pub use settings::{ExamSettings, SettingsError};
pub use time::Clock;
