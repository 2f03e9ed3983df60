//! Screen capture and pixel analysis

pub mod color;
pub mod fruit_ocr;
pub mod screen_service;

pub use color::{ColorMask, Rgb};
pub use fruit_ocr::{DropScan, DropScanner, TesseractScanner};
pub use screen_service::{screen_size, FrameSource, ScreenService};
