pub mod hold;
pub mod pd;
pub mod tracking;

pub use hold::{ButtonAction, HoldGate};
pub use pd::{PdController, PdGains};
pub use tracking::{read_bar, BarMeasurement, BarReading};
