#![cfg_attr(not(test), no_std)]

pub mod acquisition;
pub mod channel;
pub mod config;
pub mod error;
pub mod sequence;
pub mod telemetry;
pub mod voltage;
pub mod wiring;

pub use acquisition::{Acquisition, AcquisitionState, ChannelValues, CompletionFlag, ScanSource};
pub use channel::{Channel, ChannelMap};
pub use error::{Error, ErrorKind};
pub use voltage::{raw_to_voltage, Resolution, VoltageConverter};

/// The two ADC peripherals sampled by the stand
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Peripheral {
    Adc2,
    Adc3,
}

impl core::fmt::Display for Peripheral {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Peripheral::Adc2 => f.write_str("ADC2"),
            Peripheral::Adc3 => f.write_str("ADC3"),
        }
    }
}
