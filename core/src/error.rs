use core::fmt;

use crate::Peripheral;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ErrorKind {
    /// The peripheral was started before it was powered and configured
    PeripheralNotReady,
    /// Samples were requested while no completed scan was available
    BufferNotFilled,
    /// A channel is bound to a slot outside the sample buffer
    IndexOutOfRange { index: usize, len: usize },
    /// Two channels of one table share a slot
    DuplicateSlot { slot: usize },
    /// Two channels of one table share a name
    DuplicateName { name: &'static str },
    /// A channel is bound to a multiplexer input the ADC does not have
    InvalidInput { input: u8 },
    /// The scan source and the channel table belong to different peripherals
    PeripheralMismatch { map: Peripheral },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Error {
    pub peripheral: Peripheral,
    pub kind: ErrorKind,
}

impl Error {
    pub const fn new(peripheral: Peripheral, kind: ErrorKind) -> Self {
        Self { peripheral, kind }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            ErrorKind::PeripheralNotReady => write!(f, "{} is not initialized", self.peripheral),
            ErrorKind::BufferNotFilled => {
                write!(f, "{} has no completed scan to unpack", self.peripheral)
            }
            ErrorKind::IndexOutOfRange { index, len } => write!(
                f,
                "{} slot {} is out of range for a buffer of {} samples",
                self.peripheral, index, len
            ),
            ErrorKind::DuplicateSlot { slot } => {
                write!(f, "{} slot {} is bound to more than one channel", self.peripheral, slot)
            }
            ErrorKind::DuplicateName { name } => {
                write!(f, "{} has more than one channel named {}", self.peripheral, name)
            }
            ErrorKind::InvalidInput { input } => {
                write!(f, "{} has no input IN{}", self.peripheral, input)
            }
            ErrorKind::PeripheralMismatch { map } => {
                write!(f, "{} scan was given the {} channel table", self.peripheral, map)
            }
        }
    }
}
