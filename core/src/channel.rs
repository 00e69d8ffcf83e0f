use crate::{Error, ErrorKind, Peripheral};

/// Highest multiplexer input of the STM32F7 ADCs (IN18 is VBAT/temperature on ADC1)
pub const MAX_INPUT: u8 = 18;

/// Binding of a named sensor to an ADC input and its slot in the scan
///
/// The slot is the rank of the conversion in the regular sequence, which is
/// also the index the DMA writes its sample to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Channel {
    pub name: &'static str,
    pub input: u8,
    pub slot: usize,
}

impl Channel {
    pub const fn new(name: &'static str, input: u8, slot: usize) -> Self {
        Self { name, input, slot }
    }
}

/// Fixed channel table of one peripheral
///
/// Construct it in a `const` so a broken table is rejected at compile time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelMap<const N: usize> {
    peripheral: Peripheral,
    channels: [Channel; N],
}

impl<const N: usize> ChannelMap<N> {
    /// Panics (at compile time when used in a `const`) if the table is invalid
    pub const fn new(peripheral: Peripheral, channels: [Channel; N]) -> Self {
        match Self::validate(peripheral, &channels) {
            Ok(()) => Self {
                peripheral,
                channels,
            },
            Err(_) => panic!("invalid channel map"),
        }
    }

    pub const fn try_new(peripheral: Peripheral, channels: [Channel; N]) -> Result<Self, Error> {
        match Self::validate(peripheral, &channels) {
            Ok(()) => Ok(Self {
                peripheral,
                channels,
            }),
            Err(e) => Err(e),
        }
    }

    /// Every slot lies in `0..N` and is used once, names are unique and inputs exist
    ///
    /// With N channels and N distinct in-range slots the table is a bijection
    /// onto the buffer.
    pub const fn validate(peripheral: Peripheral, channels: &[Channel; N]) -> Result<(), Error> {
        let mut i = 0;
        while i < N {
            let channel = &channels[i];
            if channel.slot >= N {
                return Err(Error::new(
                    peripheral,
                    ErrorKind::IndexOutOfRange {
                        index: channel.slot,
                        len: N,
                    },
                ));
            }
            if channel.input > MAX_INPUT {
                return Err(Error::new(
                    peripheral,
                    ErrorKind::InvalidInput {
                        input: channel.input,
                    },
                ));
            }

            let mut j = i + 1;
            while j < N {
                if channels[j].slot == channel.slot {
                    return Err(Error::new(
                        peripheral,
                        ErrorKind::DuplicateSlot { slot: channel.slot },
                    ));
                }
                if str_eq(channels[j].name, channel.name) {
                    return Err(Error::new(
                        peripheral,
                        ErrorKind::DuplicateName { name: channel.name },
                    ));
                }
                j += 1;
            }
            i += 1;
        }
        Ok(())
    }

    pub const fn peripheral(&self) -> Peripheral {
        self.peripheral
    }

    pub const fn len(&self) -> usize {
        N
    }

    pub const fn is_empty(&self) -> bool {
        N == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = &Channel> {
        self.channels.iter()
    }

    pub fn get(&self, name: &str) -> Option<&Channel> {
        self.channels.iter().find(|channel| channel.name == name)
    }

    /// ADC inputs ordered by slot, i.e. the regular conversion sequence
    pub const fn sequence(&self) -> [u8; N] {
        let mut sequence = [0; N];
        let mut i = 0;
        while i < N {
            sequence[self.channels[i].slot] = self.channels[i].input;
            i += 1;
        }
        sequence
    }
}

const fn str_eq(a: &str, b: &str) -> bool {
    let (a, b) = (a.as_bytes(), b.as_bytes());
    if a.len() != b.len() {
        return false;
    }
    let mut i = 0;
    while i < a.len() {
        if a[i] != b[i] {
            return false;
        }
        i += 1;
    }
    true
}
