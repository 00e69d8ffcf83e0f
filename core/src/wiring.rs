//! Physical wiring of the sensors to ADC2 and ADC3
//!
//! Names read as `adc<peripheral><input>`, e.g. `adc213` is ADC2 IN13.
//! The slot order is the order the scan sequence converts them in.

use crate::{Channel, ChannelMap, Peripheral};

pub const ADC2_CHANNEL_COUNT: usize = 12;
pub const ADC3_CHANNEL_COUNT: usize = 7;

pub static ADC2_CHANNELS: ChannelMap<ADC2_CHANNEL_COUNT> = ChannelMap::new(
    Peripheral::Adc2,
    [
        Channel::new("adc203", 3, 0),
        Channel::new("adc210", 10, 1),
        Channel::new("adc213", 13, 2),
        Channel::new("adc204", 4, 3),
        Channel::new("adc207", 7, 4),
        Channel::new("adc206", 6, 5),
        Channel::new("adc205", 5, 6),
        Channel::new("adc200", 0, 7),
        Channel::new("adc215", 15, 8),
        Channel::new("adc208", 8, 9),
        Channel::new("adc214", 14, 10),
        Channel::new("adc212", 12, 11),
    ],
);

pub static ADC3_CHANNELS: ChannelMap<ADC3_CHANNEL_COUNT> = ChannelMap::new(
    Peripheral::Adc3,
    [
        Channel::new("adc309", 9, 0),
        Channel::new("adc315", 15, 1),
        Channel::new("adc308", 8, 2),
        Channel::new("adc306", 6, 3),
        Channel::new("adc305", 5, 4),
        Channel::new("adc307", 7, 5),
        Channel::new("adc314", 14, 6),
    ],
);
