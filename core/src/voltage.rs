/// Conversion resolution of the STM32F7 ADCs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Resolution {
    #[default]
    Bits12,
    Bits10,
    Bits8,
    Bits6,
}

impl Resolution {
    pub const fn bits(self) -> u8 {
        match self {
            Resolution::Bits12 => 12,
            Resolution::Bits10 => 10,
            Resolution::Bits8 => 8,
            Resolution::Bits6 => 6,
        }
    }

    /// Largest raw value a conversion can produce
    pub const fn full_scale(self) -> u16 {
        (1 << self.bits()) - 1
    }

    /// Encoding of the RES field in ADC_CR1
    pub const fn cr1_bits(self) -> u8 {
        match self {
            Resolution::Bits12 => 0b00,
            Resolution::Bits10 => 0b01,
            Resolution::Bits8 => 0b10,
            Resolution::Bits6 => 0b11,
        }
    }
}

/// Maps raw conversions onto volts using a fixed reference voltage
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VoltageConverter {
    reference_volts: f32,
    resolution: Resolution,
}

impl VoltageConverter {
    pub const VREF: f32 = 3.3;

    pub const DEFAULT: Self = Self::new(Self::VREF, Resolution::Bits12);

    pub const fn new(reference_volts: f32, resolution: Resolution) -> Self {
        Self {
            reference_volts,
            resolution,
        }
    }

    pub const fn reference_volts(&self) -> f32 {
        self.reference_volts
    }

    pub const fn resolution(&self) -> Resolution {
        self.resolution
    }

    /// `raw / full_scale * vref`
    ///
    /// Dividing first keeps both ends exact: 0 maps to 0.0 and full scale maps
    /// to the reference voltage. Raw values come straight from the data
    /// register and are already bounded by the resolution, so nothing is
    /// clamped.
    pub fn raw_to_voltage(&self, raw: u16) -> f32 {
        self.value_to_voltage(f32::from(raw))
    }

    /// Same as [`Self::raw_to_voltage`] for a sample already widened to `f32`
    pub fn value_to_voltage(&self, value: f32) -> f32 {
        (value / f32::from(self.resolution.full_scale())) * self.reference_volts
    }
}

impl Default for VoltageConverter {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Converts with the board defaults, 3.3 V at 12 bits
pub fn raw_to_voltage(raw: u16) -> f32 {
    VoltageConverter::DEFAULT.raw_to_voltage(raw)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;

    const ALL: [Resolution; 4] = [
        Resolution::Bits12,
        Resolution::Bits10,
        Resolution::Bits8,
        Resolution::Bits6,
    ];

    #[test]
    fn full_scale_per_resolution() {
        assert_eq!(Resolution::Bits12.full_scale(), 4095);
        assert_eq!(Resolution::Bits10.full_scale(), 1023);
        assert_eq!(Resolution::Bits8.full_scale(), 255);
        assert_eq!(Resolution::Bits6.full_scale(), 63);
    }

    #[test]
    fn endpoints_are_exact() {
        for resolution in ALL {
            let converter = VoltageConverter::new(3.3, resolution);
            assert_eq!(converter.raw_to_voltage(0), 0.0);
            assert_eq!(converter.raw_to_voltage(resolution.full_scale()), 3.3);
        }
    }

    #[test]
    fn twelve_bit_full_scale_is_vref() {
        assert!((raw_to_voltage(4095) - 3.3).abs() < 1e-6);
        assert!((raw_to_voltage(2048) - 1.6504).abs() < 1e-3);
    }

    #[test]
    fn monotonic_over_whole_domain() {
        for resolution in ALL {
            let converter = VoltageConverter::new(3.3, resolution);
            let mut last = converter.raw_to_voltage(0);
            for raw in 1..=resolution.full_scale() {
                let v = converter.raw_to_voltage(raw);
                assert!(v >= last, "{raw} gave {v} < {last}");
                last = v;
            }
        }
    }

    #[test]
    fn monotonic_for_random_pairs() {
        let mut rng = rand::thread_rng();
        let converter = VoltageConverter::new(2.5, Resolution::Bits12);
        for _ in 0..10_000 {
            let a = rng.gen_range(0..=4095u16);
            let b = rng.gen_range(a..=4095u16);
            assert!(converter.raw_to_voltage(a) <= converter.raw_to_voltage(b));
        }
    }
}
