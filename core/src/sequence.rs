//! Register images for the ADC regular sequence and sample times
//!
//! RM0410 15.13.9-15.13.11: the sequence is split over SQR3 (ranks 1-6),
//! SQR2 (ranks 7-12) and SQR1 (ranks 13-16 plus the length L), five bits
//! per rank. SMPR2 holds the sample time of inputs 0-9 and SMPR1 of
//! inputs 10-18, three bits each. ADC_CCR.ADCPRE divides PCLK2 down to the
//! ADC clock shared by all three ADCs.

use crate::channel::MAX_INPUT;

pub const MAX_SEQUENCE_LEN: usize = 16;

/// ADC sample time in ADC clock cycles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SampleTime {
    Cycles3,
    Cycles15,
    Cycles28,
    Cycles56,
    #[default]
    Cycles84,
    Cycles112,
    Cycles144,
    Cycles480,
}

impl SampleTime {
    pub const fn bits(self) -> u32 {
        self as u32
    }

    pub const fn cycles(self) -> u32 {
        match self {
            SampleTime::Cycles3 => 3,
            SampleTime::Cycles15 => 15,
            SampleTime::Cycles28 => 28,
            SampleTime::Cycles56 => 56,
            SampleTime::Cycles84 => 84,
            SampleTime::Cycles112 => 112,
            SampleTime::Cycles144 => 144,
            SampleTime::Cycles480 => 480,
        }
    }
}

/// Highest ADC clock in the datasheet operating conditions
pub const MAX_ADCCLK_HZ: u32 = 36_000_000;

/// ADC_CCR.ADCPRE, the PCLK2 divider feeding every ADC
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AdcPrescaler {
    Div2,
    Div4,
    Div6,
    Div8,
}

impl AdcPrescaler {
    pub const fn bits(self) -> u8 {
        self as u8
    }

    pub const fn divider(self) -> u32 {
        2 * (self as u32 + 1)
    }

    /// Smallest divider that keeps the ADC clock within its limit
    pub const fn for_pclk2(pclk2_hz: u32) -> Option<Self> {
        let candidates = [Self::Div2, Self::Div4, Self::Div6, Self::Div8];
        let mut i = 0;
        while i < candidates.len() {
            if pclk2_hz / candidates[i].divider() <= MAX_ADCCLK_HZ {
                return Some(candidates[i]);
            }
            i += 1;
        }
        None
    }

    pub const fn adcclk_hz(self, pclk2_hz: u32) -> u32 {
        pclk2_hz / self.divider()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SequenceRegisters {
    pub sqr1: u32,
    pub sqr2: u32,
    pub sqr3: u32,
}

impl SequenceRegisters {
    /// Panics on an empty or over-long sequence or an input above IN18
    pub const fn for_inputs(inputs: &[u8]) -> Self {
        assert!(!inputs.is_empty() && inputs.len() <= MAX_SEQUENCE_LEN);

        let mut regs = Self {
            sqr1: ((inputs.len() - 1) as u32) << 20,
            sqr2: 0,
            sqr3: 0,
        };

        let mut rank = 0;
        while rank < inputs.len() {
            assert!(inputs[rank] <= MAX_INPUT);
            let input = inputs[rank] as u32;
            let shift = 5 * (rank % 6);
            match rank / 6 {
                0 => regs.sqr3 |= input << shift,
                1 => regs.sqr2 |= input << shift,
                _ => regs.sqr1 |= input << shift,
            }
            rank += 1;
        }

        regs
    }

    pub const fn len(&self) -> usize {
        ((self.sqr1 >> 20) & 0xF) as usize + 1
    }
}

/// `(smpr1, smpr2)` with every input set to `sample_time`
pub const fn sample_time_registers(sample_time: SampleTime) -> (u32, u32) {
    let bits = sample_time.bits();
    let mut smpr1 = 0;
    let mut smpr2 = 0;

    let mut input = 0;
    while input <= MAX_INPUT as u32 {
        if input < 10 {
            smpr2 |= bits << (3 * input);
        } else {
            smpr1 |= bits << (3 * (input - 10));
        }
        input += 1;
    }

    (smpr1, smpr2)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wiring::{ADC2_CHANNELS, ADC3_CHANNELS};

    fn rank(regs: &SequenceRegisters, rank: usize) -> u8 {
        let reg = match rank / 6 {
            0 => regs.sqr3,
            1 => regs.sqr2,
            _ => regs.sqr1,
        };
        ((reg >> (5 * (rank % 6))) & 0x1F) as u8
    }

    #[test]
    fn single_input() {
        let regs = SequenceRegisters::for_inputs(&[3]);
        assert_eq!(regs, SequenceRegisters { sqr1: 0, sqr2: 0, sqr3: 3 });
        assert_eq!(regs.len(), 1);
    }

    #[test]
    fn adc2_sequence_spans_two_registers() {
        let inputs = ADC2_CHANNELS.sequence();
        let regs = SequenceRegisters::for_inputs(&inputs);

        assert_eq!(regs.len(), 12);
        assert_eq!(regs.sqr1, 11 << 20);
        for (i, input) in inputs.iter().enumerate() {
            assert_eq!(rank(&regs, i), *input);
        }
    }

    #[test]
    fn adc3_sequence_spills_into_sqr2() {
        let regs = SequenceRegisters::for_inputs(&ADC3_CHANNELS.sequence());
        assert_eq!(regs.len(), 7);
        // IN14 at rank 7 is the first field of SQR2
        assert_eq!(regs.sqr2, 14);
        assert_eq!(rank(&regs, 0), 9);
        assert_eq!(rank(&regs, 5), 7);
    }

    #[test]
    fn sixteen_ranks_use_sqr1() {
        let inputs: [u8; 16] = core::array::from_fn(|i| i as u8);
        let regs = SequenceRegisters::for_inputs(&inputs);
        assert_eq!(regs.len(), 16);
        assert_eq!(regs.sqr1 & 0xF_FFFF, 12 | 13 << 5 | 14 << 10 | 15 << 15);
    }

    #[test]
    #[should_panic]
    fn too_long_sequence_panics() {
        SequenceRegisters::for_inputs(&[0; 17]);
    }

    #[test]
    fn prescaler_keeps_adcclk_in_range() {
        // PCLK2 at 216 MHz SYSCLK
        let prescaler = AdcPrescaler::for_pclk2(108_000_000).unwrap();
        assert_eq!(prescaler, AdcPrescaler::Div4);
        assert_eq!(prescaler.bits(), 0b01);
        assert_eq!(prescaler.adcclk_hz(108_000_000), 27_000_000);

        // The reset value /2 would run the ADCs at 54 MHz
        assert!(AdcPrescaler::Div2.adcclk_hz(108_000_000) > MAX_ADCCLK_HZ);

        assert_eq!(AdcPrescaler::for_pclk2(72_000_000), Some(AdcPrescaler::Div2));
        assert_eq!(AdcPrescaler::Div8.bits(), 0b11);
        assert_eq!(AdcPrescaler::for_pclk2(400_000_000), None);
    }

    #[test]
    fn sample_times_fill_every_input() {
        let (smpr1, smpr2) = sample_time_registers(SampleTime::Cycles480);
        assert_eq!(smpr2, 0x3FFF_FFFF);
        assert_eq!(smpr1, 0x07FF_FFFF);

        let (smpr1, smpr2) = sample_time_registers(SampleTime::Cycles3);
        assert_eq!((smpr1, smpr2), (0, 0));

        let (_, smpr2) = sample_time_registers(SampleTime::Cycles84);
        assert_eq!(smpr2 & 0b111, 0b100);
        assert_eq!(SampleTime::Cycles84.cycles(), 84);
    }
}
