use core::{
    ops::Deref,
    slice,
    sync::atomic::{compiler_fence, Ordering},
};

use daq_core::{
    config::AcquisitionConfig,
    sequence::{sample_time_registers, AdcPrescaler, SequenceRegisters, MAX_SEQUENCE_LEN},
    wiring::{ADC2_CHANNELS, ADC2_CHANNEL_COUNT, ADC3_CHANNELS, ADC3_CHANNEL_COUNT},
    Acquisition, ChannelMap, Peripheral, ScanSource,
};
use hal::{
    pac,
    rcc::{Enable, Reset, AHB1, APB2},
};
use stm32f7xx_hal as hal;

pub type Dma2Stream = pac::dma2::ST;

pub type Adc2Scan = AdcScan<pac::ADC2, ADC2_CHANNEL_COUNT>;
pub type Adc3Scan = AdcScan<pac::ADC3, ADC3_CHANNEL_COUNT>;
pub type Adc2Acquisition = Acquisition<Adc2Scan, ADC2_CHANNEL_COUNT>;
pub type Adc3Acquisition = Acquisition<Adc3Scan, ADC3_CHANNEL_COUNT>;

/// Enable the DMA2 clock. Both scans share the controller.
pub fn init_dma2(_dma2: pac::DMA2, ahb1: &mut AHB1) {
    <pac::DMA2 as Enable>::enable(ahb1);
}

/// Reset the ADC block and set the common prescaler
///
/// ADC1-3 and ADC_COMMON share one reset bit, so this runs once before
/// either scan is configured. CCR is only writable with an ADC clock running.
pub fn init_adc_common(adc_common: pac::ADC_COMMON, prescaler: AdcPrescaler, apb2: &mut APB2) {
    <pac::ADC2 as Reset>::reset(apb2);
    <pac::ADC2 as Enable>::enable(apb2);

    adc_common
        .ccr
        .modify(|_, w| unsafe { w.adcpre().bits(prescaler.bits()) });
}

/// DMA2 stream and request channel serving one ADC (RM0410 table 28)
#[derive(Clone, Copy, Debug, defmt::Format, PartialEq, Eq)]
pub struct DmaRoute {
    pub stream: usize,
    pub channel: u8,
}

#[derive(Clone, Copy, Debug, defmt::Format, PartialEq, Eq)]
pub enum DmaEvent {
    None,
    TransferComplete,
    /// Raw FEIF/DMEIF/TEIF bits of the stream
    TransferError(u32),
}

impl DmaRoute {
    pub const ADC2: Self = Self {
        stream: 2,
        channel: 1,
    };
    pub const ADC3: Self = Self {
        stream: 0,
        channel: 2,
    };

    const FLAGS: u32 = 0b11_1101;
    const TCIF: u32 = 1 << 5;
    const ERRORS: u32 = 0b00_1101;

    fn dma2() -> &'static pac::dma2::RegisterBlock {
        unsafe { &*pac::DMA2::ptr() }
    }

    fn stream(self) -> &'static Dma2Stream {
        &Self::dma2().st[self.stream]
    }

    /// Position of this stream's flags in LISR/LIFCR or HISR/HIFCR
    fn flag_offset(self) -> u32 {
        [0, 6, 16, 22][self.stream % 4]
    }

    fn flags(self) -> u32 {
        let dma2 = Self::dma2();
        let isr = if self.stream < 4 {
            dma2.lisr.read().bits()
        } else {
            dma2.hisr.read().bits()
        };
        (isr >> self.flag_offset()) & Self::FLAGS
    }

    fn clear_flags(self, flags: u32) {
        let dma2 = Self::dma2();
        let bits = (flags & Self::FLAGS) << self.flag_offset();
        if self.stream < 4 {
            dma2.lifcr.write(|w| unsafe { w.bits(bits) });
        } else {
            dma2.hifcr.write(|w| unsafe { w.bits(bits) });
        }
    }

    /// Read and clear the stream's interrupt flags
    ///
    /// Called from the stream's interrupt handler, which does not own the ADC.
    pub fn take_event(self) -> DmaEvent {
        let flags = self.flags();
        self.clear_flags(flags);

        if flags & Self::TCIF != 0 {
            DmaEvent::TransferComplete
        } else if flags & Self::ERRORS != 0 {
            DmaEvent::TransferError(flags & Self::ERRORS)
        } else {
            DmaEvent::None
        }
    }
}

/// One ADC converting its whole regular sequence once per start, moved to
/// memory by a DMA2 stream in normal mode
pub struct AdcScan<ADC, const N: usize> {
    adc: ADC,
    peripheral: Peripheral,
    route: DmaRoute,
    buffer: *mut u16,
}

unsafe impl<ADC: Send, const N: usize> Send for AdcScan<ADC, N> {}

impl Adc2Scan {
    pub fn adc2(
        adc: pac::ADC2,
        buffer: &'static mut [u16; ADC2_CHANNEL_COUNT],
        config: &AcquisitionConfig,
        apb2: &mut APB2,
    ) -> Self {
        Self::init(adc, &ADC2_CHANNELS, DmaRoute::ADC2, buffer, config, apb2)
    }
}

impl Adc3Scan {
    pub fn adc3(
        adc: pac::ADC3,
        buffer: &'static mut [u16; ADC3_CHANNEL_COUNT],
        config: &AcquisitionConfig,
        apb2: &mut APB2,
    ) -> Self {
        Self::init(adc, &ADC3_CHANNELS, DmaRoute::ADC3, buffer, config, apb2)
    }
}

impl<ADC, const N: usize> AdcScan<ADC, N>
where
    ADC: Deref<Target = pac::adc1::RegisterBlock> + Enable<Bus = APB2>,
{
    pub fn init(
        adc: ADC,
        map: &ChannelMap<N>,
        route: DmaRoute,
        buffer: &'static mut [u16; N],
        config: &AcquisitionConfig,
        apb2: &mut APB2,
    ) -> Self {
        assert!(N > 0 && N <= MAX_SEQUENCE_LEN);

        let this = Self {
            adc,
            peripheral: map.peripheral(),
            route,
            buffer: buffer.as_mut_ptr(),
        };

        this.init_dma();
        this.init_adc(map, config, apb2);

        defmt::info!(
            "{} scanning {} channels on DMA2 stream {}",
            this.peripheral,
            N,
            route.stream
        );

        this
    }

    /// Configure the DMA2 stream to move N 16-bit conversions from the data
    /// register into the buffer, once per enable
    fn init_dma(&self) {
        let stream = self.route.stream();

        // Disable the stream and wait for any transfer to stop
        stream.cr.modify(|_, w| w.en().disabled());
        while stream.cr.read().en().is_enabled() {}

        stream.cr.modify(|_, w| {
            // Select the request channel of this ADC
            w.chsel()
                .bits(self.route.channel)
                // Single buffer, no wrap around
                .dbm()
                .disabled()
                .circ()
                .disabled()
                // 16 bits on both sides
                .msize()
                .bits16()
                .psize()
                .bits16()
                // One slot per conversion
                .minc()
                .incremented()
                .pinc()
                .fixed()
                .dir()
                .peripheral_to_memory()
                // DMA controls when transfer ends, after NDTR items
                .pfctrl()
                .dma()
                .pl()
                .high()
                // Enable Transfer Complete Interrupt
                .tcie()
                .enabled()
                // Enable Transfer Error Interrupt
                .teie()
                .enabled()
                // Enable Direct Mode Error Interrupt
                .dmeie()
                .enabled()
                .ct()
                .memory0()
        });

        // Set peripheral address to the ADC data register
        stream
            .par
            .write(|w| unsafe { w.pa().bits(self.adc.dr.as_ptr() as u32) });

        stream
            .m0ar
            .write(|w| unsafe { w.m0a().bits(self.buffer as u32) });

        self.route.clear_flags(DmaRoute::FLAGS);
    }

    /// Configure the ADC for a single scan of the channel map per software
    /// start, with a DMA request per conversion
    fn init_adc(&self, map: &ChannelMap<N>, config: &AcquisitionConfig, apb2: &mut APB2) {
        let adc = &self.adc;
        <ADC as Enable>::enable(apb2);
        // Power down while configuring
        adc.cr2.modify(|_, w| w.adon().clear_bit());

        // Scan the whole regular sequence, no discontinuous groups
        adc.cr1
            .modify(|_, w| w.scan().set_bit().discen().clear_bit());
        adc.cr1
            .modify(|_, w| w.res().bits(config.resolution.cr1_bits()));

        // One sequence per SWSTART, right aligned
        adc.cr2
            .modify(|_, w| w.cont().single().align().right().eocs().clear_bit());

        // No DMA requests after the last conversion until DMA is re-armed
        adc.cr2.modify(|_, w| w.dma().enabled().dds().single());

        let sequence = SequenceRegisters::for_inputs(&map.sequence());
        adc.sqr1.write(|w| unsafe { w.bits(sequence.sqr1) });
        adc.sqr2.write(|w| unsafe { w.bits(sequence.sqr2) });
        adc.sqr3.write(|w| unsafe { w.bits(sequence.sqr3) });

        let (smpr1, smpr2) = sample_time_registers(config.sample_time);
        adc.smpr1.write(|w| unsafe { w.bits(smpr1) });
        adc.smpr2.write(|w| unsafe { w.bits(smpr2) });

        // Power up
        adc.cr2.modify(|_, w| w.adon().enabled());
    }
}

impl<ADC, const N: usize> ScanSource<N> for AdcScan<ADC, N>
where
    ADC: Deref<Target = pac::adc1::RegisterBlock> + Enable<Bus = APB2>,
{
    fn peripheral(&self) -> Peripheral {
        self.peripheral
    }

    fn is_initialized(&self) -> bool {
        self.adc.cr2.read().adon().bit_is_set()
    }

    fn start_scan(&mut self) {
        let stream = self.route.stream();

        // In normal mode the stream disables itself after the last item
        stream.cr.modify(|_, w| w.en().disabled());
        while stream.cr.read().en().is_enabled() {}
        self.route.clear_flags(DmaRoute::FLAGS);

        stream.ndtr.write(|w| w.ndt().bits(N as u16));

        // Hand the buffer to the DMA
        compiler_fence(Ordering::SeqCst);
        stream.cr.modify(|_, w| w.en().enabled());

        // With DDS = 0 the ADC stops issuing requests after the last
        // conversion until DMA is cleared and set again
        self.adc.cr2.modify(|_, w| w.dma().disabled());
        self.adc.sr.modify(|_, w| w.ovr().clear_bit());
        self.adc.cr2.modify(|_, w| w.dma().enabled());

        self.adc.cr2.modify(|_, w| w.swstart().set_bit());
    }

    fn samples(&self) -> &[u16] {
        compiler_fence(Ordering::SeqCst);
        unsafe { slice::from_raw_parts(self.buffer, N) }
    }
}
