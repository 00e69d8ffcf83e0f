#![no_main]
#![no_std]

use core::fmt::Write;

use defmt_rtt as _;
use panic_probe as _;
use rtic::app;
use rtic_monotonics::{
    systick::{ExtU64, Systick},
    Monotonic,
};
use stm32f7xx_hal::{
    gpio::{Alternate, Output, Pin},
    pac,
    prelude::*,
    serial::{self, Serial, Tx},
};

use daq_core::{
    config::AcquisitionConfig,
    sequence::AdcPrescaler,
    telemetry::Frame,
    wiring::{ADC2_CHANNELS, ADC2_CHANNEL_COUNT, ADC3_CHANNELS, ADC3_CHANNEL_COUNT},
    Acquisition, CompletionFlag,
};
use daq_firmware::adc_scan::{
    self, Adc2Acquisition, Adc2Scan, Adc3Acquisition, Adc3Scan, DmaEvent, DmaRoute,
};

use static_cell::StaticCell;

defmt::timestamp!("{=u64}ms", Systick::now().duration_since_epoch().to_millis());

static CONFIG: AcquisitionConfig = AcquisitionConfig::DEFAULT;

static ADC2_DONE: CompletionFlag = CompletionFlag::new();
static ADC3_DONE: CompletionFlag = CompletionFlag::new();

#[app(device = stm32f7xx_hal::pac, dispatchers = [CAN1_RX0])]
mod app {
    use super::*;

    static ADC2_SAMPLES: StaticCell<[u16; ADC2_CHANNEL_COUNT]> = StaticCell::new();
    static ADC3_SAMPLES: StaticCell<[u16; ADC3_CHANNEL_COUNT]> = StaticCell::new();

    #[shared]
    struct Shared {}

    #[local]
    struct Local {
        adc2: Adc2Acquisition,
        adc3: Adc3Acquisition,
        telemetry: Tx<pac::USART3>,
    }

    #[init]
    fn init(cx: init::Context) -> (Shared, Local) {
        let p = cx.device;

        let mut rcc = p.RCC.constrain();
        let clocks = rcc.cfgr.sysclk(216.MHz()).hclk(216.MHz()).freeze();
        let pclk2 = clocks.pclk2().to_Hz();
        let adc_prescaler = AdcPrescaler::for_pclk2(pclk2)
            .unwrap_or_else(|| defmt::panic!("No ADC prescaler fits PCLK2 {} Hz", pclk2));

        let systick_token = rtic_monotonics::create_systick_token!();
        Systick::start(cx.core.SYST, clocks.sysclk().to_Hz(), systick_token);

        let gpioa = p.GPIOA.split();
        let gpiob = p.GPIOB.split();
        let gpioc = p.GPIOC.split();
        let gpiod = p.GPIOD.split();
        let gpiof = p.GPIOF.split();

        // ADC2 inputs IN0, IN3-IN8, IN10, IN12-IN15
        {
            let _in0 = gpioa.pa0.into_analog();
            let _in3 = gpioa.pa3.into_analog();
            let _in4 = gpioa.pa4.into_analog();
            let _in5 = gpioa.pa5.into_analog();
            let _in6 = gpioa.pa6.into_analog();
            let _in7 = gpioa.pa7.into_analog();
            let _in8 = gpiob.pb0.into_analog();
            let _in10 = gpioc.pc0.into_analog();
            let _in12 = gpioc.pc2.into_analog();
            let _in13 = gpioc.pc3.into_analog();
            let _in14 = gpioc.pc4.into_analog();
            let _in15 = gpioc.pc5.into_analog();
        }

        // ADC3 inputs IN5-IN9, IN14, IN15
        {
            let _in5 = gpiof.pf7.into_analog();
            let _in6 = gpiof.pf8.into_analog();
            let _in7 = gpiof.pf9.into_analog();
            let _in8 = gpiof.pf10.into_analog();
            let _in9 = gpiof.pf3.into_analog();
            let _in14 = gpiof.pf4.into_analog();
            let _in15 = gpiof.pf5.into_analog();
        }

        let led_pin = gpiob.pb7.into_push_pull_output();

        // USART3 is routed to the ST-LINK virtual COM port on the Nucleo
        let telemetry = {
            let tx: Pin<'D', 8, Alternate<7>> = gpiod.pd8.into_alternate();
            let rx: Pin<'D', 9, Alternate<7>> = gpiod.pd9.into_alternate();
            let serial = Serial::new(
                p.USART3,
                (tx, rx),
                &clocks,
                serial::Config {
                    baud_rate: CONFIG.telemetry_baud.bps(),
                    ..Default::default()
                },
            );
            let (tx, _rx) = serial.split();
            tx
        };

        adc_scan::init_dma2(p.DMA2, &mut rcc.ahb1);
        adc_scan::init_adc_common(p.ADC_COMMON, adc_prescaler, &mut rcc.apb2);
        defmt::info!(
            "SYSCLK {} Hz, ADCCLK {} Hz",
            clocks.sysclk().to_Hz(),
            adc_prescaler.adcclk_hz(pclk2)
        );

        let adc2 = Adc2Scan::adc2(
            p.ADC2,
            ADC2_SAMPLES.init([0; ADC2_CHANNEL_COUNT]),
            &CONFIG,
            &mut rcc.apb2,
        );
        let adc3 = Adc3Scan::adc3(
            p.ADC3,
            ADC3_SAMPLES.init([0; ADC3_CHANNEL_COUNT]),
            &CONFIG,
            &mut rcc.apb2,
        );

        let adc2 = Acquisition::new(adc2, &ADC2_DONE, &ADC2_CHANNELS)
            .unwrap_or_else(|e| defmt::panic!("{}", e));
        let adc3 = Acquisition::new(adc3, &ADC3_DONE, &ADC3_CHANNELS)
            .unwrap_or_else(|e| defmt::panic!("{}", e));

        blinky::spawn(led_pin).unwrap_or_else(|_| defmt::panic!("Failed to start blinky"));
        scan::spawn().unwrap_or_else(|_| defmt::panic!("Failed to start scan"));

        (
            Shared {},
            Local {
                adc2,
                adc3,
                telemetry,
            },
        )
    }

    /// Scan both ADCs every interval and send the voltages as one telemetry line
    #[task(local = [adc2, adc3, telemetry], priority = 1)]
    async fn scan(cx: scan::Context) {
        let scan::LocalResources {
            adc2,
            adc3,
            telemetry,
            ..
        } = cx.local;

        let interval = u64::from(CONFIG.scan_interval_ms).millis();
        let timeout = u64::from(CONFIG.scan_timeout_ms).millis();
        let converter = CONFIG.converter();
        let mut sequence: u32 = 0;

        loop {
            let started = Systick::now();

            for result in [adc2.start(), adc3.start()] {
                if let Err(e) = result {
                    defmt::error!("Failed to start scan: {}", e);
                }
            }

            let completed = Systick::timeout_after(timeout, async {
                while !(adc2.is_ready() && adc3.is_ready()) {
                    Systick::delay(1u64.millis()).await;
                }
            })
            .await;

            if completed.is_err() {
                defmt::warn!(
                    "Scan timed out, ADC2 {} ADC3 {}",
                    adc2.poll(),
                    adc3.poll()
                );
                adc2.abort();
                adc3.abort();
            }

            let mut unpacked = true;
            for result in [adc2.unpack().err(), adc3.unpack().err()] {
                if let Some(e) = result {
                    defmt::warn!("Skipping frame {}: {}", sequence, e);
                    unpacked = false;
                }
            }

            if unpacked {
                let frame = Frame::new(sequence, adc2.values(), adc3.values(), converter);
                match frame.encode(CONFIG.telemetry_format) {
                    Ok(line) => {
                        if telemetry.write_str(&line).is_err() {
                            defmt::error!("Failed to write telemetry frame {}", sequence);
                        }
                    }
                    Err(e) => defmt::error!("Failed to encode frame {}: {}", sequence, e),
                }
                defmt::trace!("Sent frame {}", sequence);
            }

            sequence = sequence.wrapping_add(1);
            Systick::delay_until(started + interval).await;
        }
    }

    /// Blinks the blue LED on the Nucleo board to indicate that the program is
    /// running
    #[task(priority = 0)]
    async fn blinky(_cx: blinky::Context, mut led: Pin<'B', 7, Output>) {
        loop {
            Systick::delay(500u64.millis()).await;
            led.set_high();
            Systick::delay(500u64.millis()).await;
            led.set_low();
        }
    }

    #[task(binds = DMA2_STREAM2, priority = 2)]
    fn on_adc2_dma(_cx: on_adc2_dma::Context) {
        on_dma_event(DmaRoute::ADC2, &ADC2_DONE);
    }

    #[task(binds = DMA2_STREAM0, priority = 2)]
    fn on_adc3_dma(_cx: on_adc3_dma::Context) {
        on_dma_event(DmaRoute::ADC3, &ADC3_DONE);
    }

    fn on_dma_event(route: DmaRoute, done: &CompletionFlag) {
        match route.take_event() {
            DmaEvent::TransferComplete => done.signal(),
            DmaEvent::TransferError(flags) => {
                defmt::error!("DMA2 stream {} error flags {=u32:04b}", route.stream, flags)
            }
            DmaEvent::None => {}
        }
    }
}
