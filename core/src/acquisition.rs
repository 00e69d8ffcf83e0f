use core::sync::atomic::{AtomicBool, Ordering};

use crate::{Channel, ChannelMap, Error, ErrorKind, Peripheral};

/// Single-bit "scan complete" signal between interrupt and thread context
///
/// Set by the DMA transfer-complete interrupt, cleared by whoever observes it.
pub struct CompletionFlag(AtomicBool);

impl CompletionFlag {
    pub const fn new() -> Self {
        Self(AtomicBool::new(false))
    }

    pub fn signal(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    /// Returns whether the flag was set and clears it
    pub fn take(&self) -> bool {
        self.0.swap(false, Ordering::AcqRel)
    }
}

impl Default for CompletionFlag {
    fn default() -> Self {
        Self::new()
    }
}

/// Hardware side of one acquisition: an ADC whose scan is moved into memory by DMA
pub trait ScanSource<const N: usize> {
    fn peripheral(&self) -> Peripheral;

    /// The ADC is powered and its sequence and DMA stream are configured
    fn is_initialized(&self) -> bool;

    /// Arm the DMA stream and trigger one conversion of the whole sequence.
    /// Must not block.
    fn start_scan(&mut self);

    /// The buffer the DMA writes into, indexed by slot
    ///
    /// Only meaningful after the completion flag for this scan was raised.
    fn samples(&self) -> &[u16];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AcquisitionState {
    /// No scan in flight and no unread samples
    Idle,
    /// The DMA owns the buffer
    Acquiring,
    /// A full scan is in the buffer and has not been unpacked yet
    Ready,
}

/// Latest value of every channel of one peripheral
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChannelValues<const N: usize> {
    map: &'static ChannelMap<N>,
    values: [f32; N],
}

impl<const N: usize> ChannelValues<N> {
    pub const fn new(map: &'static ChannelMap<N>) -> Self {
        Self {
            map,
            values: [0.0; N],
        }
    }

    /// Copy each channel's sample out of `samples` without any scaling
    ///
    /// Nothing is written unless every bound slot is inside `samples`.
    pub fn unpack_from(&mut self, samples: &[u16]) -> Result<(), Error> {
        if let Some(channel) = self.map.iter().find(|c| c.slot >= samples.len()) {
            return Err(Error::new(
                self.map.peripheral(),
                ErrorKind::IndexOutOfRange {
                    index: channel.slot,
                    len: samples.len(),
                },
            ));
        }

        for (value, channel) in self.values.iter_mut().zip(self.map.iter()) {
            *value = f32::from(samples[channel.slot]);
        }
        Ok(())
    }

    pub fn peripheral(&self) -> Peripheral {
        self.map.peripheral()
    }

    pub fn map(&self) -> &'static ChannelMap<N> {
        self.map
    }

    pub fn get(&self, name: &str) -> Option<f32> {
        self.iter()
            .find(|(channel, _)| channel.name == name)
            .map(|(_, value)| value)
    }

    /// Value of the channel bound to `slot`
    pub fn at_slot(&self, slot: usize) -> Option<f32> {
        self.iter()
            .find(|(channel, _)| channel.slot == slot)
            .map(|(_, value)| value)
    }

    /// Channels with their values, in table order
    pub fn iter(&self) -> impl Iterator<Item = (&'static Channel, f32)> + '_ {
        self.map.iter().zip(self.values.iter().copied())
    }
}

/// Owner of one peripheral's scan: the driver, its completion flag and the unpacked values
pub struct Acquisition<S, const N: usize> {
    source: S,
    done: &'static CompletionFlag,
    state: AcquisitionState,
    values: ChannelValues<N>,
}

impl<S: ScanSource<N>, const N: usize> Acquisition<S, N> {
    /// Fails when `map` describes another peripheral than `source`
    pub fn new(
        source: S,
        done: &'static CompletionFlag,
        map: &'static ChannelMap<N>,
    ) -> Result<Self, Error> {
        if source.peripheral() != map.peripheral() {
            return Err(Error::new(
                source.peripheral(),
                ErrorKind::PeripheralMismatch {
                    map: map.peripheral(),
                },
            ));
        }

        Ok(Self {
            source,
            done,
            state: AcquisitionState::Idle,
            values: ChannelValues::new(map),
        })
    }

    pub fn peripheral(&self) -> Peripheral {
        self.source.peripheral()
    }

    pub fn state(&self) -> AcquisitionState {
        self.state
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn source_mut(&mut self) -> &mut S {
        &mut self.source
    }

    /// Values of the last successful unpack
    pub fn values(&self) -> &ChannelValues<N> {
        &self.values
    }

    /// Start one scan
    ///
    /// Does nothing while a scan is already in flight. Starting from `Ready`
    /// discards the unread scan.
    pub fn start(&mut self) -> Result<(), Error> {
        if !self.source.is_initialized() {
            return Err(Error::new(
                self.peripheral(),
                ErrorKind::PeripheralNotReady,
            ));
        }

        if self.state == AcquisitionState::Acquiring {
            return Ok(());
        }

        self.done.take();
        self.source.start_scan();
        self.state = AcquisitionState::Acquiring;
        Ok(())
    }

    /// Consume the completion flag, moving `Acquiring` to `Ready`
    pub fn poll(&mut self) -> AcquisitionState {
        if self.state == AcquisitionState::Acquiring && self.done.take() {
            self.state = AcquisitionState::Ready;
        }
        self.state
    }

    /// Give up on a scan in flight so the next `start` re-arms the hardware
    ///
    /// Returns whether a scan was in flight. A completed scan is kept.
    pub fn abort(&mut self) -> bool {
        if self.poll() != AcquisitionState::Acquiring {
            return false;
        }
        self.state = AcquisitionState::Idle;
        true
    }

    pub fn is_ready(&mut self) -> bool {
        self.poll() == AcquisitionState::Ready
    }

    /// Unpack a completed scan into the channel values and return to `Idle`
    pub fn unpack(&mut self) -> Result<&ChannelValues<N>, Error> {
        if self.poll() != AcquisitionState::Ready {
            return Err(Error::new(self.peripheral(), ErrorKind::BufferNotFilled));
        }

        self.values.unpack_from(self.source.samples())?;
        self.state = AcquisitionState::Idle;
        Ok(&self.values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wiring::{ADC2_CHANNELS, ADC2_CHANNEL_COUNT, ADC3_CHANNELS, ADC3_CHANNEL_COUNT};
    use rand::Rng;

    /// Stands in for the ADC and DMA, `complete` plays the transfer-complete interrupt
    struct FakeScan<const N: usize> {
        peripheral: Peripheral,
        initialized: bool,
        next: [u16; N],
        buffer: [u16; N],
        starts: usize,
    }

    impl<const N: usize> FakeScan<N> {
        fn new(peripheral: Peripheral) -> Self {
            Self {
                peripheral,
                initialized: true,
                next: [0; N],
                buffer: [0; N],
                starts: 0,
            }
        }

        /// What the DMA does once the sequence is converted
        fn complete(&mut self, done: &CompletionFlag) {
            self.buffer = self.next;
            done.signal();
        }
    }

    impl<const N: usize> ScanSource<N> for FakeScan<N> {
        fn peripheral(&self) -> Peripheral {
            self.peripheral
        }

        fn is_initialized(&self) -> bool {
            self.initialized
        }

        fn start_scan(&mut self) {
            self.starts += 1;
        }

        fn samples(&self) -> &[u16] {
            &self.buffer
        }
    }

    fn flag() -> &'static CompletionFlag {
        Box::leak(Box::new(CompletionFlag::new()))
    }

    type FakeAdc2 = Acquisition<FakeScan<ADC2_CHANNEL_COUNT>, ADC2_CHANNEL_COUNT>;

    fn adc2() -> (FakeAdc2, &'static CompletionFlag) {
        let done = flag();
        (
            Acquisition::new(FakeScan::new(Peripheral::Adc2), done, &ADC2_CHANNELS).unwrap(),
            done,
        )
    }

    fn complete<const N: usize>(acq: &mut Acquisition<FakeScan<N>, N>, done: &CompletionFlag) {
        acq.source_mut().complete(done);
    }

    #[test]
    fn flag_take_clears() {
        let done = CompletionFlag::new();
        assert!(!done.take());
        done.signal();
        assert!(done.is_set());
        assert!(done.take());
        assert!(!done.is_set());
        assert!(!done.take());
    }

    #[test]
    fn scenario_slots_read_their_sample() {
        let (mut acq, done) = adc2();
        acq.source_mut().next = [100, 200, 300, 400, 500, 600, 700, 800, 900, 1000, 1100, 1200];

        acq.start().unwrap();
        complete(&mut acq, done);
        let values = acq.unpack().unwrap();

        for slot in 0..ADC2_CHANNEL_COUNT {
            assert_eq!(values.at_slot(slot), Some(100.0 * (slot + 1) as f32));
        }
        assert_eq!(values.get("adc203"), Some(100.0));
        assert_eq!(values.get("adc200"), Some(800.0));
        assert_eq!(values.get("adc212"), Some(1200.0));
    }

    #[test]
    fn random_buffers_unpack_exactly() {
        let mut rng = rand::thread_rng();
        let done = flag();
        let mut acq = Acquisition::new(
            FakeScan::<ADC3_CHANNEL_COUNT>::new(Peripheral::Adc3),
            done,
            &ADC3_CHANNELS,
        )
        .unwrap();

        for _ in 0..100 {
            let buffer: [u16; ADC3_CHANNEL_COUNT] = rng.gen();
            acq.source_mut().next = buffer;
            acq.start().unwrap();
            complete(&mut acq, done);

            for (channel, value) in acq.unpack().unwrap().iter() {
                assert_eq!(value, buffer[channel.slot] as f32);
            }
        }
        assert_eq!(acq.source().starts, 100);
    }

    #[test]
    fn unpacking_unchanged_buffer_is_idempotent() {
        let (mut acq, done) = adc2();
        acq.source_mut().next = core::array::from_fn(|i| 4095 - i as u16 * 7);

        acq.start().unwrap();
        complete(&mut acq, done);
        let first = *acq.unpack().unwrap();

        acq.start().unwrap();
        complete(&mut acq, done);
        let second = *acq.unpack().unwrap();
        assert_eq!(first, second);

        let mut direct = ChannelValues::new(&ADC2_CHANNELS);
        direct.unpack_from(acq.source().samples()).unwrap();
        direct.unpack_from(acq.source().samples()).unwrap();
        assert_eq!(direct, first);
    }

    #[test]
    fn state_machine_transitions() {
        let (mut acq, done) = adc2();
        assert_eq!(acq.state(), AcquisitionState::Idle);

        acq.start().unwrap();
        assert_eq!(acq.poll(), AcquisitionState::Acquiring);

        // A second start while the DMA owns the buffer is ignored
        acq.start().unwrap();
        assert_eq!(acq.source().starts, 1);

        complete(&mut acq, done);
        assert_eq!(acq.poll(), AcquisitionState::Ready);
        assert!(!done.is_set());

        acq.unpack().unwrap();
        assert_eq!(acq.state(), AcquisitionState::Idle);
    }

    #[test]
    fn unpack_before_completion_is_rejected() {
        let (mut acq, done) = adc2();
        let err = acq.unpack().unwrap_err();
        assert_eq!(err.kind, ErrorKind::BufferNotFilled);

        acq.source_mut().next = [1; ADC2_CHANNEL_COUNT];
        acq.start().unwrap();
        assert_eq!(acq.unpack().unwrap_err().kind, ErrorKind::BufferNotFilled);
        assert_eq!(acq.values().get("adc203"), Some(0.0));

        complete(&mut acq, done);
        assert_eq!(acq.unpack().unwrap().get("adc203"), Some(1.0));
        assert_eq!(acq.unpack().unwrap_err().kind, ErrorKind::BufferNotFilled);
    }

    #[test]
    fn abort_rearms_a_stuck_scan() {
        let (mut acq, done) = adc2();
        acq.start().unwrap();
        assert!(acq.abort());
        assert_eq!(acq.state(), AcquisitionState::Idle);

        acq.start().unwrap();
        assert_eq!(acq.source().starts, 2);

        complete(&mut acq, done);
        assert!(!acq.abort());
        assert_eq!(acq.state(), AcquisitionState::Ready);
    }

    #[test]
    fn table_of_another_peripheral_is_rejected() {
        let err = Acquisition::new(
            FakeScan::<ADC3_CHANNEL_COUNT>::new(Peripheral::Adc2),
            flag(),
            &ADC3_CHANNELS,
        )
        .err();
        assert_eq!(
            err,
            Some(Error::new(
                Peripheral::Adc2,
                ErrorKind::PeripheralMismatch {
                    map: Peripheral::Adc3
                }
            ))
        );
    }

    #[test]
    fn stale_flag_is_dropped_on_start() {
        let (mut acq, done) = adc2();
        done.signal();
        acq.start().unwrap();
        assert_eq!(acq.poll(), AcquisitionState::Acquiring);
    }

    #[test]
    fn uninitialized_peripheral_is_not_started() {
        let (mut acq, _) = adc2();
        acq.source_mut().initialized = false;
        assert_eq!(
            acq.start().unwrap_err(),
            Error::new(Peripheral::Adc2, ErrorKind::PeripheralNotReady)
        );
        assert_eq!(acq.source().starts, 0);
        assert_eq!(acq.state(), AcquisitionState::Idle);
    }

    #[test]
    fn short_buffer_is_out_of_range() {
        let mut values = ChannelValues::new(&ADC2_CHANNELS);
        let err = values.unpack_from(&[7; 11]).unwrap_err();
        assert_eq!(err.kind, ErrorKind::IndexOutOfRange { index: 11, len: 11 });
        assert!(values.iter().all(|(_, v)| v == 0.0));
    }
}
