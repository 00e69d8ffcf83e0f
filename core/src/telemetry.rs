//! Line-oriented telemetry of the latest channel voltages
//!
//! One frame per scan, newline terminated, either as `NAME:value` pairs
//! separated by `|` or as a single JSON object.

use core::fmt::{self, Write};

use heapless::String;
use serde::ser::{Serialize, SerializeStruct, Serializer};

use crate::{ChannelValues, VoltageConverter};

pub const FRAME_CAPACITY: usize = 768;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TelemetryFormat {
    /// `SEQ:12|adc203:1.234|adc210:0.002|...`
    #[default]
    Text,
    /// `{"seq":12,"adc2":{"adc203":1.2341,...},"adc3":{...}}`
    Json,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TelemetryError {
    BufferFull,
}

impl fmt::Display for TelemetryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TelemetryError::BufferFull => f.write_str("telemetry frame does not fit its buffer"),
        }
    }
}

/// Channel values of one peripheral rendered as volts
#[derive(Clone, Copy)]
pub struct Voltages<'a, const N: usize> {
    values: &'a ChannelValues<N>,
    converter: VoltageConverter,
}

impl<'a, const N: usize> Voltages<'a, N> {
    pub fn new(values: &'a ChannelValues<N>, converter: VoltageConverter) -> Self {
        Self { values, converter }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, f32)> + '_ {
        self.values
            .iter()
            .map(|(channel, value)| (channel.name, self.converter.value_to_voltage(value)))
    }
}

impl<const N: usize> fmt::Display for Voltages<'_, N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (name, volts)) in self.iter().enumerate() {
            if i > 0 {
                f.write_char('|')?;
            }
            write!(f, "{}:{:.3}", name, volts)?;
        }
        Ok(())
    }
}

impl<const N: usize> Serialize for Voltages<'_, N> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("Voltages", N)?;
        for (name, volts) in self.iter() {
            state.serialize_field(name, &volts)?;
        }
        state.end()
    }
}

/// Everything sent for one scan of both peripherals
#[derive(Clone, Copy, serde::Serialize)]
pub struct Frame<'a, const A: usize, const B: usize> {
    #[serde(rename = "seq")]
    pub sequence: u32,
    pub adc2: Voltages<'a, A>,
    pub adc3: Voltages<'a, B>,
}

impl<'a, const A: usize, const B: usize> Frame<'a, A, B> {
    pub fn new(
        sequence: u32,
        adc2: &'a ChannelValues<A>,
        adc3: &'a ChannelValues<B>,
        converter: VoltageConverter,
    ) -> Self {
        Self {
            sequence,
            adc2: Voltages::new(adc2, converter),
            adc3: Voltages::new(adc3, converter),
        }
    }

    pub fn encode(&self, format: TelemetryFormat) -> Result<String<FRAME_CAPACITY>, TelemetryError> {
        self.encode_into(format)
    }

    pub fn encode_into<const CAP: usize>(
        &self,
        format: TelemetryFormat,
    ) -> Result<String<CAP>, TelemetryError> {
        let mut line = match format {
            TelemetryFormat::Text => {
                let mut line = String::new();
                write!(line, "{}", self).map_err(|_| TelemetryError::BufferFull)?;
                line
            }
            TelemetryFormat::Json => serde_json_core::to_string::<_, CAP>(self)
                .map_err(|_| TelemetryError::BufferFull)?,
        };
        line.push('\n').map_err(|_| TelemetryError::BufferFull)?;
        Ok(line)
    }
}

impl<const A: usize, const B: usize> fmt::Display for Frame<'_, A, B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SEQ:{}|{}|{}", self.sequence, self.adc2, self.adc3)
    }
}
