use crate::{sequence::SampleTime, telemetry::TelemetryFormat, Resolution, VoltageConverter};

/// Settings shared by both ADCs and the telemetry link
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct AcquisitionConfig {
    pub resolution: Resolution,
    /// Voltage on VREF+ in volts
    pub reference_volts: f32,
    pub sample_time: SampleTime,
    /// Time between the starts of two consecutive scans
    pub scan_interval_ms: u32,
    /// How long to wait for both completion flags before giving up on a scan
    pub scan_timeout_ms: u32,
    pub telemetry_format: TelemetryFormat,
    pub telemetry_baud: u32,
}

impl AcquisitionConfig {
    pub const DEFAULT: Self = Self {
        resolution: Resolution::Bits12,
        reference_volts: VoltageConverter::VREF,
        sample_time: SampleTime::Cycles84,
        scan_interval_ms: 100,
        scan_timeout_ms: 10,
        telemetry_format: TelemetryFormat::Text,
        telemetry_baud: 230_400,
    };

    pub const fn converter(&self) -> VoltageConverter {
        VoltageConverter::new(self.reference_volts, self.resolution)
    }
}

impl Default for AcquisitionConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_from_json() {
        let (config, _): (AcquisitionConfig, _) = serde_json_core::from_str(
            r#"{
                "resolution": "Bits10",
                "reference_volts": 3.0,
                "sample_time": "Cycles480",
                "scan_interval_ms": 50,
                "scan_timeout_ms": 5,
                "telemetry_format": "Json",
                "telemetry_baud": 115200
            }"#,
        )
        .unwrap();

        assert_eq!(config.resolution, Resolution::Bits10);
        assert_eq!(config.sample_time, SampleTime::Cycles480);
        assert_eq!(config.telemetry_format, TelemetryFormat::Json);
        assert_eq!(config.converter().raw_to_voltage(1023), 3.0);
    }

    #[test]
    fn timeout_fits_in_interval() {
        let config = AcquisitionConfig::default();
        assert!(config.scan_timeout_ms < config.scan_interval_ms);
    }
}
