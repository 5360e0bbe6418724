//! Heart Rate Measurement payload decoding
//!
//! Decodes the value of the standard BLE Heart Rate Measurement
//! characteristic (0x2A37) as delivered by a sensor adapter's notification
//! callback. Pairing and subscription stay with the adapter.
//!
//! Layout:
//! - byte 0: flags
//!   - bit 0: heart rate is u16 (else u8)
//!   - bit 1: sensor contact detected
//!   - bit 2: sensor contact feature supported
//!   - bit 3: energy expended (u16, kJ) present
//!   - bit 4: one or more RR intervals (u16, 1/1024 s) present
//! - heart rate, then optional energy expended, then RR intervals.
//!   Multi-byte fields are little-endian.

use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

const FLAG_HR_U16: u8 = 0x01;
const FLAG_CONTACT_DETECTED: u8 = 0x02;
const FLAG_CONTACT_SUPPORTED: u8 = 0x04;
const FLAG_ENERGY_PRESENT: u8 = 0x08;
const FLAG_RR_PRESENT: u8 = 0x10;

/// One heart-rate reading handed to the orchestrator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeartRateSample {
    pub bpm: u16,
    pub observed_at: DateTime<Utc>,
}

/// Skin contact as reported by the sensor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorContact {
    /// Sensor does not report contact status
    Unsupported,
    Detected,
    NotDetected,
}

/// A decoded Heart Rate Measurement notification
#[derive(Debug, Clone, PartialEq)]
pub struct HeartRateMeasurement {
    pub bpm: u16,
    pub contact: SensorContact,
    /// Cumulative energy expended in kilojoules
    pub energy_expended_kj: Option<u16>,
    /// RR intervals in milliseconds
    pub rr_intervals_ms: Vec<f64>,
}

impl HeartRateMeasurement {
    /// False when the sensor explicitly reports no skin contact
    pub fn is_reliable(&self) -> bool {
        self.contact != SensorContact::NotDetected && self.bpm > 0
    }

    pub fn into_sample(self, observed_at: DateTime<Utc>) -> HeartRateSample {
        HeartRateSample {
            bpm: self.bpm,
            observed_at,
        }
    }
}

/// Decode one notification payload
pub fn parse_measurement(payload: &[u8]) -> Result<HeartRateMeasurement> {
    let mut reader = PayloadReader::new(payload);
    let flags = reader.u8("flags")?;

    let bpm = if flags & FLAG_HR_U16 != 0 {
        reader.u16("heart rate (u16)")?
    } else {
        u16::from(reader.u8("heart rate (u8)")?)
    };

    let contact = match (
        flags & FLAG_CONTACT_SUPPORTED != 0,
        flags & FLAG_CONTACT_DETECTED != 0,
    ) {
        (false, _) => SensorContact::Unsupported,
        (true, true) => SensorContact::Detected,
        (true, false) => SensorContact::NotDetected,
    };

    let energy_expended_kj = if flags & FLAG_ENERGY_PRESENT != 0 {
        Some(reader.u16("energy expended")?)
    } else {
        None
    };

    let mut rr_intervals_ms = Vec::new();
    if flags & FLAG_RR_PRESENT != 0 {
        if reader.remaining() == 0 || reader.remaining() % 2 != 0 {
            return Err(Error::InvalidMeasurement(format!(
                "RR interval block has {} bytes",
                reader.remaining()
            )));
        }
        while reader.remaining() > 0 {
            let raw = reader.u16("RR interval")?;
            rr_intervals_ms.push(f64::from(raw) * 1000.0 / 1024.0);
        }
    }

    Ok(HeartRateMeasurement {
        bpm,
        contact,
        energy_expended_kj,
        rr_intervals_ms,
    })
}

struct PayloadReader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> PayloadReader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    fn remaining(&self) -> usize {
        self.bytes.len() - self.pos
    }

    fn u8(&mut self, field: &str) -> Result<u8> {
        let value = *self
            .bytes
            .get(self.pos)
            .ok_or_else(|| truncated(field, self.bytes.len()))?;
        self.pos += 1;
        Ok(value)
    }

    fn u16(&mut self, field: &str) -> Result<u16> {
        let slice = self
            .bytes
            .get(self.pos..self.pos + 2)
            .ok_or_else(|| truncated(field, self.bytes.len()))?;
        self.pos += 2;
        Ok(u16::from_le_bytes([slice[0], slice[1]]))
    }
}

fn truncated(field: &str, len: usize) -> Error {
    Error::InvalidMeasurement(format!("payload of {} bytes truncated at {}", len, field))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_u8_heart_rate() {
        let m = parse_measurement(&[0x00, 72]).unwrap();
        assert_eq!(m.bpm, 72);
        assert_eq!(m.contact, SensorContact::Unsupported);
        assert!(m.energy_expended_kj.is_none());
        assert!(m.rr_intervals_ms.is_empty());
        assert!(m.is_reliable());
    }

    #[test]
    fn test_u16_heart_rate() {
        let m = parse_measurement(&[0x01, 0x2C, 0x01]).unwrap();
        assert_eq!(m.bpm, 300);
    }

    #[test]
    fn test_contact_bits() {
        let detected = parse_measurement(&[0x06, 90]).unwrap();
        assert_eq!(detected.contact, SensorContact::Detected);
        assert!(detected.is_reliable());

        let lost = parse_measurement(&[0x04, 90]).unwrap();
        assert_eq!(lost.contact, SensorContact::NotDetected);
        assert!(!lost.is_reliable());
    }

    #[test]
    fn test_energy_and_rr_intervals() {
        // flags: energy + RR; hr 80; energy 0x0102; RR 1024 and 512
        let payload = [0x18, 80, 0x02, 0x01, 0x00, 0x04, 0x00, 0x02];
        let m = parse_measurement(&payload).unwrap();
        assert_eq!(m.bpm, 80);
        assert_eq!(m.energy_expended_kj, Some(0x0102));
        assert_eq!(m.rr_intervals_ms, vec![1000.0, 500.0]);
    }

    #[test]
    fn test_truncated_payloads() {
        assert!(parse_measurement(&[]).is_err());
        assert!(parse_measurement(&[0x00]).is_err());
        assert!(parse_measurement(&[0x01, 0x50]).is_err());
        assert!(parse_measurement(&[0x08, 80, 0x01]).is_err());
        assert!(parse_measurement(&[0x10, 80, 0x00]).is_err());
        assert!(parse_measurement(&[0x10, 80]).is_err());
    }

    #[test]
    fn test_zero_bpm_is_unreliable() {
        let m = parse_measurement(&[0x00, 0]).unwrap();
        assert!(!m.is_reliable());
    }

    #[test]
    fn test_into_sample_keeps_bpm() {
        let now = Utc::now();
        let sample = parse_measurement(&[0x00, 101]).unwrap().into_sample(now);
        assert_eq!(sample.bpm, 101);
        assert_eq!(sample.observed_at, now);
    }
}
