//! IR reflectance blink sensor driver.
//!
//! Reads the analog voltage from the eyelid reflectance sensor through an
//! ADC channel.  Out-of-range glitches (electrical noise on the long sensor
//! lead) are transient input noise: the driver substitutes the last good
//! reading and carries on — never an error the control loop has to handle.
//!
//! ## Dual-target design
//!
//! On ESP-IDF: reads the ADC via the oneshot API.
//! On host/test: reads from a static `AtomicU16` for injection.

use core::sync::atomic::{AtomicU16, Ordering};

use log::debug;

#[cfg(not(target_os = "espidf"))]
static SIM_BLINK_ADC: AtomicU16 = AtomicU16::new(0);

/// Inject a simulated ADC reading (host tests).
#[cfg(not(target_os = "espidf"))]
pub fn sim_set_blink_adc(raw: u16) {
    SIM_BLINK_ADC.store(raw, Ordering::Relaxed);
}

/// Full-scale ADC value; anything above is a glitch.
pub const ADC_FULL_SCALE: u16 = 4095;

pub struct BlinkSensor {
    last_good: u16,
    total_reads: u32,
    glitches: u32,
}

impl BlinkSensor {
    pub fn new() -> Self {
        Self {
            last_good: 0,
            total_reads: 0,
            glitches: 0,
        }
    }

    /// One filtered reading.
    pub fn read(&mut self) -> u16 {
        self.total_reads = self.total_reads.saturating_add(1);
        let raw = self.read_adc();
        if raw > ADC_FULL_SCALE {
            self.glitches = self.glitches.saturating_add(1);
            debug!("blink glitch discarded: {raw}");
            return self.last_good;
        }
        self.last_good = raw;
        raw
    }

    pub fn total_reads(&self) -> u32 {
        self.total_reads
    }

    pub fn glitch_count(&self) -> u32 {
        self.glitches
    }

    #[cfg(target_os = "espidf")]
    fn read_adc(&self) -> u16 {
        unsafe {
            let mut raw: core::ffi::c_int = 0;
            // Channel configured by main at startup (oneshot unit 1).
            esp_idf_sys::adc_oneshot_read(
                crate::adapters::hardware::adc_unit_handle(),
                esp_idf_sys::adc_channel_t_ADC_CHANNEL_4,
                &mut raw,
            );
            raw as u16
        }
    }

    #[cfg(not(target_os = "espidf"))]
    fn read_adc(&self) -> u16 {
        SIM_BLINK_ADC.load(Ordering::Relaxed)
    }
}

impl Default for BlinkSensor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// The simulated ADC is a process-wide static; serialise tests touching it.
    static SIM_ADC_LOCK: Mutex<()> = Mutex::new(());

    #[test]
    fn reads_injected_value() {
        let _guard = SIM_ADC_LOCK.lock().unwrap();
        let mut s = BlinkSensor::new();
        sim_set_blink_adc(512);
        assert_eq!(s.read(), 512);
        assert_eq!(s.total_reads(), 1);
    }

    #[test]
    fn glitch_repeats_last_good_reading() {
        let _guard = SIM_ADC_LOCK.lock().unwrap();
        let mut s = BlinkSensor::new();
        sim_set_blink_adc(800);
        assert_eq!(s.read(), 800);
        sim_set_blink_adc(u16::MAX);
        assert_eq!(s.read(), 800, "out-of-range reading must be discarded");
        assert_eq!(s.glitch_count(), 1);
        sim_set_blink_adc(900);
        assert_eq!(s.read(), 900);
    }
}
