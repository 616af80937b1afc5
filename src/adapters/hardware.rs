//! Hardware adapter: binds the stimulus and sensor ports to the drivers.
//!
//! One struct satisfies both [`BlinkSensorPort`] and [`StimulusPort`], so
//! the service can take a single `&mut (impl BlinkSensorPort + StimulusPort)`
//! without a double mutable borrow.  On the host the drivers track state in
//! memory, which makes this adapter usable in integration tests too.

use crate::app::ports::{BlinkSensorPort, StimulusPort};
use crate::drivers::distractor::DistractorDriver;
use crate::drivers::puff::PuffValve;
use crate::drivers::tone::ToneDriver;
use crate::sensors::blink::BlinkSensor;

pub struct RigHardware {
    tone: ToneDriver,
    puff: PuffValve,
    distractor: DistractorDriver,
    blink: BlinkSensor,
    /// Session clock fed in each tick for the distractor cadence.
    now_ms: u32,
}

impl RigHardware {
    pub fn new(distractor_on_ms: u32, distractor_off_ms: u32) -> Self {
        Self {
            tone: ToneDriver::new(),
            puff: PuffValve::new(),
            distractor: DistractorDriver::new(distractor_on_ms, distractor_off_ms),
            blink: BlinkSensor::new(),
            now_ms: 0,
        }
    }

    /// Update the adapter's clock; call once per control tick before the
    /// service applies stimulus commands.
    pub fn set_now_ms(&mut self, now_ms: u32) {
        self.now_ms = now_ms;
    }

    pub fn tone(&self) -> &ToneDriver {
        &self.tone
    }

    pub fn puff(&self) -> &PuffValve {
        &self.puff
    }
}

impl BlinkSensorPort for RigHardware {
    fn read_blink(&mut self) -> u16 {
        self.blink.read()
    }
}

impl StimulusPort for RigHardware {
    fn tone_on(&mut self, freq_hz: u16) {
        self.tone.on(freq_hz);
    }

    fn tone_off(&mut self) {
        self.tone.off();
    }

    fn puff_on(&mut self) {
        self.puff.open();
    }

    fn puff_off(&mut self) {
        self.puff.close();
    }

    fn set_distractor(&mut self, lit: bool) {
        self.distractor.tick(self.now_ms, lit);
    }

    fn all_off(&mut self) {
        self.tone.off();
        self.puff.close();
        self.distractor.tick(self.now_ms, false);
    }
}

// ── ESP-IDF peripheral bring-up ───────────────────────────────

/// Shared ADC oneshot unit handle for the blink and keypad channels.
/// Initialised once by [`init_peripherals`]; read by the sensor drivers.
#[cfg(target_os = "espidf")]
static mut ADC_UNIT: esp_idf_sys::adc_oneshot_unit_handle_t = core::ptr::null_mut();

#[cfg(target_os = "espidf")]
pub fn adc_unit_handle() -> esp_idf_sys::adc_oneshot_unit_handle_t {
    unsafe { ADC_UNIT }
}

/// One raw reading from the keypad resistor-ladder channel.
#[cfg(target_os = "espidf")]
pub fn read_keypad_adc() -> u16 {
    unsafe {
        let mut raw: core::ffi::c_int = 0;
        esp_idf_sys::adc_oneshot_read(
            adc_unit_handle(),
            esp_idf_sys::adc_channel_t_ADC_CHANNEL_5,
            &mut raw,
        );
        raw as u16
    }
}

/// Configure GPIO directions, the LEDC tone channel, and the ADC unit.
/// Must run once before the control loop starts.
#[cfg(target_os = "espidf")]
pub fn init_peripherals() -> crate::error::Result<()> {
    use crate::error::Error;
    use crate::pins;
    use esp_idf_sys::*;

    unsafe {
        for gpio in [pins::PUFF_GPIO, pins::DISTRACTOR_GPIO] {
            gpio_set_direction(gpio, gpio_mode_t_GPIO_MODE_OUTPUT);
            gpio_set_level(gpio, 0);
        }

        let timer_cfg = ledc_timer_config_t {
            speed_mode: ledc_mode_t_LEDC_LOW_SPEED_MODE,
            timer_num: ledc_timer_t_LEDC_TIMER_0,
            freq_hz: 3500,
            clk_cfg: ledc_clk_cfg_t_LEDC_AUTO_CLK,
            ..core::mem::zeroed()
        };
        if ledc_timer_config(&timer_cfg) != ESP_OK {
            return Err(Error::Init("ledc timer"));
        }

        let channel_cfg = ledc_channel_config_t {
            gpio_num: pins::TONE_GPIO,
            speed_mode: ledc_mode_t_LEDC_LOW_SPEED_MODE,
            channel: ledc_channel_t_LEDC_CHANNEL_0,
            timer_sel: ledc_timer_t_LEDC_TIMER_0,
            duty: 0,
            ..core::mem::zeroed()
        };
        if ledc_channel_config(&channel_cfg) != ESP_OK {
            return Err(Error::Init("ledc channel"));
        }

        let unit_cfg = adc_oneshot_unit_init_cfg_t {
            unit_id: adc_unit_t_ADC_UNIT_1,
            ..core::mem::zeroed()
        };
        if adc_oneshot_new_unit(&unit_cfg, core::ptr::addr_of_mut!(ADC_UNIT)) != ESP_OK {
            return Err(Error::Init("adc oneshot unit"));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stimulus_port_drives_drivers() {
        let mut hw = RigHardware::new(100, 900);
        hw.tone_on(3500);
        assert_eq!(hw.tone().current_hz(), Some(3500));
        hw.puff_on();
        assert!(hw.puff().is_open());
        hw.all_off();
        assert!(!hw.tone().is_on());
        assert!(!hw.puff().is_open());
    }
}
