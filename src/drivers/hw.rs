//! Low-level peripheral glue (GPIO, LEDC tone channel, ADC oneshot).
//!
//! The only module that touches `esp_idf_sys` directly.  Drivers call these
//! helpers; on non-ESP targets they fall through to in-memory simulation so
//! the rest of the crate compiles and tests on the host.

#[cfg(target_os = "espidf")]
use esp_idf_sys::*;

#[cfg(not(target_os = "espidf"))]
use core::sync::atomic::{AtomicU32, Ordering};

/// Simulated GPIO level bitmask (bit N = GPIO N), host builds only.
#[cfg(not(target_os = "espidf"))]
static SIM_GPIO_LEVELS: AtomicU32 = AtomicU32::new(0);

/// Drive a digital output line.
pub fn gpio_write(gpio: i32, high: bool) {
    #[cfg(target_os = "espidf")]
    unsafe {
        gpio_set_level(gpio, u32::from(high));
    }

    #[cfg(not(target_os = "espidf"))]
    {
        let bit = 1u32 << (gpio as u32 & 31);
        if high {
            SIM_GPIO_LEVELS.fetch_or(bit, Ordering::Relaxed);
        } else {
            SIM_GPIO_LEVELS.fetch_and(!bit, Ordering::Relaxed);
        }
    }
}

/// Read back a simulated GPIO level (host tests only).
#[cfg(not(target_os = "espidf"))]
pub fn sim_gpio_level(gpio: i32) -> bool {
    SIM_GPIO_LEVELS.load(Ordering::Relaxed) & (1 << (gpio as u32 & 31)) != 0
}

/// Retune the LEDC tone channel and start the square wave.
pub fn tone_start(freq_hz: u16) {
    #[cfg(target_os = "espidf")]
    unsafe {
        ledc_set_freq(
            ledc_mode_t_LEDC_LOW_SPEED_MODE,
            ledc_timer_t_LEDC_TIMER_0,
            u32::from(freq_hz),
        );
        ledc_set_duty(
            ledc_mode_t_LEDC_LOW_SPEED_MODE,
            ledc_channel_t_LEDC_CHANNEL_0,
            crate::pins::TONE_PWM_DUTY,
        );
        ledc_update_duty(
            ledc_mode_t_LEDC_LOW_SPEED_MODE,
            ledc_channel_t_LEDC_CHANNEL_0,
        );
    }

    #[cfg(not(target_os = "espidf"))]
    let _ = freq_hz;
}

/// Silence the LEDC tone channel.
pub fn tone_stop() {
    #[cfg(target_os = "espidf")]
    unsafe {
        ledc_set_duty(
            ledc_mode_t_LEDC_LOW_SPEED_MODE,
            ledc_channel_t_LEDC_CHANNEL_0,
            0,
        );
        ledc_update_duty(
            ledc_mode_t_LEDC_LOW_SPEED_MODE,
            ledc_channel_t_LEDC_CHANNEL_0,
        );
    }
}
