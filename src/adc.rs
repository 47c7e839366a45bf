//! SAADC front end: two signal inputs and the battery divider.
//!
//! One conversion samples all three inputs into a [`Frame`]. The frame is
//! the synchronous [`AnalogSource`] the sampler reads from, so a failed
//! scale of one channel never stalls the others.

use defmt::info;
use embassy_nrf::peripherals::{P0_02, P0_03, P0_29, SAADC};
use embassy_nrf::saadc::{ChannelConfig, Config, Saadc};
use embassy_nrf::{bind_interrupts, saadc};
use sigmon::config::{ADC_FULL_SCALE_MV, ADC_RESOLUTION_BITS, CHANNELS};
use sigmon::error::SampleError;
use sigmon::sampler::{raw_to_millivolts, AnalogSource};

bind_interrupts!(struct Irqs {
    SAADC => saadc::InterruptHandler;
});

/// Signal channels first, battery last.
const INPUTS: usize = CHANNELS + 1;
const BATTERY_INPUT: usize = CHANNELS;

pub struct Adc {
    saadc: Saadc<'static, INPUTS>,
}

impl Adc {
    pub async fn new(saadc: SAADC, signal1: P0_02, signal2: P0_03, battery: P0_29) -> Self {
        // Defaults: gain 1/6, internal 0.6 V reference, 12-bit.
        let saadc = Saadc::new(
            saadc,
            Irqs,
            Config::default(),
            [
                ChannelConfig::single_ended(signal1),
                ChannelConfig::single_ended(signal2),
                ChannelConfig::single_ended(battery),
            ],
        );
        saadc.calibrate().await;
        info!("ADC: calibrated, {} inputs", INPUTS);
        Self { saadc }
    }

    /// Convert every input once.
    pub async fn frame(&mut self) -> Frame {
        let mut raw = [0i16; INPUTS];
        self.saadc.sample(&mut raw).await;
        Frame { raw }
    }
}

/// Raw counts of one conversion round.
pub struct Frame {
    raw: [i16; INPUTS],
}

impl Frame {
    pub fn battery_mv(&self) -> Result<i32, SampleError> {
        scale(self.raw[BATTERY_INPUT])
    }
}

impl AnalogSource for Frame {
    fn read_channel(&mut self, channel: usize) -> Result<i32, SampleError> {
        if channel >= CHANNELS {
            return Err(SampleError::Read);
        }
        scale(self.raw[channel])
    }
}

fn scale(raw: i16) -> Result<i32, SampleError> {
    raw_to_millivolts(raw, ADC_FULL_SCALE_MV, ADC_RESOLUTION_BITS)
}
