//! Connection indicator, typically an LED.
use embedded_hal::digital::OutputPin;

/// Shows whether a peer is connected.
pub trait Indicator {
    fn set_connected(&mut self, connected: bool);
}

/// No indicator.
impl Indicator for () {
    fn set_connected(&mut self, _connected: bool) {}
}

/// Drives an output pin high while a peer is connected.
pub struct PinIndicator<P> {
    pin: P,
}

impl<P: OutputPin> PinIndicator<P> {
    pub fn new(pin: P) -> Self {
        Self { pin }
    }

    pub fn into_inner(self) -> P {
        self.pin
    }
}

impl<P: OutputPin> Indicator for PinIndicator<P> {
    fn set_connected(&mut self, connected: bool) {
        let result = if connected {
            self.pin.set_high()
        } else {
            self.pin.set_low()
        };
        if let Err(e) = result {
            #[cfg(feature = "defmt")]
            let e = defmt::Debug2Format(&e);
            warn!("[event] unable to drive indicator: {:?}", e);
        }
    }
}
