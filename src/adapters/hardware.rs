//! Hardware adapter: bridges a real codec and board GPIOs to the port
//! traits.
//!
//! Wraps any [`RegisterPort`] (normally an
//! [`I2cRegmap`](super::regmap::I2cRegmap)) plus optional polarity and
//! accessory ID pins.  The MICVDD charge pump and the MICBIAS pins are
//! driven through codec registers, so this adapter and the simulator are
//! the only code that knows where those controls live.

use core::convert::Infallible;

use embedded_hal::digital::{ErrorType, OutputPin, PinState};
use log::{debug, warn};

use crate::app::ports::{BiasPort, MicBias, RegisterPort, SupplyPort, SwitchLines};
use crate::error::BusError;
use crate::regs::{
    CPMIC_BYPASS, CPMIC_ENA, MIC_BIAS_CTRL_1, MIC_BIAS_CTRL_2, MIC_BIAS_CTRL_3,
    MIC_CHARGE_PUMP_1, MICB_ENA,
};

/// Placeholder for a GPIO the board does not fit.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoPin;

impl ErrorType for NoPin {
    type Error = Infallible;
}

impl OutputPin for NoPin {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}

/// Register writes that clear latched mic input state.
pub type InputClearSequence = &'static [(u32, u32)];

pub struct CodecAdapter<R, P = NoPin, I = NoPin> {
    regs: R,
    polarity: Option<P>,
    id: Option<I>,
    supply_users: u32,
    input_clear: InputClearSequence,
}

impl<R: RegisterPort> CodecAdapter<R> {
    pub fn new(regs: R) -> Self {
        Self {
            regs,
            polarity: None,
            id: None,
            supply_users: 0,
            input_clear: &[],
        }
    }
}

impl<R, P, I> CodecAdapter<R, P, I>
where
    R: RegisterPort,
    P: OutputPin,
    I: OutputPin,
{
    /// Fit a polarity switch GPIO.
    pub fn with_polarity_pin<Q: OutputPin>(self, pin: Q) -> CodecAdapter<R, Q, I> {
        CodecAdapter {
            regs: self.regs,
            polarity: Some(pin),
            id: self.id,
            supply_users: self.supply_users,
            input_clear: self.input_clear,
        }
    }

    /// Fit an accessory ID GPIO.
    pub fn with_id_pin<Q: OutputPin>(self, pin: Q) -> CodecAdapter<R, P, Q> {
        CodecAdapter {
            regs: self.regs,
            polarity: self.polarity,
            id: Some(pin),
            supply_users: self.supply_users,
            input_clear: self.input_clear,
        }
    }

    /// Writes issued after MICD events on chips whose mic inputs latch.
    pub fn with_input_clear(mut self, sequence: InputClearSequence) -> Self {
        self.input_clear = sequence;
        self
    }

    pub fn regs_mut(&mut self) -> &mut R {
        &mut self.regs
    }

    /// Tear down into the register port and pins.
    pub fn release(self) -> (R, Option<P>, Option<I>) {
        (self.regs, self.polarity, self.id)
    }
}

fn drive<Q: OutputPin>(pin: &mut Q, high: bool) -> Result<(), BusError> {
    pin.set_state(PinState::from(high)).map_err(|_| BusError::Line)
}

fn bias_register(bias: MicBias) -> Option<u32> {
    match bias {
        MicBias::MicVdd => None,
        MicBias::MicBias1 => Some(MIC_BIAS_CTRL_1),
        MicBias::MicBias2 => Some(MIC_BIAS_CTRL_2),
        MicBias::MicBias3 => Some(MIC_BIAS_CTRL_3),
    }
}

// ── RegisterPort ──────────────────────────────────────────────

impl<R, P, I> RegisterPort for CodecAdapter<R, P, I>
where
    R: RegisterPort,
    P: OutputPin,
    I: OutputPin,
{
    fn read(&mut self, reg: u32) -> Result<u32, BusError> {
        self.regs.read(reg)
    }

    fn write(&mut self, reg: u32, val: u32) -> Result<(), BusError> {
        self.regs.write(reg, val)
    }

    fn clear_input(&mut self) -> Result<(), BusError> {
        for &(reg, val) in self.input_clear {
            self.regs.write(reg, val)?;
        }
        Ok(())
    }
}

// ── SupplyPort ────────────────────────────────────────────────

impl<R, P, I> SupplyPort for CodecAdapter<R, P, I>
where
    R: RegisterPort,
    P: OutputPin,
    I: OutputPin,
{
    fn supply_enable(&mut self) -> Result<(), BusError> {
        if self.supply_users == 0 {
            debug!("MICVDD on");
            self.regs.update_bits(MIC_CHARGE_PUMP_1, CPMIC_ENA, CPMIC_ENA)?;
        }
        self.supply_users += 1;
        Ok(())
    }

    fn supply_disable(&mut self) -> Result<(), BusError> {
        let Some(users) = self.supply_users.checked_sub(1) else {
            warn!("Unbalanced MICVDD disable");
            return Err(BusError::Supply);
        };
        if users == 0 {
            debug!("MICVDD off");
            self.regs.update_bits(MIC_CHARGE_PUMP_1, CPMIC_ENA, 0)?;
        }
        self.supply_users = users;
        Ok(())
    }

    fn allow_bypass(&mut self, bypass: bool) -> Result<(), BusError> {
        let val = if bypass { CPMIC_BYPASS } else { 0 };
        self.regs.update_bits(MIC_CHARGE_PUMP_1, CPMIC_BYPASS, val)
    }
}

// ── BiasPort ──────────────────────────────────────────────────

impl<R, P, I> BiasPort for CodecAdapter<R, P, I>
where
    R: RegisterPort,
    P: OutputPin,
    I: OutputPin,
{
    fn force_enable(&mut self, bias: MicBias) -> Result<(), BusError> {
        match bias_register(bias) {
            Some(reg) => self.regs.update_bits(reg, MICB_ENA, MICB_ENA),
            // MICVDD is always up while MICD runs.
            None => Ok(()),
        }
    }

    fn disable(&mut self, bias: MicBias) -> Result<(), BusError> {
        match bias_register(bias) {
            Some(reg) => self.regs.update_bits(reg, MICB_ENA, 0),
            None => Ok(()),
        }
    }
}

// ── SwitchLines ───────────────────────────────────────────────

impl<R, P, I> SwitchLines for CodecAdapter<R, P, I>
where
    R: RegisterPort,
    P: OutputPin,
    I: OutputPin,
{
    fn set_polarity_line(&mut self, high: bool) -> Result<(), BusError> {
        match self.polarity.as_mut() {
            Some(pin) => drive(pin, high),
            None => Ok(()),
        }
    }

    fn set_id_line(&mut self, high: bool) -> Result<(), BusError> {
        match self.id.as_mut() {
            Some(pin) => drive(pin, high),
            None => Ok(()),
        }
    }

    fn has_id_line(&self) -> bool {
        self.id.is_some()
    }
}
