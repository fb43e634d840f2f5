//! Driver for the Microchip 24LC512, a 512-kbit (64K x 8) I²C serial EEPROM.
//!
//! Only single byte random access is supported:
//! - byte write: START, address+W, address high byte, address low byte, data, STOP
//! - random read: START, address+W, address high byte, address low byte, STOP,
//!   then START, address+R, one data byte (NACK), STOP
//!
//! After a write the device runs an internal write cycle (up to 5 ms,
//! `WRITE_CYCLE_TIME`) and doesn't acknowledge its address until finished.
//! The driver doesn't wait for it unless `Config::write_delay` is set; call
//! `settle()` or sleep yourself before the next access.
//!
//! With the WP pin high the device still acknowledges writes, but doesn't
//! store the data.

use std::time::Duration;

use crate::bus::{
	DeviceAddress,
	TwoWire,
	bitbang::reliable_sleep,
};
use crate::gpio::OutputPin;

/// Address with A0..A2 tied low
pub const DEFAULT_ADDRESS: DeviceAddress = DeviceAddress(0x50);

/// Maximum internal write cycle time (tWC)
pub const WRITE_CYCLE_TIME: Duration = Duration::from_millis(5);

// value returned by `read` on failure: an undriven bus reads as all ones
const IDLE_BUS_BYTE: u8 = 0xff;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Config {
	pub address: DeviceAddress,
	/// sleep after each successful write; `None` leaves the write cycle to the caller
	pub write_delay: Option<Duration>,
}

impl Default for Config {
	fn default() -> Self {
		Config {
			address: DEFAULT_ADDRESS,
			write_delay: None,
		}
	}
}

/// Placeholder for "no write-protect pin connected"
#[derive(Debug)]
pub enum NoPin {}

impl OutputPin for NoPin {
	fn make_output(&mut self) -> crate::AResult<()> {
		match *self {}
	}

	fn set_high(&mut self, _high: bool) -> crate::AResult<()> {
		match *self {}
	}
}

pub struct Mcp24lc512<'a, B: ?Sized + TwoWire + 'a, P: OutputPin = NoPin> {
	bus: &'a mut B,
	address: DeviceAddress,
	protect: Option<P>,
	write_delay: Option<Duration>,
}

impl<'a, B: ?Sized + TwoWire> Mcp24lc512<'a, B, NoPin> {
	pub fn begin_unprotected(bus: &'a mut B, config: Config) -> crate::AResult<Self> {
		Self::begin(bus, config, None)
	}
}

impl<'a, B: ?Sized + TwoWire, P: OutputPin> Mcp24lc512<'a, B, P> {
	/// Configure the WP pin (if any) as output and initialize the bus.
	///
	/// The bus stays borrowed until `end`; errors from the bus are returned
	/// as they are.
	pub fn begin(bus: &'a mut B, config: Config, mut protect: Option<P>) -> crate::AResult<Self> {
		if let Some(pin) = protect.as_mut() {
			pin.make_output()?;
		}
		bus.begin()?;
		debug!(
			"24LC512 at {} ready (write protect pin: {}, write delay: {:?})",
			config.address,
			if protect.is_some() { "yes" } else { "no" },
			config.write_delay,
		);

		Ok(Mcp24lc512 {
			bus,
			address: config.address,
			protect,
			write_delay: config.write_delay,
		})
	}

	/// Release the bus.
	pub fn end(self) -> crate::AResult<()> {
		self.bus.end()
	}

	pub fn address(&self) -> DeviceAddress {
		self.address
	}

	pub fn has_write_protect(&self) -> bool {
		self.protect.is_some()
	}

	/// Store `data` at `address`.
	///
	/// Succeeds when the device acknowledged the whole transaction, which
	/// includes writes ignored due to an active write protection.
	pub fn write(&mut self, address: u16, data: u8) -> crate::AResult<()> {
		trace!("{}: write @{:04x}: {:02x}", self.address, address, data);
		self.bus.write(self.address, &[(address >> 8) as u8, address as u8, data])?;
		if let Some(delay) = self.write_delay {
			reliable_sleep(delay);
		}
		Ok(())
	}

	/// Wait for the internal write cycle to finish.
	pub fn settle(&self) {
		reliable_sleep(WRITE_CYCLE_TIME);
	}

	// always runs both transactions, even if setting the address failed
	fn read_phases(&mut self, address: u16) -> (crate::AResult<()>, crate::AResult<u8>) {
		trace!("{}: read @{:04x}", self.address, address);
		let select = self.bus.write(self.address, &[(address >> 8) as u8, address as u8]);
		let mut buf = [IDLE_BUS_BYTE];
		let fetch = self.bus.read(self.address, &mut buf).map(|()| buf[0]);
		(select, fetch)
	}

	/// Read the byte at `address`.
	///
	/// There is no error reporting: if the bus fails the result is garbage
	/// (a failed address phase returns data from wherever the device's
	/// address pointer was). Use `try_read` to see errors.
	pub fn read(&mut self, address: u16) -> u8 {
		let (select, fetch) = self.read_phases(address);
		if let Err(e) = select {
			warn!("{}: setting read address {:04x} failed: {}", self.address, address, e);
		}
		match fetch {
			Ok(data) => data,
			Err(e) => {
				warn!("{}: reading @{:04x} failed: {}", self.address, address, e);
				IDLE_BUS_BYTE
			},
		}
	}

	pub fn try_read(&mut self, address: u16) -> crate::AResult<u8> {
		let (select, fetch) = self.read_phases(address);
		with_context!(("couldn't set read address {:04x}", address), select)?;
		fetch
	}

	/// Drive WP high (protected) or low; does nothing without a WP pin.
	pub fn set_write_protect(&mut self, enabled: bool) -> crate::AResult<()> {
		match self.protect.as_mut() {
			None => {
				debug!("{}: no write protect pin, ignoring request ({})", self.address, enabled);
				Ok(())
			},
			Some(pin) => {
				trace!("{}: write protect {}", self.address, if enabled { "on" } else { "off" });
				pin.set_high(enabled)
			},
		}
	}
}
