//! Two-wire (I²C) master transports.
//!
//! A transport only knows complete transactions: START, the device address
//! with the direction bit, the data phase, STOP. Everything above that (like
//! the 16-bit memory address of an EEPROM) is up to the device driver.

use std::fmt;
use std::str;

pub mod bitbang;
#[cfg(any(target_os = "linux", target_os = "android"))]
pub mod linux;

/// 7-bit device address (without the R/W bit)
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct DeviceAddress(pub(crate) u8);

impl DeviceAddress {
	pub fn new(address: u8) -> crate::AResult<Self> {
		ensure!(address <= 0x7f, "invalid 7-bit device address: 0x{:02x} (too big)", address);
		Ok(DeviceAddress(address))
	}

	pub fn get(self) -> u8 {
		self.0
	}

	/// first byte on the wire when writing to the device
	pub fn write_byte(self) -> u8 {
		self.0 << 1
	}

	/// first byte on the wire when reading from the device
	pub fn read_byte(self) -> u8 {
		(self.0 << 1) | 1
	}
}

impl fmt::Display for DeviceAddress {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		write!(f, "0x{:02x}", self.0)
	}
}

impl str::FromStr for DeviceAddress {
	type Err = ::failure::Error;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let address = crate::parse_number(s, u8::from_str_radix)?;
		DeviceAddress::new(address)
	}
}

pub trait TwoWire {
	/// prepare the bus for transactions
	fn begin(&mut self) -> crate::AResult<()>;

	/// release the bus
	fn end(&mut self) -> crate::AResult<()>;

	/// START, address+W, `data`, STOP
	fn write(&mut self, address: DeviceAddress, data: &[u8]) -> crate::AResult<()>;

	/// START, address+R, fill `target` (NACK on last byte), STOP
	fn read(&mut self, address: DeviceAddress, target: &mut [u8]) -> crate::AResult<()>;
}

impl<'a, B: ?Sized + TwoWire> TwoWire for &'a mut B {
	fn begin(&mut self) -> crate::AResult<()> {
		B::begin(*self)
	}
	fn end(&mut self) -> crate::AResult<()> {
		B::end(*self)
	}
	fn write(&mut self, address: DeviceAddress, data: &[u8]) -> crate::AResult<()> {
		B::write(*self, address, data)
	}
	fn read(&mut self, address: DeviceAddress, target: &mut [u8]) -> crate::AResult<()> {
		B::read(*self, address, target)
	}
}

impl<B: ?Sized + TwoWire> TwoWire for Box<B> {
	fn begin(&mut self) -> crate::AResult<()> {
		B::begin(self)
	}
	fn end(&mut self) -> crate::AResult<()> {
		B::end(self)
	}
	fn write(&mut self, address: DeviceAddress, data: &[u8]) -> crate::AResult<()> {
		B::write(self, address, data)
	}
	fn read(&mut self, address: DeviceAddress, target: &mut [u8]) -> crate::AResult<()> {
		B::read(self, address, target)
	}
}

#[cfg(test)]
mod test {
	use super::DeviceAddress;

	fn check_address_canonical(address: u8, repr: &str) {
		match repr.parse::<DeviceAddress>() {
			Err(e) => panic!("{} failed to parse as DeviceAddress: {}", repr, e),
			Ok(a) => assert_eq!(address, a.get(), "failed validating parsed {}", repr),
		}
		assert_eq!(DeviceAddress(address).to_string(), repr, "failed stringifying 0x{:02x}", address);
	}

	fn check_invalid_address(repr: &str) {
		assert!(repr.parse::<DeviceAddress>().is_err(), "{:?} must not be a valid device address", repr);
	}

	#[test]
	fn parse_device_address() {
		check_address_canonical(0x50, "0x50");
		check_address_canonical(0x00, "0x00");
		check_address_canonical(0x7f, "0x7f");
		assert_eq!("80".parse::<DeviceAddress>().unwrap(), DeviceAddress(0x50));
		check_invalid_address("");
		check_invalid_address("0x80");
		check_invalid_address("128");
		check_invalid_address("0x");
		check_invalid_address("fifty");
	}

	#[test]
	fn direction_bit() {
		let a = DeviceAddress::new(0x50).unwrap();
		assert_eq!(a.write_byte(), 0xa0);
		assert_eq!(a.read_byte(), 0xa1);
	}
}
