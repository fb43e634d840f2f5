use std::fmt;
use std::str;

#[cfg(any(target_os = "linux", target_os = "android"))]
mod sysfs;

#[cfg(any(target_os = "linux", target_os = "android"))]
pub use self::sysfs::SysfsPin;

/// Digital output driving a single signal
pub trait OutputPin {
	/// configure the pin as output
	fn make_output(&mut self) -> crate::AResult<()>;

	fn set_high(&mut self, high: bool) -> crate::AResult<()>;
}

impl<'a, P: ?Sized + OutputPin> OutputPin for &'a mut P {
	fn make_output(&mut self) -> crate::AResult<()> {
		P::make_output(*self)
	}
	fn set_high(&mut self, high: bool) -> crate::AResult<()> {
		P::set_high(*self, high)
	}
}

impl<P: ?Sized + OutputPin> OutputPin for Box<P> {
	fn make_output(&mut self) -> crate::AResult<()> {
		P::make_output(self)
	}
	fn set_high(&mut self, high: bool) -> crate::AResult<()> {
		P::set_high(self, high)
	}
}

/// GPIO number as given on the command line; `NONE` (0xff) means "not connected"
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct PinNumber(pub u8);

impl PinNumber {
	pub const NONE: PinNumber = PinNumber(0xff);

	pub fn get(self) -> Option<u8> {
		if self == PinNumber::NONE {
			None
		} else {
			Some(self.0)
		}
	}
}

impl Default for PinNumber {
	fn default() -> Self {
		PinNumber::NONE
	}
}

impl fmt::Display for PinNumber {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		match self.get() {
			None => write!(f, "none"),
			Some(n) => write!(f, "{}", n),
		}
	}
}

impl str::FromStr for PinNumber {
	type Err = ::failure::Error;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		if s == "none" {
			return Ok(PinNumber::NONE);
		}
		Ok(PinNumber(crate::parse_number(s, u8::from_str_radix)?))
	}
}
