use std::fs;
use std::io::{
	Read,
	Write,
};
use std::path::{
	Path,
	PathBuf,
};

use super::OutputPin;

const GPIO_ROOT: &str = "/sys/class/gpio";

fn read_attribute(path: &Path) -> crate::AResult<String> {
	with_context!(("couldn't read {}", path.display()), {
		let mut result = String::new();
		fs::File::open(path)?.read_to_string(&mut result)?;
		Ok(result.trim().into())
	})
}

fn write_attribute(path: &Path, value: &str) -> crate::AResult<()> {
	// sysfs attributes need the value in one syscall
	with_context!(("couldn't write {:?} to {}", value, path.display()), {
		fs::OpenOptions::new().write(true).open(path)?.write_all(value.as_bytes())?;

		Ok(())
	})
}

/// GPIO line through the (legacy) sysfs interface
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct SysfsPin {
	number: u8,
	path: PathBuf,
}

impl SysfsPin {
	/// export the pin unless already exported
	pub fn open(number: u8) -> crate::AResult<Self> {
		let path = Path::new(GPIO_ROOT).join(format!("gpio{}", number));
		if !path.exists() {
			debug!("exporting gpio {}", number);
			write_attribute(&Path::new(GPIO_ROOT).join("export"), &number.to_string())?;
		}
		Ok(SysfsPin { number, path })
	}

	pub fn number(&self) -> u8 {
		self.number
	}
}

impl OutputPin for SysfsPin {
	fn make_output(&mut self) -> crate::AResult<()> {
		let direction = self.path.join("direction");
		// writing "out" also drives the pin low, which would drop an active protection
		if read_attribute(&direction)? == "out" {
			return Ok(());
		}
		write_attribute(&direction, "out")
	}

	fn set_high(&mut self, high: bool) -> crate::AResult<()> {
		write_attribute(&self.path.join("value"), if high { "1" } else { "0" })
	}
}
