use std::ffi::CString;
use std::fs;
use std::io::{
	self,
	Read,
	Write,
};
use std::os::unix::io::{
	AsRawFd,
	FromRawFd,
};
use std::path::{
	Path,
	PathBuf,
};

use libc::{
	EBUSY,
	O_CLOEXEC,
	O_RDWR,
	c_ulong,
	ioctl,
	open,
};

use super::{
	DeviceAddress,
	TwoWire,
};

// from linux/i2c-dev.h
const I2C_SLAVE: c_ulong = 0x0703;
const I2C_SLAVE_FORCE: c_ulong = 0x0706;

/// Adapter behind a `/dev/i2c-N` character device
#[derive(Debug)]
pub struct LinuxI2c {
	file: fs::File,
	path: PathBuf,
	selected: Option<DeviceAddress>,
}

impl LinuxI2c {
	pub fn open<P: AsRef<Path>>(path: P) -> crate::AResult<Self> {
		let path = path.as_ref().to_path_buf();
		with_context!(("couldn't open i2c adapter {}", path.display()), {
			let c_path = CString::new(path.to_string_lossy().into_owned())?;
			let fd = unsafe { open(c_path.as_ptr(), O_RDWR | O_CLOEXEC) };
			if -1 == fd {
				return Err(failure::Error::from(io::Error::last_os_error()));
			}
			// now get fd managed to prevent resource leak
			let file = unsafe { fs::File::from_raw_fd(fd) };
			Ok(LinuxI2c {
				file,
				path: path.clone(),
				selected: None,
			})
		})
	}

	pub fn path(&self) -> &Path {
		&self.path
	}

	fn set_slave(&self, request: c_ulong, address: DeviceAddress) -> io::Result<()> {
		let res = unsafe { ioctl(self.file.as_raw_fd(), request as _, address.get() as c_ulong) };
		if res < 0 {
			return Err(io::Error::last_os_error());
		}
		Ok(())
	}

	fn select(&mut self, address: DeviceAddress) -> crate::AResult<()> {
		if self.selected == Some(address) {
			return Ok(());
		}
		match self.set_slave(I2C_SLAVE, address) {
			Ok(()) => (),
			Err(ref e) if e.raw_os_error() == Some(EBUSY) => {
				// a kernel driver claimed the address (e.g. at24); we only do single transfers
				info!("{}: address {} busy, forcing access", self.path.display(), address);
				self.set_slave(I2C_SLAVE_FORCE, address)?;
			},
			Err(e) => {
				bail!("couldn't select device {} on {}: {}", address, self.path.display(), e);
			},
		}
		self.selected = Some(address);
		Ok(())
	}
}

impl TwoWire for LinuxI2c {
	// the kernel owns the adapter
	fn begin(&mut self) -> crate::AResult<()> {
		Ok(())
	}

	fn end(&mut self) -> crate::AResult<()> {
		self.selected = None;
		Ok(())
	}

	fn write(&mut self, address: DeviceAddress, data: &[u8]) -> crate::AResult<()> {
		self.select(address)?;
		// write(2) is one complete transaction; a short write means the device NACKed
		let written = self.file.write(data)?;
		ensure!(written == data.len(), "short write to {}: {} of {} bytes", address, written, data.len());
		Ok(())
	}

	fn read(&mut self, address: DeviceAddress, target: &mut [u8]) -> crate::AResult<()> {
		self.select(address)?;
		let len = self.file.read(target)?;
		ensure!(len == target.len(), "short read from {}: {} of {} bytes", address, len, target.len());
		Ok(())
	}
}
