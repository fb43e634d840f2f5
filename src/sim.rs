//! In-memory 24LC512 hanging on a two-wire bus.
//!
//! The model follows the datasheet where it matters for the driver: the
//! device NACKs its address while an internal write cycle is running, a
//! write with WP high is acknowledged but not stored (and starts no write
//! cycle), and reads continue from the internal address pointer.
//!
//! Every transaction the master starts is recorded, including the ones the
//! device doesn't acknowledge.

use std::cell::RefCell;
use std::rc::Rc;
use std::time::{
	Duration,
	Instant,
};

use crate::bus::{
	DeviceAddress,
	TwoWire,
};
use crate::gpio::OutputPin;
use crate::eeprom::{
	DEFAULT_ADDRESS,
	WRITE_CYCLE_TIME,
};

pub const CAPACITY: usize = 0x1_0000;

#[derive(Clone, PartialEq, Eq, Debug)]
pub enum Transaction {
	Write(DeviceAddress, Vec<u8>),
	Read(DeviceAddress, usize),
}

#[derive(Debug)]
struct State {
	address: DeviceAddress,
	memory: Vec<u8>,
	pointer: u16,
	initialized: bool,
	fail_begin: bool,
	fail_end: bool,
	pin_output: bool,
	write_protect: bool,
	write_cycle: Duration,
	busy_until: Option<Instant>,
	transactions: Vec<Transaction>,
}

impl State {
	// address phase: only ACK our own address, and only when not busy
	fn acknowledge(&mut self, address: DeviceAddress) -> crate::AResult<()> {
		ensure!(self.initialized, "bus not initialized");
		ensure!(address == self.address, "no ACK for address {}", address);
		if let Some(until) = self.busy_until {
			ensure!(Instant::now() >= until, "no ACK for address {} (write cycle in progress)", address);
			self.busy_until = None;
		}
		Ok(())
	}
}

/// Bus side of the simulated device; clones share the same device.
#[derive(Clone, Debug)]
pub struct SimulatedEeprom {
	state: Rc<RefCell<State>>,
}

impl Default for SimulatedEeprom {
	fn default() -> Self {
		SimulatedEeprom::new(DEFAULT_ADDRESS)
	}
}

impl SimulatedEeprom {
	/// erased device (all bytes 0xff) answering at `address`
	pub fn new(address: DeviceAddress) -> Self {
		SimulatedEeprom {
			state: Rc::new(RefCell::new(State {
				address,
				memory: vec![0xff; CAPACITY],
				pointer: 0,
				initialized: false,
				fail_begin: false,
				fail_end: false,
				pin_output: false,
				write_protect: false,
				write_cycle: WRITE_CYCLE_TIME,
				busy_until: None,
				transactions: Vec::new(),
			})),
		}
	}

	pub fn with_write_cycle(self, write_cycle: Duration) -> Self {
		self.state.borrow_mut().write_cycle = write_cycle;
		self
	}

	/// WP input of the device, to be driven by the driver
	pub fn protect_pin(&self) -> SimulatedProtectPin {
		SimulatedProtectPin {
			state: self.state.clone(),
		}
	}

	pub fn transactions(&self) -> Vec<Transaction> {
		self.state.borrow().transactions.clone()
	}

	pub fn clear_transactions(&self) {
		self.state.borrow_mut().transactions.clear();
	}

	pub fn peek(&self, address: u16) -> u8 {
		self.state.borrow().memory[address as usize]
	}

	pub fn poke(&self, address: u16, data: u8) {
		self.state.borrow_mut().memory[address as usize] = data;
	}

	pub fn is_initialized(&self) -> bool {
		self.state.borrow().initialized
	}

	pub fn is_write_protected(&self) -> bool {
		self.state.borrow().write_protect
	}

	pub fn set_fail_begin(&self, fail: bool) {
		self.state.borrow_mut().fail_begin = fail;
	}

	pub fn set_fail_end(&self, fail: bool) {
		self.state.borrow_mut().fail_end = fail;
	}
}

impl TwoWire for SimulatedEeprom {
	fn begin(&mut self) -> crate::AResult<()> {
		let mut state = self.state.borrow_mut();
		ensure!(!state.fail_begin, "simulated bus failed to initialize");
		state.initialized = true;
		Ok(())
	}

	fn end(&mut self) -> crate::AResult<()> {
		let mut state = self.state.borrow_mut();
		ensure!(!state.fail_end, "simulated bus failed to shut down");
		state.initialized = false;
		Ok(())
	}

	fn write(&mut self, address: DeviceAddress, data: &[u8]) -> crate::AResult<()> {
		let mut state = self.state.borrow_mut();
		state.transactions.push(Transaction::Write(address, data.to_vec()));
		state.acknowledge(address)?;

		match *data {
			[] | [_] => {
				// address probe or incomplete memory address: nothing latched
				Ok(())
			},
			[hi, lo] => {
				state.pointer = (hi as u16) << 8 | lo as u16;
				Ok(())
			},
			[hi, lo, byte] => {
				let pointer = (hi as u16) << 8 | lo as u16;
				if state.write_protect {
					trace!("simulated write @{:04x} ignored: write protected", pointer);
				} else {
					let write_cycle = state.write_cycle;
					state.memory[pointer as usize] = byte;
					state.busy_until = Some(Instant::now() + write_cycle);
				}
				state.pointer = pointer.wrapping_add(1);
				Ok(())
			},
			_ => bail!("simulated device doesn't support page writes ({} bytes)", data.len()),
		}
	}

	fn read(&mut self, address: DeviceAddress, target: &mut [u8]) -> crate::AResult<()> {
		let mut state = self.state.borrow_mut();
		state.transactions.push(Transaction::Read(address, target.len()));
		state.acknowledge(address)?;

		for t in target.iter_mut() {
			*t = state.memory[state.pointer as usize];
			state.pointer = state.pointer.wrapping_add(1);
		}
		Ok(())
	}
}

/// WP input of a `SimulatedEeprom`
#[derive(Clone, Debug)]
pub struct SimulatedProtectPin {
	state: Rc<RefCell<State>>,
}

impl OutputPin for SimulatedProtectPin {
	fn make_output(&mut self) -> crate::AResult<()> {
		self.state.borrow_mut().pin_output = true;
		Ok(())
	}

	fn set_high(&mut self, high: bool) -> crate::AResult<()> {
		let mut state = self.state.borrow_mut();
		ensure!(state.pin_output, "write-protect pin not configured as output");
		state.write_protect = high;
		Ok(())
	}
}

#[cfg(test)]
mod test {
	use std::time::Duration;

	use super::{
		SimulatedEeprom,
		Transaction,
	};
	use crate::bus::{
		DeviceAddress,
		TwoWire,
	};
	use crate::gpio::OutputPin;

	fn started() -> SimulatedEeprom {
		let mut sim = SimulatedEeprom::default().with_write_cycle(Duration::from_secs(0));
		sim.begin().unwrap();
		sim
	}

	#[test]
	fn rejects_transactions_before_begin() {
		let mut sim = SimulatedEeprom::default();
		let address = DeviceAddress::new(0x50).unwrap();
		assert!(sim.write(address, &[0x00, 0x00]).is_err());
		sim.begin().unwrap();
		assert!(sim.write(address, &[0x00, 0x00]).is_ok());
		sim.end().unwrap();
		assert!(!sim.is_initialized());
	}

	#[test]
	fn sequential_read_wraps_around() {
		let mut sim = started();
		let address = DeviceAddress::new(0x50).unwrap();
		sim.poke(0xffff, 0x11);
		sim.poke(0x0000, 0x22);
		sim.write(address, &[0xff, 0xff]).unwrap();
		let mut buf = [0u8; 2];
		sim.read(address, &mut buf).unwrap();
		assert_eq!(buf, [0x11, 0x22]);
	}

	#[test]
	fn other_address_is_not_acknowledged() {
		let mut sim = started();
		let other = DeviceAddress::new(0x51).unwrap();
		let err = sim.write(other, &[0x00, 0x00, 0x01]).unwrap_err();
		assert!(err.to_string().contains("no ACK"), "unexpected error: {}", err);
		assert_eq!(sim.peek(0), 0xff);
		assert_eq!(sim.transactions(), vec![Transaction::Write(other, vec![0x00, 0x00, 0x01])]);
	}

	#[test]
	fn busy_during_write_cycle() {
		let mut sim = SimulatedEeprom::default().with_write_cycle(Duration::from_secs(60));
		sim.begin().unwrap();
		let address = DeviceAddress::new(0x50).unwrap();
		sim.write(address, &[0x00, 0x10, 0x42]).unwrap();
		assert!(sim.write(address, &[0x00, 0x10]).is_err());
		assert_eq!(sim.peek(0x0010), 0x42);
	}

	#[test]
	fn write_protect_starts_no_write_cycle() {
		let mut sim = SimulatedEeprom::default().with_write_cycle(Duration::from_secs(60));
		sim.begin().unwrap();
		let mut pin = sim.protect_pin();
		assert!(pin.set_high(true).is_err(), "pin must be configured as output first");
		pin.make_output().unwrap();
		pin.set_high(true).unwrap();

		let address = DeviceAddress::new(0x50).unwrap();
		sim.write(address, &[0x00, 0x10, 0x42]).unwrap();
		// acknowledged right away again: nothing was programmed
		sim.write(address, &[0x00, 0x10]).unwrap();
		assert_eq!(sim.peek(0x0010), 0xff);
	}

	#[test]
	fn page_write_rejected() {
		let mut sim = started();
		let address = DeviceAddress::new(0x50).unwrap();
		assert!(sim.write(address, &[0x00, 0x00, 0x01, 0x02]).is_err());
		assert_eq!(sim.peek(0), 0xff);
	}
}
