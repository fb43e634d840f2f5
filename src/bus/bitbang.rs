//! Two-wire master driven by software over two GPIO lines.
//!
//! Both lines are open drain: setting a line "high" releases it (the pull-up
//! takes it high), setting it "low" actively drives it low. Clock stretching
//! by the slave is not supported.

use std::ops::{
	Deref,
	DerefMut,
};
use std::thread;
use std::time::{
	Duration,
	Instant,
};

use super::{
	DeviceAddress,
	TwoWire,
};

// half a clock period in standard mode (100 kHz)
const CLOCK_EDGE: Duration = Duration::from_micros(5);

// clock pulses needed to get a slave out of an interrupted byte
const RECOVERY_CLOCKS: usize = 9;

pub fn reliable_sleep(mut duration: Duration) {
	loop {
		let now = Instant::now();
		thread::sleep(duration);
		let elapsed = now.elapsed();
		if elapsed >= duration {
			return;
		}
		duration -= elapsed;
	}
}

pub trait Lines {
	fn set_scl(&mut self, high: bool);
	fn set_sda(&mut self, high: bool);
	fn read_sda(&mut self) -> bool;

	// delay for (at least) one clock edge
	fn delay(&mut self) {
		reliable_sleep(CLOCK_EDGE);
	}
}

trait LowLevel: Lines {
	// SDA falls while SCL is high; leaves SCL low
	fn start_condition(&mut self) {
		self.set_sda(true);
		self.set_scl(true);
		self.delay();
		self.set_sda(false);
		self.delay();
		self.set_scl(false);
		self.delay();
	}

	// SDA rises while SCL is high; leaves the bus idle
	fn stop_condition(&mut self) {
		self.set_sda(false);
		self.delay();
		self.set_scl(true);
		self.delay();
		self.set_sda(true);
		self.delay();
	}

	// change SDA only while SCL is low
	fn send_bit(&mut self, bit: bool) {
		self.set_sda(bit);
		self.delay();
		self.set_scl(true);
		self.delay();
		self.set_scl(false);
	}

	fn receive_bit(&mut self) -> bool {
		self.set_sda(true);
		self.delay();
		self.set_scl(true);
		self.delay();
		let bit = self.read_sda();
		self.set_scl(false);
		bit
	}

	// send byte starting with highest bit; returns whether the slave acknowledged
	fn send_byte(&mut self, byte: u8) -> bool {
		for bit in (0..8).rev() {
			self.send_bit(0 != byte & (1 << bit));
		}
		!self.receive_bit()
	}

	fn receive_byte(&mut self, ack: bool) -> u8 {
		let mut result = 0u8;
		for bit in (0..8).rev() {
			if self.receive_bit() {
				result |= 1 << bit;
			}
		}
		self.send_bit(!ack);
		result
	}
}

impl<L: Lines + ?Sized> LowLevel for L {
}

// emits STOP when dropped, also on error paths
struct Transaction<'a, L: ?Sized + Lines + 'a>(&'a mut L);

impl<'a, L: ?Sized + Lines> Transaction<'a, L> {
	fn start(lines: &'a mut L, address: DeviceAddress, address_byte: u8) -> crate::AResult<Self> {
		lines.start_condition();
		let mut tx = Transaction(lines);
		ensure!(tx.send_byte(address_byte), "no ACK for address {}", address);
		Ok(tx)
	}
}

impl<'a, L: ?Sized + Lines> Drop for Transaction<'a, L> {
	fn drop(&mut self) {
		self.0.stop_condition();
	}
}

impl<'a, L: ?Sized + Lines> Deref for Transaction<'a, L> {
	type Target = L;

	fn deref(&self) -> &Self::Target {
		&self.0
	}
}

impl<'a, L: ?Sized + Lines> DerefMut for Transaction<'a, L> {
	fn deref_mut(&mut self) -> &mut Self::Target {
		&mut self.0
	}
}

pub struct BitBang<L: Lines> {
	lines: L,
}

impl<L: Lines> BitBang<L> {
	pub fn new(lines: L) -> Self {
		BitBang { lines }
	}

	pub fn into_inner(self) -> L {
		self.lines
	}
}

impl<L: Lines> TwoWire for BitBang<L> {
	fn begin(&mut self) -> crate::AResult<()> {
		self.lines.set_scl(true);
		self.lines.set_sda(true);
		self.lines.delay();
		if self.lines.read_sda() {
			return Ok(());
		}

		// a slave still drives SDA from an interrupted transfer; clock it out
		warn!("SDA held low, trying bus recovery");
		for _ in 0..RECOVERY_CLOCKS {
			self.lines.set_scl(false);
			self.lines.delay();
			self.lines.set_scl(true);
			self.lines.delay();
			if self.lines.read_sda() {
				break;
			}
		}
		self.lines.stop_condition();
		ensure!(self.lines.read_sda(), "bus recovery failed: SDA still held low");
		Ok(())
	}

	fn end(&mut self) -> crate::AResult<()> {
		self.lines.set_scl(true);
		self.lines.set_sda(true);
		Ok(())
	}

	fn write(&mut self, address: DeviceAddress, data: &[u8]) -> crate::AResult<()> {
		let mut tx = Transaction::start(&mut self.lines, address, address.write_byte())?;
		for (i, b) in data.iter().enumerate() {
			ensure!(tx.send_byte(*b), "no ACK for data byte {} from {}", i, address);
		}
		Ok(())
	}

	fn read(&mut self, address: DeviceAddress, target: &mut [u8]) -> crate::AResult<()> {
		let len = target.len();
		let mut tx = Transaction::start(&mut self.lines, address, address.read_byte())?;
		for (i, t) in target.iter_mut().enumerate() {
			// master NACKs the last byte
			*t = tx.receive_byte(i + 1 < len);
		}
		Ok(())
	}
}

#[cfg(test)]
mod test {
	use std::collections::VecDeque;

	use super::{
		BitBang,
		Lines,
	};
	use crate::bus::{
		DeviceAddress,
		TwoWire,
	};

	#[derive(Clone, Copy, PartialEq, Eq, Debug)]
	enum Event {
		Start,
		Stop,
		Bit(bool),
	}

	// records what a bus analyzer would see for the master side
	struct Recorder {
		scl: bool,
		sda: bool,
		pending: Option<bool>,
		events: Vec<Event>,
		responses: VecDeque<bool>,
	}

	impl Recorder {
		fn new(responses: &[bool]) -> Self {
			Recorder {
				scl: true,
				sda: true,
				pending: None,
				events: Vec::new(),
				responses: responses.iter().cloned().collect(),
			}
		}
	}

	impl Lines for Recorder {
		fn set_scl(&mut self, high: bool) {
			if !self.scl && high {
				self.pending = Some(self.sda);
			} else if self.scl && !high {
				if let Some(bit) = self.pending.take() {
					self.events.push(Event::Bit(bit));
				}
			}
			self.scl = high;
		}

		fn set_sda(&mut self, high: bool) {
			if self.scl && self.sda != high {
				self.pending = None;
				self.events.push(if high { Event::Stop } else { Event::Start });
			}
			self.sda = high;
		}

		fn read_sda(&mut self) -> bool {
			// missing responses read as ACK (slave pulls low)
			self.responses.pop_front().unwrap_or(false)
		}

		fn delay(&mut self) {
		}
	}

	// split the bits between START and STOP into bytes, dropping the ACK slots
	fn decode_bytes(events: &[Event]) -> Vec<u8> {
		assert_eq!(events.first(), Some(&Event::Start), "transaction must begin with START: {:?}", events);
		assert_eq!(events.last(), Some(&Event::Stop), "transaction must end with STOP: {:?}", events);
		let bits: Vec<bool> = events[1..events.len() - 1].iter().map(|e| match *e {
			Event::Bit(b) => b,
			other => panic!("unexpected {:?} inside transaction", other),
		}).collect();
		assert_eq!(0, bits.len() % 9, "incomplete byte frame");
		bits.chunks(9).map(|frame| {
			frame[..8].iter().fold(0u8, |acc, &b| acc << 1 | (b as u8))
		}).collect()
	}

	fn bits_of(byte: u8) -> Vec<bool> {
		(0..8).rev().map(|bit| 0 != byte & (1 << bit)).collect()
	}

	#[test]
	fn write_frames_address_and_data() {
		let mut bus = BitBang::new(Recorder::new(&[]));
		bus.write(DeviceAddress::new(0x50).unwrap(), &[0x12, 0x34, 0xab]).unwrap();
		let rec = bus.into_inner();
		assert_eq!(decode_bytes(&rec.events), vec![0xa0, 0x12, 0x34, 0xab]);
	}

	#[test]
	fn address_nack_still_stops() {
		let mut bus = BitBang::new(Recorder::new(&[true]));
		let err = bus.write(DeviceAddress::new(0x51).unwrap(), &[0x00]).unwrap_err();
		assert!(err.to_string().contains("no ACK for address 0x51"), "unexpected error: {}", err);
		let rec = bus.into_inner();
		// only the address frame went out
		assert_eq!(decode_bytes(&rec.events), vec![0xa2]);
	}

	#[test]
	fn data_nack_aborts_transaction() {
		// ACK address, ACK first data byte, NACK the second
		let mut bus = BitBang::new(Recorder::new(&[false, false, true]));
		let err = bus.write(DeviceAddress::new(0x50).unwrap(), &[0x01, 0x02, 0x03]).unwrap_err();
		assert!(err.to_string().contains("no ACK for data byte 1"), "unexpected error: {}", err);
		let rec = bus.into_inner();
		assert_eq!(decode_bytes(&rec.events), vec![0xa0, 0x01, 0x02]);
	}

	#[test]
	fn read_single_byte_with_nack() {
		let mut responses = vec![false];
		responses.extend(bits_of(0xa5));
		let mut bus = BitBang::new(Recorder::new(&responses));
		let mut buf = [0u8; 1];
		bus.read(DeviceAddress::new(0x50).unwrap(), &mut buf).unwrap();
		assert_eq!(buf, [0xa5]);
		let rec = bus.into_inner();
		let n = rec.events.len();
		// master NACK (SDA released) right before STOP
		assert_eq!(&rec.events[n - 2..], &[Event::Bit(true), Event::Stop]);
		assert_eq!(decode_bytes(&rec.events)[0], 0xa1);
	}

	#[test]
	fn read_acks_all_but_last() {
		let mut responses = vec![false];
		responses.extend(bits_of(0x01));
		responses.extend(bits_of(0x02));
		let mut bus = BitBang::new(Recorder::new(&responses));
		let mut buf = [0u8; 2];
		bus.read(DeviceAddress::new(0x50).unwrap(), &mut buf).unwrap();
		assert_eq!(buf, [0x01, 0x02]);
		let rec = bus.into_inner();
		let bits: Vec<Event> = rec.events.iter().cloned().filter(|e| match *e {
			Event::Bit(_) => true,
			_ => false,
		}).collect();
		// slots 17 and 26: ACK after first data byte, NACK after second
		assert_eq!(bits[17], Event::Bit(false));
		assert_eq!(bits[26], Event::Bit(true));
	}

	#[test]
	fn begin_recovers_stuck_bus() {
		// SDA low at first, released after two recovery clocks, idle after STOP
		let mut bus = BitBang::new(Recorder::new(&[false, false, true, true]));
		bus.begin().unwrap();
	}

	#[test]
	fn begin_fails_on_dead_bus() {
		let mut bus = BitBang::new(Recorder::new(&[false; 16]));
		assert!(bus.begin().is_err());
	}
}
