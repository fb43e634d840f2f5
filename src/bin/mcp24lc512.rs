#[macro_use]
extern crate clap;
#[macro_use]
extern crate failure;
#[macro_use]
extern crate log;

use mcp24lc512::*;
use mcp24lc512::bus::{
	DeviceAddress,
	TwoWire,
	bitbang::reliable_sleep,
};
use mcp24lc512::gpio::{
	OutputPin,
	PinNumber,
};
use mcp24lc512::sim::SimulatedEeprom;

use std::num::ParseIntError;
use std::process::exit;
use std::time::Duration;

type Hardware = (Box<dyn TwoWire>, Option<Box<dyn OutputPin>>);

fn get_param<T>(matches: &clap::ArgMatches, name: &str, default: &str) -> AResult<T>
where
	T: std::str::FromStr,
	failure::Error: From<<T as std::str::FromStr>::Err>,
{
	let param = matches.value_of(name).unwrap_or(default);
	param.parse::<T>().map_err(|e| {
		let e = failure::Error::from(e);
		let msg = format!("invalid parameter {}: {}", name, e);
		e.context(msg).into()
	})
}

fn get_number<T>(matches: &clap::ArgMatches, name: &str, from_str_radix: fn(&str, u32) -> Result<T, ParseIntError>) -> AResult<T> {
	let param = match matches.value_of(name) {
		Some(p) => p,
		None => bail!("missing parameter {}", name),
	};
	parse_number(param, from_str_radix)
}

#[cfg(any(target_os = "linux", target_os = "android"))]
fn open_hardware(matches: &clap::ArgMatches, wp: PinNumber) -> AResult<Hardware> {
	let path = matches.value_of("bus").unwrap_or("/dev/i2c-1");
	let bus = bus::linux::LinuxI2c::open(path)?;
	let pin = match wp.get() {
		None => None,
		Some(n) => Some(Box::new(gpio::SysfsPin::open(n)?) as Box<dyn OutputPin>),
	};
	Ok((Box::new(bus), pin))
}

#[cfg(not(any(target_os = "linux", target_os = "android")))]
fn open_hardware(_matches: &clap::ArgMatches, _wp: PinNumber) -> AResult<Hardware> {
	bail!("hardware access is only implemented for linux, try --simulate")
}

fn open(matches: &clap::ArgMatches, address: DeviceAddress) -> AResult<Hardware> {
	let wp: PinNumber = get_param(matches, "wp", "none")?;
	if matches.is_present("simulate") {
		let sim = SimulatedEeprom::new(address);
		let pin = wp.get().map(|_| Box::new(sim.protect_pin()) as Box<dyn OutputPin>);
		return Ok((Box::new(sim), pin));
	}
	open_hardware(matches, wp)
}

fn main_app() -> AResult<()> {
	let matches = clap_app!(@app (app_from_crate!())
		(@setting SubcommandRequiredElseHelp)
		(global_setting: clap::AppSettings::VersionlessSubcommands)
		(@arg bus: -b --bus +takes_value "i2c adapter the EEPROM is connected to (default: /dev/i2c-1)")
		(@arg address: -a --address +takes_value "device address (default: 0x50)")
		(@arg wp: -w --wp +takes_value "GPIO number connected to WP (default: none)")
		(@arg delay: -d --delay +takes_value "milliseconds to wait after a write (default: 5)")
		(@arg simulate: --simulate "use a simulated (empty) device instead of real hardware")
		(@subcommand read =>
			(about: "read a byte")
			(@arg ADDRESS: +required "memory address (0 - 0xffff)")
		)
		(@subcommand write =>
			(about: "write a byte")
			(@arg verify: --verify "read the byte back and compare")
			(@arg ADDRESS: +required "memory address (0 - 0xffff)")
			(@arg DATA: +required "byte to store")
		)
		(@subcommand protect =>
			(about: "enable or disable the hardware write protection")
			(@arg STATE: +required "on or off")
		)
	).get_matches();

	let address: DeviceAddress = get_param(&matches, "address", "0x50")?;
	let delay_ms: u64 = get_param(&matches, "delay", "5")?;
	let config = Config {
		address,
		// the caller waits (see below), so the tool also reports the write itself
		write_delay: None,
	};

	let (mut bus, pin) = open(&matches, address)?;
	let mut eeprom = Mcp24lc512::begin(&mut bus, config, pin)?;

	let result = (|| -> AResult<()> {
		match matches.subcommand() {
			("read", Some(sub_m)) => {
				let mem: u16 = get_number(sub_m, "ADDRESS", u16::from_str_radix)?;
				let data = eeprom.try_read(mem)?;
				println!("@{:04x}: {:02x}", mem, data);
				Ok(())
			},
			("write", Some(sub_m)) => {
				let mem: u16 = get_number(sub_m, "ADDRESS", u16::from_str_radix)?;
				let data: u8 = get_number(sub_m, "DATA", u8::from_str_radix)?;
				eeprom.write(mem, data)?;
				info!("wrote {:02x} @{:04x}", data, mem);
				// device doesn't answer until the write cycle is done
				reliable_sleep(Duration::from_millis(delay_ms));
				if sub_m.is_present("verify") {
					let stored = eeprom.try_read(mem)?;
					ensure!(stored == data, "Verify failed at {:04x}: expected {:02x}, EEPROM has {:02x}", mem, data, stored);
					info!("verified @{:04x}", mem);
				}
				Ok(())
			},
			("protect", Some(sub_m)) => {
				let enabled = match sub_m.value_of("STATE") {
					Some("on") => true,
					Some("off") => false,
					other => bail!("invalid write protect state {:?} (expected on or off)", other),
				};
				if !eeprom.has_write_protect() {
					warn!("no WP pin given (--wp), can't change write protection");
				}
				eeprom.set_write_protect(enabled)
			},
			("", _) => bail!("no subcommand"),
			(cmd, _) => bail!("not implemented subcommand {:?}", cmd),
		}
	})();

	// release the bus even if the command failed
	let end = eeprom.end();
	result?;
	end
}

fn main() {
	env_logger::from_env(env_logger::Env::default().default_filter_or("info")).init();

	if let Err(e) = main_app() {
		error!("Error: {}", e);
		exit(1);
	}
}
