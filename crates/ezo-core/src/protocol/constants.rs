// I2C bus defaults
pub const DEFAULT_BUS: u8 = 1;
pub const DEFAULT_ADDRESS: u8 = 98; // 0x62
pub const MAX_ADDRESS: u8 = 127;

/// `I2C_SLAVE` request from `linux/i2c-dev.h`.
pub const I2C_SLAVE: u64 = 0x0703;

/// Bytes requested by a single I2C response read.
pub const I2C_READ_LEN: usize = 31;

// Terminators
pub const I2C_TERMINATOR: u8 = 0x00;
pub const SERIAL_TERMINATOR: u8 = b'\r';

// Settle times
pub const LONG_TIMEOUT_MS: u64 = 1500;
pub const SHORT_TIMEOUT_MS: u64 = 300;

pub const LONG_TIMEOUT_PREFIXES: &[&str] = &["R", "CAL"];
pub const SLEEP_PREFIXES: &[&str] = &["SLEEP"];

// Serial link
pub const DEFAULT_BAUD_RATE: u32 = 9600;
/// Overall wall-clock budget for one serial response line.
pub const SERIAL_READ_BUDGET_MS: u64 = 1000;
/// Per-call timeout of the underlying serial port read.
pub const SERIAL_POLL_TIMEOUT_MS: u64 = 50;

pub const FTDI_VENDOR_ID: u16 = 0x0403;

// Status bytes
pub const STATUS_SUCCESS: u8 = 1;
pub const STATUS_MALFORMED: u8 = 2;
pub const STATUS_PENDING: u8 = 254;
pub const STATUS_NO_DATA: u8 = 255;

// Serial response codes
pub const SERIAL_OK: &str = "*OK";
pub const SERIAL_ERROR: &str = "*ER";

/// Turns off continuous reading mode on UART-mode sensors.
pub const CONTINUOUS_OFF: &str = "C,0";
pub const READ_COMMAND: &str = "R";
pub const INFO_COMMAND: &str = "I";
