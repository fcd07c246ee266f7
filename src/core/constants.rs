//! Wire grammar of the radio module's command language

/// Escape sequence that asks the module to enter command mode (no terminator)
pub const ENTER_CMD_MODE_CMD: &str = "$$$";
/// Number of reply bytes captured after the escape sequence
pub const ENTER_CMD_MODE_RESPONSE_LEN: usize = 4;
/// Marker that must appear somewhere in the enter reply
pub const ENTER_CMD_MODE_ENABLED_RESPONSE: &str = "CMD>";

/// Leave command mode
pub const EXIT_CMD_MODE_CMD: &str = "---\r";
/// Exact acknowledgment to the exit command, terminator stripped
pub const EXIT_CMD_MODE_RESPONSE: &str = "END";

/// Query the module's own address
pub const GET_DEVICE_ADDRESS_CMD: &str = "D\r";
pub const GET_DEVICE_ADDRESS_RESPONSE_LEN: usize = 16;
/// Label preceding the address in the `D` reply
pub const GET_DEVICE_ADDRESS_PREFIX: &str = "BTA=";

/// Connect prefix; followed by the 12-character peer address and `\r`
pub const CONNECT_CMD_PREFIX: &str = "C,0,";
/// Size of the final status read that follows the "Trying" notice
pub const CONNECT_RESPONSE_LEN: usize = 10;
pub const CONNECT_STARTING_RESPONSE: &str = "Trying";
pub const CONNECT_CONNECTED_RESPONSE: &str = "CONNECT";
pub const CONNECT_GENERIC_ERROR_RESPONSE: &str = "ERR";
pub const CONNECT_CONNECTION_ERROR_RESPONSE: &str = "ERR_CONN";

/// Disconnect the current link
pub const DISCONNECT_CMD: &str = "K,1\r";
pub const DISCONNECT_RESPONSE_LEN: usize = 3;
/// Asynchronous status line the module emits when a link drops
pub const DISCONNECT_STATUS_RESPONSE: &str = "%DISCONNECT%";

/// Start advertising
pub const ADVERTISE_CMD: &str = "A\r";
pub const ADVERTISE_RESPONSE_LEN: usize = 3;

/// Generic success acknowledgment
pub const SUCCESS_RESPONSE: &str = "AOK";

/// Terminator of ordinary command replies
pub const COMMAND_TERMINATOR: u8 = b'\r';
/// Terminator of asynchronous status lines
pub const STATUS_TERMINATOR: u8 = b'\n';

/// Length of a module address in ASCII hex characters
pub const DEVICE_ADDRESS_LEN: usize = 12;

/// Quiet time before the escape sequence (milliseconds)
pub const DEFAULT_SETTLE_DELAY_MS: u64 = 100;
/// Bytes drained by a single flush
pub const DEFAULT_FLUSH_CAPACITY: usize = 128;
/// Largest reply a delimiter-terminated read accumulates
pub const DEFAULT_MAX_RESPONSE_LEN: usize = 64;
pub const DEFAULT_BAUD_RATE: u32 = 115_200;
