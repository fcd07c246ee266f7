//! Link management on top of the command dispatcher

use crate::core::constants::{
    ADVERTISE_CMD, ADVERTISE_RESPONSE_LEN, CONNECT_CMD_PREFIX, CONNECT_CONNECTED_RESPONSE,
    CONNECT_CONNECTION_ERROR_RESPONSE, CONNECT_GENERIC_ERROR_RESPONSE, CONNECT_RESPONSE_LEN,
    CONNECT_STARTING_RESPONSE, DEVICE_ADDRESS_LEN, DISCONNECT_CMD, DISCONNECT_RESPONSE_LEN,
    DISCONNECT_STATUS_RESPONSE, GET_DEVICE_ADDRESS_CMD, GET_DEVICE_ADDRESS_PREFIX,
    GET_DEVICE_ADDRESS_RESPONSE_LEN, STATUS_TERMINATOR, SUCCESS_RESPONSE,
};
use crate::core::types::{DeviceAddress, LinkState, Mode, ResponseBuffer};
use crate::hardware::{SerialTransport, Transport};
use crate::protocol::{BleError, BleResult, CancelToken, CommandDispatcher, Reply};
use crate::utils::config::{BleConfig, DriverConfig};
use tracing::{debug, info, warn};

/// What the module's final status after "Trying" means
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectOutcome {
    Connected,
    /// `%DISCONNECT%`: the link came up and dropped again
    LinkDropped,
    /// `ERR_CONN`: connection-layer failure
    ConnectionError,
    /// `ERR`: the module refused the command
    GenericError,
    Unrecognized,
}

/// Classify the final connect status by marker containment
///
/// `ERR_CONN` is checked before `ERR`, which it contains, and
/// `%DISCONNECT%` before `CONNECT` for the same reason.
pub fn classify_connect_reply(reply: &ResponseBuffer) -> ConnectOutcome {
    if reply.contains(DISCONNECT_STATUS_RESPONSE) {
        ConnectOutcome::LinkDropped
    } else if reply.contains(CONNECT_CONNECTED_RESPONSE) {
        ConnectOutcome::Connected
    } else if reply.contains(CONNECT_CONNECTION_ERROR_RESPONSE) {
        ConnectOutcome::ConnectionError
    } else if reply.contains(CONNECT_GENERIC_ERROR_RESPONSE) {
        ConnectOutcome::GenericError
    } else {
        ConnectOutcome::Unrecognized
    }
}

/// Handle to one radio module on one serial link
///
/// Owns the transport. Not reentrant: drive it from a single thread and
/// use [`BleLink::cancel_token`] to abort a blocked read from another.
pub struct BleLink<T: Transport> {
    dispatcher: CommandDispatcher<T>,
    link_state: LinkState,
    config: DriverConfig,
}

impl BleLink<SerialTransport> {
    /// Open the configured serial port and wrap it
    pub fn open(config: &BleConfig) -> BleResult<Self> {
        config.validate()?;
        let transport = SerialTransport::open(&config.serial)?;
        Ok(Self::new(transport, config.driver.clone()))
    }
}

impl<T: Transport> BleLink<T> {
    pub fn new(transport: T, config: DriverConfig) -> Self {
        Self {
            dispatcher: CommandDispatcher::new(transport, &config),
            link_state: LinkState::Disconnected,
            config,
        }
    }

    pub fn mode(&self) -> Mode {
        self.dispatcher.mode()
    }

    pub fn link_state(&self) -> LinkState {
        self.link_state
    }

    pub fn config(&self) -> &DriverConfig {
        &self.config
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.dispatcher.cancel_token()
    }

    /// Re-arm the cancel token after a cancelled operation
    pub fn reset_cancel(&self) {
        self.dispatcher.cancel_token().reset();
    }

    /// Direct access for commands this handle does not wrap
    pub fn dispatcher_mut(&mut self) -> &mut CommandDispatcher<T> {
        &mut self.dispatcher
    }

    pub fn transport(&self) -> &T {
        self.dispatcher.transport()
    }

    pub fn transport_mut(&mut self) -> &mut T {
        self.dispatcher.transport_mut()
    }

    pub fn into_transport(self) -> T {
        self.dispatcher.into_transport()
    }

    /// Put the module into advertisement mode
    pub fn start_advertising(&mut self) -> BleResult<()> {
        let reply = self
            .dispatcher
            .exec_fixed(ADVERTISE_CMD, ADVERTISE_RESPONSE_LEN)?;

        if reply.contains(SUCCESS_RESPONSE) {
            info!("Advertising started");
            Ok(())
        } else {
            warn!(reply = %reply.response().to_text(), "Advertising not acknowledged");
            Err(BleError::protocol("advertise", reply.bytes()))
        }
    }

    /// Query the module's address by position in the `D` reply
    ///
    /// Bytes 4..16 are returned whatever the first four contain; a reply
    /// without the `BTA=` label is only logged. Use
    /// [`BleLink::get_address_verified`] to reject such replies.
    pub fn get_address(&mut self) -> BleResult<DeviceAddress> {
        let reply = self.query_address()?;
        if !reply.bytes().starts_with(GET_DEVICE_ADDRESS_PREFIX.as_bytes()) {
            warn!(reply = %reply.response().to_text(), "Address reply lacks its label");
        }
        address_from_reply(&reply)
    }

    /// Query the module's address, requiring `BTA=` followed by 12 hex digits
    pub fn get_address_verified(&mut self) -> BleResult<DeviceAddress> {
        let reply = self.query_address()?;
        let address = address_from_reply(&reply)?;

        if !reply.bytes().starts_with(GET_DEVICE_ADDRESS_PREFIX.as_bytes()) || !address.is_hex() {
            return Err(BleError::protocol("get address", reply.bytes()));
        }
        Ok(address)
    }

    fn query_address(&mut self) -> BleResult<Reply> {
        let reply = self
            .dispatcher
            .exec_fixed(GET_DEVICE_ADDRESS_CMD, GET_DEVICE_ADDRESS_RESPONSE_LEN)?;
        debug!(reply = %reply.response().to_text(), "Address reply");
        Ok(reply)
    }

    /// Connect to the peer at `address`
    ///
    /// On success the module has already left command mode by itself, so
    /// no exit is sent. Every failure after the "Trying" notice exits
    /// command mode before returning.
    pub fn connect_to(&mut self, address: &DeviceAddress) -> BleResult<LinkState> {
        let address_text =
            std::str::from_utf8(address.as_bytes()).map_err(|_| BleError::InvalidAddress {
                reason: "address is not ASCII".to_string(),
            })?;
        let command = format!("{}{}\r", CONNECT_CMD_PREFIX, address_text);
        debug_assert_eq!(command.len(), CONNECT_CMD_PREFIX.len() + DEVICE_ADDRESS_LEN + 1);

        if let Err(err) = self.dispatcher.enter_command_mode() {
            warn!(error = %err, "Cannot connect without command mode");
            return Err(err);
        }
        self.link_state = LinkState::Connecting;
        info!(peer = %address, "Connecting");

        let status = match self.send_connect(&command) {
            Ok(status) => status,
            Err(err) => return Err(self.abandon_connect(err)),
        };

        if !status.contains(CONNECT_STARTING_RESPONSE) {
            warn!(status = %status.to_text(), "Connect attempt not started");
            self.link_state = LinkState::Disconnected;
            return Err(BleError::protocol("connect", status.as_bytes()));
        }

        let deadline = self.dispatcher.deadline_for(self.config.connect_timeout());
        let outcome = match self
            .dispatcher
            .framer_mut()
            .read_exact(CONNECT_RESPONSE_LEN, &deadline)
        {
            Ok(outcome) => outcome,
            Err(err) => return Err(self.abandon_connect(err.into())),
        };

        match classify_connect_reply(&outcome) {
            ConnectOutcome::Connected => {
                self.dispatcher.controller_mut().set_mode(Mode::Data);
                self.link_state = LinkState::Connected;
                info!(peer = %address, "Connected");
                Ok(LinkState::Connected)
            }
            ConnectOutcome::ConnectionError => {
                warn!(reply = %outcome.to_text(), "Connection error");
                self.exit_after_failed_connect();
                self.link_state = LinkState::ConnectionError;
                Err(BleError::ConnectionRejected {
                    reply: outcome.to_text(),
                })
            }
            other => {
                warn!(?other, reply = %outcome.to_text(), "Connect failed");
                self.exit_after_failed_connect();
                self.link_state = LinkState::Disconnected;
                Err(BleError::protocol("connect", outcome.as_bytes()))
            }
        }
    }

    fn send_connect(&mut self, command: &str) -> BleResult<ResponseBuffer> {
        self.dispatcher.framer_mut().flush()?;
        self.dispatcher.send_raw(command)?;
        let deadline = self.dispatcher.deadline_for(self.config.connect_timeout());
        Ok(self
            .dispatcher
            .framer_mut()
            .read_until(STATUS_TERMINATOR, &deadline)?)
    }

    fn abandon_connect(&mut self, err: BleError) -> BleError {
        warn!(error = %err, "Connect exchange failed");
        self.exit_after_failed_connect();
        self.link_state = LinkState::Disconnected;
        err
    }

    fn exit_after_failed_connect(&mut self) {
        if let Err(err) = self.dispatcher.exit_command_mode() {
            warn!(error = %err, "Could not leave command mode after connect failure");
        }
    }

    /// Drop the current link
    ///
    /// On failure the link state is re-read from the status line.
    pub fn disconnect(&mut self) -> BleResult<()> {
        info!("Disconnecting");
        let reply = match self
            .dispatcher
            .exec_fixed(DISCONNECT_CMD, DISCONNECT_RESPONSE_LEN)
        {
            Ok(reply) => reply,
            Err(err) => {
                self.refresh_link_state();
                return Err(err);
            }
        };

        if reply.contains(SUCCESS_RESPONSE) {
            self.link_state = LinkState::Disconnected;
            info!("Disconnected");
            Ok(())
        } else {
            warn!(reply = %reply.response().to_text(), "Disconnect refused");
            let state = self.refresh_link_state();
            debug!(%state, "Link state after failed disconnect");
            Err(BleError::protocol("disconnect", reply.bytes()))
        }
    }

    /// Connection-status signal, independent of command mode
    pub fn is_link_up(&mut self) -> bool {
        self.dispatcher.framer_mut().is_link_present()
    }

    /// Set the link state from the status signal alone
    pub fn refresh_link_state(&mut self) -> LinkState {
        self.link_state = if self.is_link_up() {
            LinkState::Connected
        } else {
            LinkState::Disconnected
        };
        self.link_state
    }

    /// Write raw payload bytes to the connected peer
    pub fn send_payload(&mut self, data: &[u8]) -> BleResult<()> {
        if !self.link_state.is_connected() {
            return Err(BleError::NotConnected {
                state: self.link_state,
            });
        }

        let deadline = self.dispatcher.deadline();
        self.dispatcher.framer_mut().write_all(data, &deadline)?;
        debug!(bytes = data.len(), "Payload sent");
        Ok(())
    }

    /// One read attempt; returns the number of bytes placed in `buf`, possibly 0
    pub fn receive_payload(&mut self, buf: &mut [u8]) -> BleResult<usize> {
        Ok(self.dispatcher.framer_mut().recv(buf)?)
    }
}

fn address_from_reply(reply: &Reply) -> BleResult<DeviceAddress> {
    let bytes = reply.bytes();
    let start = GET_DEVICE_ADDRESS_PREFIX.len();
    match bytes.get(start..start + DEVICE_ADDRESS_LEN) {
        Some(address) => DeviceAddress::try_from(address),
        None => Err(BleError::protocol("get address", bytes)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hardware::MockTransport;
    use std::time::Duration;

    const CONNECT_PEER: &str = "C,0,AABBCCDDEEFF\r";

    fn link(mock: MockTransport) -> BleLink<MockTransport> {
        BleLink::new(mock, DriverConfig::mock())
    }

    fn peer() -> DeviceAddress {
        "AABBCCDDEEFF".parse().unwrap()
    }

    fn connected_link() -> BleLink<MockTransport> {
        let mut mock = MockTransport::new();
        mock.expect_enter()
            .expect(CONNECT_PEER, "Trying\n%CONNECT%\r");
        let mut link = link(mock);
        link.connect_to(&peer()).unwrap();
        link.transport_mut().clear_sent();
        link
    }

    #[test]
    fn test_get_address_is_positional() {
        let mut mock = MockTransport::new();
        mock.expect_enter()
            .expect("D\r", "XXXXAABBCCDDEEFF")
            .expect_exit();
        let mut link = link(mock);

        let address = link.get_address().unwrap();
        assert_eq!(address.as_bytes(), b"AABBCCDDEEFF");
        assert_eq!(link.mode(), Mode::Data);
    }

    #[test]
    fn test_get_address_discards_trailing_lines_before_exit() {
        let mut mock = MockTransport::new();
        mock.expect_enter()
            .expect("D\r", "BTA=001122AABBCC\r\nName=PmodBLE\r\nConnected=no\r\n")
            .expect_exit();
        let mut link = link(mock);

        let address = link.get_address_verified().unwrap();
        assert_eq!(address.to_string(), "001122AABBCC");
        assert_eq!(link.transport().sent_text(), "$$$D\r---\r");
    }

    #[test]
    fn test_verified_address_rejects_missing_label() {
        let mut mock = MockTransport::new();
        mock.expect_enter()
            .expect("D\r", "XXXXAABBCCDDEEFF")
            .expect_exit();
        let mut link = link(mock);

        let err = link.get_address_verified().unwrap_err();
        assert!(matches!(
            err,
            BleError::ProtocolViolation { operation: "get address", .. }
        ));
    }

    #[test]
    fn test_verified_address_rejects_non_hex() {
        let mut mock = MockTransport::new();
        mock.expect_enter()
            .expect("D\r", "BTA=ERR\r\nCMD> \r\n")
            .expect_exit();
        let mut link = link(mock);

        assert!(link.get_address_verified().is_err());
    }

    #[test]
    fn test_connect_success_sends_no_exit() {
        let mut mock = MockTransport::new();
        mock.expect_enter()
            .expect(CONNECT_PEER, "Trying\n%CONNECT%\r");
        let mut link = link(mock);

        let state = link.connect_to(&peer()).unwrap();
        assert_eq!(state, LinkState::Connected);
        assert_eq!(link.link_state(), LinkState::Connected);
        assert_eq!(link.mode(), Mode::Data);
        assert_eq!(link.transport().sent_text(), format!("$$${}", CONNECT_PEER));
        assert_eq!(link.transport().sent_count("---\r"), 0);
    }

    #[test]
    fn test_connect_error_is_rejection_and_exits() {
        let mut mock = MockTransport::new();
        mock.expect_enter()
            .expect(CONNECT_PEER, "Trying\n%ERR_CONN%")
            .expect_exit();
        let mut link = link(mock);

        let err = link.connect_to(&peer()).unwrap_err();
        assert!(matches!(err, BleError::ConnectionRejected { .. }));
        assert_eq!(link.link_state(), LinkState::ConnectionError);
        assert_eq!(link.transport().sent_count("---\r"), 1);
        assert_eq!(link.mode(), Mode::Data);
    }

    #[test]
    fn test_connect_unrecognized_reply_is_protocol_violation() {
        let mut mock = MockTransport::new();
        mock.expect_enter()
            .expect(CONNECT_PEER, "Trying\n%BUSY_NOW%")
            .expect_exit();
        let mut link = link(mock);

        let err = link.connect_to(&peer()).unwrap_err();
        assert!(matches!(
            err,
            BleError::ProtocolViolation { operation: "connect", .. }
        ));
        assert_eq!(link.link_state(), LinkState::Disconnected);
        assert_eq!(link.transport().sent_count("---\r"), 1);
    }

    #[test]
    fn test_connect_generic_error_exits() {
        let mut mock = MockTransport::new();
        mock.expect_enter()
            .expect(CONNECT_PEER, "Trying\nERR\r\nCMD> ")
            .expect_exit();
        let mut link = link(mock);

        let err = link.connect_to(&peer()).unwrap_err();
        assert!(matches!(err, BleError::ProtocolViolation { .. }));
        assert_eq!(link.transport().sent_count("---\r"), 1);
    }

    #[test]
    fn test_connect_without_trying_skips_second_read() {
        let mut mock = MockTransport::new();
        mock.expect_enter()
            .expect(CONNECT_PEER, "ERR\n%CONNECT%\r");
        let mut link = link(mock);

        let err = link.connect_to(&peer()).unwrap_err();
        assert!(matches!(
            err,
            BleError::ProtocolViolation { operation: "connect", .. }
        ));
        // The would-be final status is still unread
        assert_eq!(link.transport().unread(), 10);
        assert_eq!(link.transport().sent_count("---\r"), 0);
        assert_eq!(link.link_state(), LinkState::Disconnected);
    }

    #[test]
    fn test_connect_fails_cleanly_when_command_mode_refused() {
        let mut mock = MockTransport::new();
        mock.expect("$$$", "CMD\r");
        let mut link = link(mock);

        let err = link.connect_to(&peer()).unwrap_err();
        assert!(matches!(err, BleError::ModeTransitionFailed { .. }));
        assert_eq!(link.link_state(), LinkState::Disconnected);
        assert_eq!(link.transport().sent(), b"$$$");
    }

    #[test]
    fn test_connect_timeout_on_final_status() {
        let mut mock = MockTransport::new();
        mock.expect_enter()
            .expect(CONNECT_PEER, "Trying\n%CONN")
            .expect_exit();
        let mut link = link(mock);

        let err = link.connect_to(&peer()).unwrap_err();
        assert!(err.is_timeout());
        assert_eq!(link.link_state(), LinkState::Disconnected);
        assert_eq!(link.transport().sent_count("---\r"), 1);
    }

    #[test]
    fn test_connect_rejects_non_ascii_address() {
        let mut link = link(MockTransport::new());
        let address = DeviceAddress::from_raw([0xFF; DEVICE_ADDRESS_LEN]);

        assert!(matches!(
            link.connect_to(&address),
            Err(BleError::InvalidAddress { .. })
        ));
        assert!(link.transport().sent().is_empty());
    }

    #[test]
    fn test_disconnect_success() {
        let mut link = connected_link();
        link.transport_mut()
            .expect_enter()
            .expect("K,1\r", "AOK")
            .expect_exit();

        link.disconnect().unwrap();
        assert_eq!(link.link_state(), LinkState::Disconnected);
        assert_eq!(link.transport().sent_text(), "$$$K,1\r---\r");
    }

    #[test]
    fn test_disconnect_when_already_disconnected_fails() {
        let mut mock = MockTransport::new();
        mock.expect_enter().expect("K,1\r", "ERR").expect_exit();
        let mut link = link(mock);

        let err = link.disconnect().unwrap_err();
        assert!(matches!(
            err,
            BleError::ProtocolViolation { operation: "disconnect", .. }
        ));
        assert_eq!(link.link_state(), LinkState::Disconnected);
    }

    #[test]
    fn test_failed_disconnect_requeries_link_status() {
        let mut link = connected_link();
        link.transport_mut().set_link_present(true);
        link.transport_mut()
            .expect_enter()
            .expect("K,1\r", "ERR")
            .expect_exit();

        assert!(link.disconnect().is_err());
        assert_eq!(link.link_state(), LinkState::Connected);

        link.transport_mut().set_link_present(false);
        assert_eq!(link.refresh_link_state(), LinkState::Disconnected);
    }

    #[test]
    fn test_is_link_up_bypasses_command_mode() {
        let mut link = link(MockTransport::new());
        assert!(!link.is_link_up());
        link.transport_mut().set_link_present(true);
        assert!(link.is_link_up());
        assert!(link.transport().sent().is_empty());
    }

    #[test]
    fn test_payload_requires_connection() {
        let mut link = link(MockTransport::new());
        let err = link.send_payload(b"X1").unwrap_err();
        assert!(matches!(
            err,
            BleError::NotConnected {
                state: LinkState::Disconnected
            }
        ));
        assert!(link.transport().sent().is_empty());
    }

    #[test]
    fn test_payload_is_sent_unframed() {
        let mut link = connected_link();
        link.transport_mut().refuse_next_sends(2);

        link.send_payload(b"move 4").unwrap();
        assert_eq!(link.transport().sent(), b"move 4");
    }

    #[test]
    fn test_receive_payload_single_attempt() {
        let mut link = connected_link();
        let mut buf = [0u8; 8];
        assert_eq!(link.receive_payload(&mut buf).unwrap(), 0);

        link.transport_mut().inject(b"move 7");
        let n = link.receive_payload(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"move 7");
    }

    #[test]
    fn test_start_advertising() {
        let mut mock = MockTransport::new();
        mock.expect_enter().expect("A\r", "AOK").expect_exit();
        let mut link = link(mock);
        assert!(link.start_advertising().is_ok());

        link.transport_mut()
            .expect_enter()
            .expect("A\r", "ERR")
            .expect_exit();
        assert!(matches!(
            link.start_advertising(),
            Err(BleError::ProtocolViolation { operation: "advertise", .. })
        ));
    }

    #[test]
    fn test_cancel_from_another_thread() {
        let config = DriverConfig {
            settle_delay_ms: 0,
            ..DriverConfig::unbounded()
        };
        let mut link = BleLink::new(MockTransport::new(), config);
        let token = link.cancel_token();

        let canceller = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(20));
            token.cancel();
        });

        let err = link.get_address().unwrap_err();
        canceller.join().unwrap();
        assert!(err.is_cancelled());

        link.reset_cancel();
        assert!(!link.cancel_token().is_cancelled());
    }

    #[test]
    fn test_connect_classification_priority() {
        let classify = |text: &str| classify_connect_reply(&ResponseBuffer::from(text.as_bytes().to_vec()));

        assert_eq!(classify("%CONNECT%\r"), ConnectOutcome::Connected);
        assert_eq!(classify("%ERR_CONN%"), ConnectOutcome::ConnectionError);
        assert_eq!(classify("ERR\r\nCMD> "), ConnectOutcome::GenericError);
        assert_eq!(classify("%DISCONNECT%"), ConnectOutcome::LinkDropped);
        assert_eq!(classify("%REBOOT%\r\n"), ConnectOutcome::Unrecognized);
    }
}
