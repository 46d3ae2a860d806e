//! embassy-net adapters for the data and command channels
//!
//! Both sockets live for the whole process; a "session" is one connection
//! made on them. Reads and writes are polled exactly once, so they return
//! immediately whether or not the stack has room or data.

use core::task::Poll;

use embassy_futures::poll_once;
use embassy_net::tcp::{AcceptError, ConnectError, State, TcpSocket};
use embassy_net::{IpEndpoint, Stack};
use embassy_time::{Duration, with_timeout};

use crate::NetError;
use crate::command::Listener;
use crate::telemetry::Dial;

/// Outbound TCP client towards the collector
pub struct TcpDialer<'a> {
    stack: Stack<'a>,
    socket: TcpSocket<'a>,
    remote: IpEndpoint,
}

impl<'a> TcpDialer<'a> {
    pub fn new(
        stack: Stack<'a>,
        rx_buffer: &'a mut [u8],
        tx_buffer: &'a mut [u8],
        remote: IpEndpoint,
    ) -> Self {
        Self {
            stack,
            socket: TcpSocket::new(stack, rx_buffer, tx_buffer),
            remote,
        }
    }
}

impl Dial for TcpDialer<'_> {
    async fn connect(&mut self, timeout_ms: u32) -> Result<(), NetError> {
        if !self.stack.is_config_up() {
            return Err(NetError::Unreachable);
        }

        // A previous session may still be winding down
        self.socket.abort();

        let timeout = Duration::from_millis(u64::from(timeout_ms));
        match with_timeout(timeout, self.socket.connect(self.remote)).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(ConnectError::TimedOut)) | Err(_) => Err(NetError::TimedOut),
            Ok(Err(ConnectError::NoRoute)) => Err(NetError::Unreachable),
            Ok(Err(_)) => Err(NetError::Refused),
        }
    }

    fn set_keep_alive(&mut self, interval_ms: u32) -> Result<(), NetError> {
        self.socket
            .set_keep_alive(Some(Duration::from_millis(u64::from(interval_ms))));
        Ok(())
    }

    fn send(&mut self, bytes: &[u8]) -> Result<(), NetError> {
        if !self.socket.may_send() {
            return Err(NetError::Closed);
        }
        match poll_once(self.socket.write(bytes)) {
            Poll::Ready(Ok(written)) if written == bytes.len() => Ok(()),
            // Collector stopped draining the socket
            Poll::Ready(Ok(_)) | Poll::Pending => Err(NetError::WouldBlock),
            Poll::Ready(Err(_)) => Err(NetError::Reset),
        }
    }

    fn close(&mut self) {
        self.socket.abort();
    }
}

/// Listening socket for the single control connection
pub struct TcpCommandSocket<'a> {
    socket: TcpSocket<'a>,
    port: u16,
}

impl<'a> TcpCommandSocket<'a> {
    pub fn new(stack: Stack<'a>, rx_buffer: &'a mut [u8], tx_buffer: &'a mut [u8], port: u16) -> Self {
        Self {
            socket: TcpSocket::new(stack, rx_buffer, tx_buffer),
            port,
        }
    }
}

impl Listener for TcpCommandSocket<'_> {
    fn poll_accept(&mut self) -> Result<bool, NetError> {
        match self.socket.state() {
            State::Established | State::CloseWait => return Ok(true),
            // Handshake in flight; `accept` would reject the socket state
            State::SynReceived | State::SynSent => return Ok(false),
            State::Closed | State::Listen => {}
            // Previous connection still winding down
            _ => return Ok(false),
        }

        // Re-arming an already listening socket on the same port is a no-op
        match poll_once(self.socket.accept(self.port)) {
            Poll::Ready(Ok(())) => Ok(true),
            Poll::Pending => Ok(false),
            Poll::Ready(Err(AcceptError::InvalidState)) => Err(NetError::Closed),
            Poll::Ready(Err(_)) => Err(NetError::Refused),
        }
    }

    fn set_keep_alive(&mut self, interval_ms: u32) -> Result<(), NetError> {
        self.socket
            .set_keep_alive(Some(Duration::from_millis(u64::from(interval_ms))));
        Ok(())
    }

    fn recv(&mut self, buf: &mut [u8]) -> Result<usize, NetError> {
        if self.socket.state() == State::Established && !self.socket.can_recv() {
            return Err(NetError::WouldBlock);
        }
        match poll_once(self.socket.read(buf)) {
            Poll::Ready(Ok(len)) => Ok(len),
            Poll::Ready(Err(_)) => Err(NetError::Reset),
            Poll::Pending => Err(NetError::WouldBlock),
        }
    }

    fn close(&mut self) {
        self.socket.abort();
    }
}
