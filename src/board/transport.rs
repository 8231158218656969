// Bus transport abstraction
//
// The board only speaks full-duplex SPI: whatever is clocked out, the same
// number of bytes is clocked back in. Platform code provides the real device;
// `SimulatedBoard` answers in-process for tests and bench runs.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use super::frame::{ACK, REPLY_HEADER_LEN};

/// Error types raised below the frame layer
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Transfer length mismatch: sent {sent} bytes, received {received}")]
    LengthMismatch { sent: usize, received: usize },

    #[error("Bus fault: {0}")]
    Bus(String),
}

/// One blocking full-duplex exchange of equal-length buffers
pub trait Transport: Send {
    fn exchange(&mut self, request: &[u8]) -> Result<Vec<u8>, TransportError>;
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn exchange(&mut self, request: &[u8]) -> Result<Vec<u8>, TransportError> {
        (**self).exchange(request)
    }
}

#[derive(Debug)]
struct SimState {
    replies: HashMap<u8, Vec<u8>>,
    requests: Vec<Vec<u8>>,
    ack: u8,
    fail_next: Option<String>,
}

/// In-process stand-in for the board
///
/// Every request is acknowledged and answered with the scripted reply for its
/// opcode (zero-filled or truncated to fit). Clones share state, so a test can
/// keep a handle to inspect traffic after moving the board into a driver.
#[derive(Debug, Clone)]
pub struct SimulatedBoard {
    state: Arc<Mutex<SimState>>,
}

impl Default for SimulatedBoard {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedBoard {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(SimState {
                replies: HashMap::new(),
                requests: Vec::new(),
                ack: ACK,
                fail_next: None,
            })),
        }
    }

    /// Script the reply bytes returned for `opcode`
    pub fn set_reply(&self, opcode: u8, reply: Vec<u8>) {
        self.state.lock().replies.insert(opcode, reply);
    }

    /// Override the acknowledgement byte written into replies
    pub fn set_ack(&self, ack: u8) {
        self.state.lock().ack = ack;
    }

    /// Make the next exchange fail with a bus fault
    pub fn fail_next(&self, reason: &str) {
        self.state.lock().fail_next = Some(reason.to_string());
    }

    /// Every request clocked out so far, oldest first
    pub fn requests(&self) -> Vec<Vec<u8>> {
        self.state.lock().requests.clone()
    }

    pub fn clear_requests(&self) {
        self.state.lock().requests.clear();
    }
}

impl Transport for SimulatedBoard {
    fn exchange(&mut self, request: &[u8]) -> Result<Vec<u8>, TransportError> {
        let mut state = self.state.lock();

        if let Some(reason) = state.fail_next.take() {
            return Err(TransportError::Bus(reason));
        }
        state.requests.push(request.to_vec());

        let mut response = vec![0u8; request.len()];
        if response.len() < REPLY_HEADER_LEN {
            return Ok(response);
        }
        response[3] = state.ack;

        if let Some(reply) = request.get(1).and_then(|opcode| state.replies.get(opcode)) {
            let body = &mut response[REPLY_HEADER_LEN..];
            let n = body.len().min(reply.len());
            body[..n].copy_from_slice(&reply[..n]);
        }

        Ok(response)
    }
}
