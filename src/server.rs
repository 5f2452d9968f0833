//! Listener loop answering incoming remote calls with the node's state.
//!
//! One thread polls the nonblocking listener; each accepted connection is
//! served on its own thread, so a node can answer queries while one of its
//! own lookups is blocked on a peer.

use std::io::ErrorKind;
use std::net::{TcpListener, TcpStream};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use flume::{Receiver, TryRecvError};
use tracing::{debug, trace};

use crate::common::{ErrorSpecific, Message, ResponseSpecific};
use crate::rpc::socket::{read_message, write_message};
use crate::rpc::Rpc;
use crate::Error;

/// The maximum duration to back off checking the listener after it had
/// nothing for us. Lower values increase CPU usage but reduce latency.
const MAX_THREAD_BLOCK_DURATION: Duration = Duration::from_millis(10);

/// Error codes carried by wire error messages.
pub(crate) const ERROR_CODE_GENERIC: i32 = 201;
pub(crate) const ERROR_CODE_PROTOCOL: i32 = 203;

/// Runs until the shutdown channel fires or every sender is dropped.
pub(crate) fn run(rpc: Arc<Rpc>, listener: TcpListener, shutdown: Receiver<()>) {
    loop {
        match shutdown.try_recv() {
            Err(TryRecvError::Empty) => {}
            Ok(()) | Err(TryRecvError::Disconnected) => break,
        }

        match listener.accept() {
            Ok((stream, from)) => {
                trace!(context = "incoming_connection", %from);
                let rpc = rpc.clone();
                thread::spawn(move || handle_connection(&rpc, stream));
            }
            Err(e) if e.kind() == ErrorKind::WouldBlock => {
                thread::sleep(MAX_THREAD_BLOCK_DURATION);
            }
            Err(e) => {
                debug!(?e, "accept failed unexpectedly");
            }
        }
    }
}

/// Serves one connection: read one request, answer it, hang up.
fn handle_connection(rpc: &Rpc, mut stream: TcpStream) {
    let timeout = Some(rpc.request_timeout());
    if stream
        .set_read_timeout(timeout)
        .and_then(|_| stream.set_write_timeout(timeout))
        .is_err()
    {
        return;
    }

    let response = match read_message(&mut stream) {
        Ok(Message::Request(request)) => match rpc.handle_request(&request) {
            Ok(response_type) => Message::Response(ResponseSpecific {
                responder_id: rpc.id(),
                response_type,
            }),
            Err(e) => {
                debug!(?e, "request handler failed");
                Message::Error(error_for(&e))
            }
        },
        Ok(message) => {
            debug!(?message, "expected a request");
            Message::Error(ErrorSpecific {
                code: ERROR_CODE_PROTOCOL,
                description: "expected a request".to_string(),
            })
        }
        Err(e) => {
            debug!(?e, "could not read request");
            Message::Error(ErrorSpecific {
                code: ERROR_CODE_PROTOCOL,
                description: e.to_string(),
            })
        }
    };

    if let Err(e) = write_message(&mut stream, &response) {
        debug!(?e, "could not write response");
    }
}

fn error_for(error: &Error) -> ErrorSpecific {
    let code = match error {
        Error::Protocol(_) | Error::InvalidArgument(_) => ERROR_CODE_PROTOCOL,
        _ => ERROR_CODE_GENERIC,
    };

    ErrorSpecific {
        code,
        description: error.to_string(),
    }
}
