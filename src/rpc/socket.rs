//! TCP call layer: one connection per remote procedure call.
//!
//! Frames are a 4-byte big-endian length prefix followed by one bencoded
//! message. The connection is scoped to a single request/response pair and
//! dropped on every exit path.

use std::io::{ErrorKind, Read, Write};
use std::net::{SocketAddr, TcpStream};
use std::time::Duration;

use tracing::trace;

use crate::common::{Id, Message};
use crate::Error;

/// Default timeout for connect, send and receive of one call.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_millis(2000);

/// Largest frame body accepted before reading it.
pub(crate) const MAX_MESSAGE_SIZE: usize = 64 * 1024;

#[derive(thiserror::Error, Debug)]
pub(crate) enum SocketError {
    #[error(transparent)]
    /// Connection-level failure: refused, reset, timed out, or closed
    /// before a full frame arrived.
    IO(#[from] std::io::Error),

    /// Frame declared a body of an unacceptable size.
    #[error("invalid message length {0}")]
    BadLength(usize),

    /// A complete frame arrived but its body is not a valid message.
    #[error("malformed message: {0}")]
    Malformed(String),
}

/// Reads exactly one length-prefixed message.
pub(crate) fn read_message(stream: &mut TcpStream) -> Result<Message, SocketError> {
    let mut len_buf = [0u8; 4];
    stream.read_exact(&mut len_buf)?;

    let len = u32::from_be_bytes(len_buf) as usize;
    if len == 0 || len > MAX_MESSAGE_SIZE {
        return Err(SocketError::BadLength(len));
    }

    let mut buf = vec![0u8; len];
    stream.read_exact(&mut buf).map_err(|e| {
        if e.kind() == ErrorKind::UnexpectedEof {
            SocketError::Malformed(format!("truncated body, expected {len} bytes"))
        } else {
            SocketError::IO(e)
        }
    })?;

    Message::from_bytes(&buf).map_err(|e| SocketError::Malformed(e.to_string()))
}

/// Writes one length-prefixed message.
pub(crate) fn write_message(stream: &mut TcpStream, message: &Message) -> Result<(), SocketError> {
    let bytes = message
        .to_bytes()
        .map_err(|e| SocketError::Malformed(e.to_string()))?;
    if bytes.len() > MAX_MESSAGE_SIZE {
        return Err(SocketError::BadLength(bytes.len()));
    }

    stream.write_all(&(bytes.len() as u32).to_be_bytes())?;
    stream.write_all(&bytes)?;
    stream.flush()?;

    Ok(())
}

/// Performs one complete call: connect, send the request, read exactly one
/// response.
///
/// Every failure is mapped onto the crate taxonomy: resolution and
/// connection failures are `RemoteUnavailable`, truncated or undecodable
/// responses are `Protocol`.
pub(crate) fn call(
    target: Id,
    address: SocketAddr,
    request: &Message,
    timeout: Duration,
) -> crate::Result<Message> {
    let mut stream = TcpStream::connect_timeout(&address, timeout)
        .map_err(|source| Error::RemoteUnavailable { target, source })?;
    stream
        .set_read_timeout(Some(timeout))
        .and_then(|_| stream.set_write_timeout(Some(timeout)))
        .map_err(|source| Error::RemoteUnavailable { target, source })?;
    let _ = stream.set_nodelay(true);

    trace!(context = "socket_message_sending", request = ?request, %address, "Sending request");

    write_message(&mut stream, request).map_err(|e| match e {
        SocketError::IO(source) => Error::RemoteUnavailable { target, source },
        other => Error::Protocol(other.to_string()),
    })?;

    let response = read_message(&mut stream).map_err(|e| match e {
        SocketError::IO(source) => Error::RemoteUnavailable { target, source },
        other => Error::Protocol(other.to_string()),
    })?;

    trace!(context = "socket_message_receiving", response = ?response, %address, "Received response");

    Ok(response)
}

#[cfg(test)]
mod test {
    use std::net::TcpListener;
    use std::thread;
    use std::time::Instant;

    use crate::common::{
        RequestSpecific, RequestTypeSpecific, ResponseSpecific, ResponseTypeSpecific,
    };

    use super::*;

    fn successor_request(requester_id: Id) -> Message {
        Message::Request(RequestSpecific {
            requester_id,
            request_type: RequestTypeSpecific::Successor,
        })
    }

    #[test]
    fn call_exchanges_one_message_pair() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let address = listener.local_addr().unwrap();

        let server_thread = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let message = read_message(&mut stream).unwrap();
            assert_eq!(message, successor_request(7));

            let response = Message::Response(ResponseSpecific {
                responder_id: 3,
                response_type: ResponseTypeSpecific::Node { node: 0 },
            });
            write_message(&mut stream, &response).unwrap();
        });

        let response = call(3, address, &successor_request(7), DEFAULT_REQUEST_TIMEOUT).unwrap();

        assert_eq!(
            response,
            Message::Response(ResponseSpecific {
                responder_id: 3,
                response_type: ResponseTypeSpecific::Node { node: 0 },
            })
        );

        server_thread.join().unwrap();
    }

    #[test]
    fn nothing_listening_is_remote_unavailable() {
        // Bind then drop to get a port with nothing behind it.
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let address = listener.local_addr().unwrap();
        drop(listener);

        let started = Instant::now();
        let result = call(
            5,
            address,
            &successor_request(0),
            Duration::from_millis(500),
        );

        assert!(matches!(
            result,
            Err(Error::RemoteUnavailable { target: 5, .. })
        ));
        assert!(started.elapsed() < Duration::from_secs(5), "must not hang");
    }

    #[test]
    fn oversized_frame_is_protocol_error() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let address = listener.local_addr().unwrap();

        let server_thread = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let _ = read_message(&mut stream);
            stream
                .write_all(&((MAX_MESSAGE_SIZE + 1) as u32).to_be_bytes())
                .unwrap();
        });

        let result = call(1, address, &successor_request(0), DEFAULT_REQUEST_TIMEOUT);
        assert!(matches!(result, Err(Error::Protocol(_))));

        server_thread.join().unwrap();
    }

    #[test]
    fn truncated_body_is_protocol_error() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let address = listener.local_addr().unwrap();

        let server_thread = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let _ = read_message(&mut stream);
            // Promise 100 bytes, deliver 5, hang up.
            stream.write_all(&100u32.to_be_bytes()).unwrap();
            stream.write_all(b"d1:ad").unwrap();
        });

        let result = call(1, address, &successor_request(0), DEFAULT_REQUEST_TIMEOUT);
        assert!(matches!(result, Err(Error::Protocol(_))));

        server_thread.join().unwrap();
    }

    #[test]
    fn garbage_body_is_protocol_error() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let address = listener.local_addr().unwrap();

        let server_thread = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let _ = read_message(&mut stream);
            stream.write_all(&7u32.to_be_bytes()).unwrap();
            stream.write_all(b"garbage").unwrap();
        });

        let result = call(1, address, &successor_request(0), DEFAULT_REQUEST_TIMEOUT);
        assert!(matches!(result, Err(Error::Protocol(_))));

        server_thread.join().unwrap();
    }
}
