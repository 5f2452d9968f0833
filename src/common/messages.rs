//! Serialize and deserialize remote-call messages.

mod internal;

use bytes::Bytes;
use serde_bytes::ByteBuf;

use crate::common::Id;
use crate::{Error, Result};

use internal::*;

/// One wire message: a request, a response, or an error.
///
/// The transport carries exactly one request and one response per
/// connection, so no transaction correlation is needed.
#[derive(Debug, PartialEq, Clone)]
pub enum Message {
    Request(RequestSpecific),
    Response(ResponseSpecific),
    Error(ErrorSpecific),
}

#[derive(Debug, PartialEq, Clone)]
pub struct RequestSpecific {
    pub requester_id: Id,
    pub request_type: RequestTypeSpecific,
}

#[derive(Debug, PartialEq, Clone)]
pub enum RequestTypeSpecific {
    /// `successor`: the responder's immediate successor.
    Successor,
    /// `predecessor`: the responder's predecessor, if it knows one.
    Predecessor,
    /// `closest_preceding_finger`: the responder's furthest finger that
    /// still strictly precedes `target`.
    ClosestPrecedingFinger { target: Id },
    /// `get_value`: fetch `key` from wherever it lives on the ring.
    GetValue { key: Id },
    /// `put_value`: store `value` under `key` on its owner.
    PutValue { key: Id, value: Bytes },
}

#[derive(Debug, PartialEq, Clone)]
pub struct ResponseSpecific {
    pub responder_id: Id,
    pub response_type: ResponseTypeSpecific,
}

#[derive(Debug, PartialEq, Clone)]
pub enum ResponseTypeSpecific {
    Node { node: Id },
    Predecessor { node: Option<Id> },
    Value { value: Option<Bytes> },
    Stored,
}

#[derive(Debug, PartialEq, Clone)]
pub struct ErrorSpecific {
    pub code: i32,
    pub description: String,
}

impl Message {
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        self.to_internal()?
            .to_bytes()
            .map_err(|e| Error::Protocol(format!("failed to encode message: {e}")))
    }

    pub fn from_bytes<T: AsRef<[u8]>>(bytes: T) -> Result<Message> {
        let internal = RpcMessage::from_bytes(bytes.as_ref())
            .map_err(|e| Error::Protocol(format!("failed to decode message: {e}")))?;
        Message::from_internal(internal)
    }

    // === Private Methods ===

    fn to_internal(&self) -> Result<RpcMessage> {
        Ok(match self {
            Message::Request(request) => {
                let id = id_to_wire(request.requester_id)?;

                RpcMessage::Request(match &request.request_type {
                    RequestTypeSpecific::Successor => RpcRequestSpecific::Successor {
                        arguments: RpcNoArguments { id },
                    },
                    RequestTypeSpecific::Predecessor => RpcRequestSpecific::Predecessor {
                        arguments: RpcNoArguments { id },
                    },
                    RequestTypeSpecific::ClosestPrecedingFinger { target } => {
                        RpcRequestSpecific::ClosestPrecedingFinger {
                            arguments: RpcTargetArguments {
                                id,
                                target: id_to_wire(*target)?,
                            },
                        }
                    }
                    RequestTypeSpecific::GetValue { key } => RpcRequestSpecific::GetValue {
                        arguments: RpcKeyArguments {
                            id,
                            key: id_to_wire(*key)?,
                        },
                    },
                    RequestTypeSpecific::PutValue { key, value } => RpcRequestSpecific::PutValue {
                        arguments: RpcPutValueArguments {
                            id,
                            key: id_to_wire(*key)?,
                            value: ByteBuf::from(value.to_vec()),
                        },
                    },
                })
            }
            Message::Response(response) => {
                let id = id_to_wire(response.responder_id)?;

                RpcMessage::Response(match &response.response_type {
                    ResponseTypeSpecific::Node { node } => RpcResponseSpecific::Node {
                        arguments: RpcNodeResponseArguments {
                            id,
                            node: id_to_wire(*node)?,
                        },
                    },
                    ResponseTypeSpecific::Predecessor { node } => RpcResponseSpecific::Predecessor {
                        arguments: RpcPredecessorResponseArguments {
                            id,
                            node: node.map(id_to_wire).transpose()?,
                        },
                    },
                    ResponseTypeSpecific::Value { value } => RpcResponseSpecific::Value {
                        arguments: RpcValueResponseArguments {
                            id,
                            value: value.as_ref().map(|v| ByteBuf::from(v.to_vec())),
                        },
                    },
                    ResponseTypeSpecific::Stored => RpcResponseSpecific::Stored {
                        arguments: RpcNoArguments { id },
                    },
                })
            }
            Message::Error(error) => RpcMessage::Error(RpcErrorSpecific {
                error_info: (error.code, error.description.clone()),
            }),
        })
    }

    fn from_internal(internal: RpcMessage) -> Result<Message> {
        Ok(match internal {
            RpcMessage::Request(request) => Message::Request(match request {
                RpcRequestSpecific::Successor { arguments } => RequestSpecific {
                    requester_id: id_from_wire(arguments.id)?,
                    request_type: RequestTypeSpecific::Successor,
                },
                RpcRequestSpecific::Predecessor { arguments } => RequestSpecific {
                    requester_id: id_from_wire(arguments.id)?,
                    request_type: RequestTypeSpecific::Predecessor,
                },
                RpcRequestSpecific::ClosestPrecedingFinger { arguments } => RequestSpecific {
                    requester_id: id_from_wire(arguments.id)?,
                    request_type: RequestTypeSpecific::ClosestPrecedingFinger {
                        target: id_from_wire(arguments.target)?,
                    },
                },
                RpcRequestSpecific::GetValue { arguments } => RequestSpecific {
                    requester_id: id_from_wire(arguments.id)?,
                    request_type: RequestTypeSpecific::GetValue {
                        key: id_from_wire(arguments.key)?,
                    },
                },
                RpcRequestSpecific::PutValue { arguments } => RequestSpecific {
                    requester_id: id_from_wire(arguments.id)?,
                    request_type: RequestTypeSpecific::PutValue {
                        key: id_from_wire(arguments.key)?,
                        value: Bytes::from(arguments.value.into_vec()),
                    },
                },
            }),
            RpcMessage::Response(response) => Message::Response(match response {
                RpcResponseSpecific::Node { arguments } => ResponseSpecific {
                    responder_id: id_from_wire(arguments.id)?,
                    response_type: ResponseTypeSpecific::Node {
                        node: id_from_wire(arguments.node)?,
                    },
                },
                RpcResponseSpecific::Predecessor { arguments } => ResponseSpecific {
                    responder_id: id_from_wire(arguments.id)?,
                    response_type: ResponseTypeSpecific::Predecessor {
                        node: arguments.node.map(id_from_wire).transpose()?,
                    },
                },
                RpcResponseSpecific::Value { arguments } => ResponseSpecific {
                    responder_id: id_from_wire(arguments.id)?,
                    response_type: ResponseTypeSpecific::Value {
                        value: arguments.value.map(|v| Bytes::from(v.into_vec())),
                    },
                },
                RpcResponseSpecific::Stored { arguments } => ResponseSpecific {
                    responder_id: id_from_wire(arguments.id)?,
                    response_type: ResponseTypeSpecific::Stored,
                },
            }),
            RpcMessage::Error(error) => Message::Error(ErrorSpecific {
                code: error.error_info.0,
                description: error.error_info.1,
            }),
        })
    }
}

fn id_to_wire(id: Id) -> Result<i64> {
    i64::try_from(id).map_err(|_| Error::Protocol(format!("id {id} exceeds the wire integer range")))
}

fn id_from_wire(id: i64) -> Result<Id> {
    Id::try_from(id).map_err(|_| Error::Protocol(format!("negative id {id} on the wire")))
}

#[cfg(test)]
mod test {
    use super::*;

    fn roundtrip(message: Message) -> Message {
        Message::from_bytes(message.to_bytes().unwrap()).unwrap()
    }

    #[test]
    fn request_successor() {
        let message = Message::Request(RequestSpecific {
            requester_id: 3,
            request_type: RequestTypeSpecific::Successor,
        });
        assert_eq!(roundtrip(message.clone()), message);
    }

    #[test]
    fn request_closest_preceding_finger() {
        let message = Message::Request(RequestSpecific {
            requester_id: 0,
            request_type: RequestTypeSpecific::ClosestPrecedingFinger { target: 7 },
        });
        assert_eq!(roundtrip(message.clone()), message);
    }

    #[test]
    fn request_put_value() {
        let message = Message::Request(RequestSpecific {
            requester_id: 1,
            request_type: RequestTypeSpecific::PutValue {
                key: 6,
                value: Bytes::from_static(b"opaque payload"),
            },
        });
        assert_eq!(roundtrip(message.clone()), message);
    }

    #[test]
    fn response_predecessor_is_nullable() {
        let absent = Message::Response(ResponseSpecific {
            responder_id: 5,
            response_type: ResponseTypeSpecific::Predecessor { node: None },
        });
        assert_eq!(roundtrip(absent.clone()), absent);

        let present = Message::Response(ResponseSpecific {
            responder_id: 5,
            response_type: ResponseTypeSpecific::Predecessor { node: Some(3) },
        });
        assert_eq!(roundtrip(present.clone()), present);
    }

    #[test]
    fn response_value_missing_key() {
        let message = Message::Response(ResponseSpecific {
            responder_id: 2,
            response_type: ResponseTypeSpecific::Value { value: None },
        });
        assert_eq!(roundtrip(message.clone()), message);
    }

    #[test]
    fn error_roundtrip() {
        let message = Message::Error(ErrorSpecific {
            code: 203,
            description: "Protocol Error".to_string(),
        });
        assert_eq!(roundtrip(message.clone()), message);
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(matches!(
            Message::from_bytes(b"definitely not bencode"),
            Err(Error::Protocol(_))
        ));
    }

    #[test]
    fn negative_wire_id_is_rejected() {
        // A hand-built frame claiming id -1.
        let bytes = b"d1:ad2:idi-1ee1:q9:successor1:y1:qe";
        assert!(matches!(
            Message::from_bytes(bytes.as_slice()),
            Err(Error::Protocol(_))
        ));
    }
}
