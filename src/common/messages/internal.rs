//! Bencode representation of wire messages. Field names here ARE the wire
//! contract; the public types in the parent module stay serde-free.

use serde::{Deserialize, Serialize};
use serde_bytes::ByteBuf;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "y")]
pub enum RpcMessage {
    #[serde(rename = "q")]
    Request(RpcRequestSpecific),

    #[serde(rename = "r")]
    Response(RpcResponseSpecific),

    #[serde(rename = "e")]
    Error(RpcErrorSpecific),
}

impl RpcMessage {
    pub fn from_bytes(bytes: &[u8]) -> Result<RpcMessage, serde_bencode::Error> {
        serde_bencode::from_bytes(bytes)
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, serde_bencode::Error> {
        serde_bencode::to_bytes(self)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "q")]
pub enum RpcRequestSpecific {
    #[serde(rename = "successor")]
    Successor {
        #[serde(rename = "a")]
        arguments: RpcNoArguments,
    },

    #[serde(rename = "predecessor")]
    Predecessor {
        #[serde(rename = "a")]
        arguments: RpcNoArguments,
    },

    #[serde(rename = "closest_preceding_finger")]
    ClosestPrecedingFinger {
        #[serde(rename = "a")]
        arguments: RpcTargetArguments,
    },

    #[serde(rename = "get_value")]
    GetValue {
        #[serde(rename = "a")]
        arguments: RpcKeyArguments,
    },

    #[serde(rename = "put_value")]
    PutValue {
        #[serde(rename = "a")]
        arguments: RpcPutValueArguments,
    },
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "r")]
pub enum RpcResponseSpecific {
    #[serde(rename = "node")]
    Node {
        #[serde(rename = "a")]
        arguments: RpcNodeResponseArguments,
    },

    #[serde(rename = "predecessor")]
    Predecessor {
        #[serde(rename = "a")]
        arguments: RpcPredecessorResponseArguments,
    },

    #[serde(rename = "value")]
    Value {
        #[serde(rename = "a")]
        arguments: RpcValueResponseArguments,
    },

    #[serde(rename = "stored")]
    Stored {
        #[serde(rename = "a")]
        arguments: RpcNoArguments,
    },
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct RpcErrorSpecific {
    #[serde(rename = "e")]
    pub error_info: (i32, String),
}

/// Procedures taking no argument beyond the sender's id.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct RpcNoArguments {
    pub id: i64,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct RpcTargetArguments {
    pub id: i64,
    pub target: i64,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct RpcKeyArguments {
    pub id: i64,
    pub key: i64,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct RpcPutValueArguments {
    pub id: i64,
    pub key: i64,
    pub value: ByteBuf,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct RpcNodeResponseArguments {
    pub id: i64,
    pub node: i64,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct RpcPredecessorResponseArguments {
    pub id: i64,

    /// Absent until the ring has a second member.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node: Option<i64>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct RpcValueResponseArguments {
    pub id: i64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<ByteBuf>,
}
