//! cmux-protocol: Wire definitions for the cmux control socket
//!
//! The socket carries newline-terminated records in two syntaxes over the
//! same stream. A record whose first non-whitespace byte is `{` is a v2 JSON
//! request; anything else is a v1 text command.

pub mod codec;
pub mod command;
pub mod error;
pub mod handle;
pub mod rpc;

// Re-export main types at crate root
pub use codec::{CodecError, LineCodec, Record, RecordCodec, DEFAULT_MAX_LINE_BYTES};
pub use command::{
    quote_option_value, unescape_controls, CommandArgs, CommandLine, CommandParseError,
};
pub use error::{CommandError, ErrorCode};
pub use handle::{parse_ordinal, EntityKind, Handle, HandleError};
pub use rpc::{RpcError, RpcRequest, RpcResponse};

/// Protocol versions served on the socket
pub const PROTOCOL_VERSIONS: &[u32] = &[1, 2];
