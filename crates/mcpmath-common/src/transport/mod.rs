//! Local Channel Framing
//!
//! The local transport speaks newline-delimited JSON: one JSON-RPC message per
//! line in each direction. This module owns the framing rules so the server
//! loop only deals with decoded requests.
//!
//! # Framing Rules
//!
//! - Lines are terminated by `\n` (a trailing `\r` is stripped)
//! - Blank lines are skipped
//! - Lines longer than [`MAX_LINE_BYTES`] are discarded up to the next newline
//!   and answered with an invalid-request error
//! - Malformed JSON is answered with a parse error whose `id` is `null`

pub mod codec;

pub use codec::{decode_request, encode_line, read_frame, Frame, MAX_LINE_BYTES};
