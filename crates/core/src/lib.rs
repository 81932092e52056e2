//! `tracker-core`: primitives shared by every layer of the tracker client.
//!
//! This crate has no IO: identifiers, the request-layer error taxonomy, the
//! `{code, message, data}` response envelope and an in-process broadcast bus.

pub mod bus;
pub mod envelope;
pub mod error;
pub mod id;

pub use bus::{EventBus, Subscription};
pub use envelope::{Envelope, SUCCESS_CODE, decode_payload, unwrap_envelope};
pub use error::{ApiError, ApiResult, ErrorKind};
pub use id::UserId;
