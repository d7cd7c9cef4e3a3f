//! Debug protocol vocabulary, framing and payload encoding

pub mod codec;
pub mod literal;
pub mod request;
pub mod tokens;

pub use codec::LineBuffer;
pub use literal::{Literal, LiteralError};
pub use request::Request;
