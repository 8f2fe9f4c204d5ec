//! Request input and normalization.
//!
//! This module turns what the caller hands us (a bare URL or an options
//! record) into the [`RequestDescriptor`] that is threaded through every hop:
//! - `options`: the caller-facing input types
//! - `descriptor`: the normalized, hop-scoped request
//! - `builder`: normalization of input into a descriptor

mod builder;
mod descriptor;
mod options;

pub use builder::normalize;
pub(crate) use builder::for_redirect;
pub use descriptor::{Body, RequestDescriptor, StreamBody};
pub use options::{BodyInput, ByteStream, FormInput, RequestInput, RequestOptions};
