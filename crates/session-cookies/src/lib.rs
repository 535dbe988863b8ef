//! Cookie header handling for stored browser sessions.
//!
//! A session is a raw `Cookie` request header (`name=value; name=value`).
//! This crate parses and re-serializes such headers and folds the
//! `Set-Cookie` values returned by a server back into the stored session.

mod codec;
mod map;
mod merge;
mod rotation;

pub use codec::{parse, serialize};
pub use map::CookieMap;
pub use merge::merge;
pub use rotation::{RotationDirective, directives_from_set_cookie};
