//! Internal helper functions and utilities.
//!
//! This module contains shared rpgp glue that is not part of the public API.

mod helpers;

pub(crate) use helpers::*;
