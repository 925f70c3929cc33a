//! Token models, identity claims, and the stateless token validator.

pub mod token;
pub mod validator;

pub use token::{record::*, secret::*};
pub use validator::*;
