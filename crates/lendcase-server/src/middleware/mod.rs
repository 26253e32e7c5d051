//! HTTP middleware

pub mod operator;
