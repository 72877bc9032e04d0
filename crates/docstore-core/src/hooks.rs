//! Validation and sanitization hooks
//!
//! Both are supplied by the model layer. The adapter calls them at fixed
//! points (validate before every write, sanitize after every read) and is
//! agnostic to what they check or how their errors look.

use std::convert::Infallible;

use crate::models::{Record, Version};

/// Checks a body before it is written
pub trait Validator {
    /// Caller-defined error payload, surfaced to callers verbatim
    type Error;

    /// Return `Err(payload)` to block the write
    fn validate(&self, body: &Record, version: Option<&Version>) -> Result<(), Self::Error>;
}

/// Transforms a stored record before it is returned to a caller
pub trait Sanitizer {
    fn sanitize(&self, record: Record, version: Option<&Version>) -> Record;
}

impl<F, E> Validator for F
where
    F: Fn(&Record, Option<&Version>) -> Result<(), E>,
{
    type Error = E;

    fn validate(&self, body: &Record, version: Option<&Version>) -> Result<(), E> {
        self(body, version)
    }
}

impl<F> Sanitizer for F
where
    F: Fn(Record, Option<&Version>) -> Record,
{
    fn sanitize(&self, record: Record, version: Option<&Version>) -> Record {
        self(record, version)
    }
}

/// Validator that accepts every body
#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptAll;

impl Validator for AcceptAll {
    type Error = Infallible;

    fn validate(&self, _body: &Record, _version: Option<&Version>) -> Result<(), Infallible> {
        Ok(())
    }
}

/// Sanitizer that returns records untouched
#[derive(Debug, Clone, Copy, Default)]
pub struct Passthrough;

impl Sanitizer for Passthrough {
    fn sanitize(&self, record: Record, _version: Option<&Version>) -> Record {
        record
    }
}
