#![feature(error_generic_member_access)]
#![deny(missing_docs)]

//! This crate defines error & result types for Strata.
//! It also contains a variety of useful macros for error handling.

use std::backtrace::Backtrace;
use std::borrow::Cow;
use std::fmt::{Debug, Display, Formatter};
use std::ops::Deref;
use std::{fmt, io};

/// A string that can be used as an error message.
#[derive(Debug)]
pub struct ErrString(Cow<'static, str>);

impl<T> From<T> for ErrString
where
    T: Into<Cow<'static, str>>,
{
    fn from(msg: T) -> Self {
        Self(msg.into())
    }
}

impl AsRef<str> for ErrString {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Deref for ErrString {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl Display for ErrString {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Display::fmt(&self.0, f)
    }
}

/// The top-level error type for Strata.
#[derive(thiserror::Error)]
#[non_exhaustive]
pub enum StrataError {
    /// A wrapped generic error
    #[error("index {0} out of bounds from {1} to {2}\nBacktrace:\n{3}")]
    OutOfBounds(usize, usize, usize, Backtrace),
    /// An invalid argument was provided.
    #[error("{0}\nBacktrace:\n{1}")]
    InvalidArgument(ErrString, Backtrace),
    /// An error occurred while (de)serializing a value.
    #[error("{0}\nBacktrace:\n{1}")]
    InvalidSerde(ErrString, Backtrace),
    /// An operation is not implemented for the given column kind.
    #[error("function {0} not implemented for {1}\nBacktrace:\n{2}")]
    NotImplemented(ErrString, ErrString, Backtrace),
    /// A column of one kind was handed to an operation that requires another.
    #[error("expected type: {0} but instead got {1}\nBacktrace:\n{2}")]
    MismatchedTypes(ErrString, ErrString, Backtrace),
    /// A structural invariant does not hold.
    #[error("{0}\nBacktrace:\n{1}")]
    AssertionFailed(ErrString, Backtrace),
    /// A column grew beyond what its representation can address.
    #[error("size {0} exceeds the capacity limit {1}\nBacktrace:\n{2}")]
    CapacityExceeded(usize, usize, Backtrace),
    /// Wraps an error with a context message.
    #[error("{0}: {1}")]
    Context(ErrString, Box<StrataError>),
    /// Wraps an IO error.
    #[error("{0}\nBacktrace:\n{1}")]
    IOError(
        #[from]
        io::Error,
        Backtrace,
    ),
    /// Wraps a JSON (de)serialization error.
    #[cfg(feature = "serde")]
    #[error("{0}\nBacktrace:\n{1}")]
    JSONError(
        #[from]
        serde_json::Error,
        Backtrace,
    ),
}

impl StrataError {
    /// Adds additional context to an error.
    pub fn with_context<T: Into<ErrString>>(self, msg: T) -> Self {
        StrataError::Context(msg.into(), Box::new(self))
    }

    /// Returns true if this error, or the error it wraps, reports an exceeded capacity.
    pub fn is_capacity_exceeded(&self) -> bool {
        match self {
            StrataError::CapacityExceeded(..) => true,
            StrataError::Context(_, inner) => inner.is_capacity_exceeded(),
            _ => false,
        }
    }
}

impl Debug for StrataError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Display::fmt(self, f)
    }
}

/// A type alias for Results that return StrataErrors as their error type.
pub type StrataResult<T> = Result<T, StrataError>;

/// A convenient macro for creating a StrataError.
#[macro_export]
macro_rules! strata_err {
    (OutOfBounds: $idx:expr, $start:expr, $stop:expr) => {{
        use std::backtrace::Backtrace;
        $crate::__private::must_use(
            $crate::StrataError::OutOfBounds($idx, $start, $stop, Backtrace::capture())
        )
    }};
    (NotImplemented: $func:expr, $by_whom:expr) => {{
        use std::backtrace::Backtrace;
        $crate::__private::must_use(
            $crate::StrataError::NotImplemented($func.into(), format!("{}", $by_whom).into(), Backtrace::capture())
        )
    }};
    (MismatchedTypes: $expected:expr, $actual:expr) => {{
        use std::backtrace::Backtrace;
        $crate::__private::must_use(
            $crate::StrataError::MismatchedTypes($expected.to_string().into(), $actual.to_string().into(), Backtrace::capture())
        )
    }};
    (CapacityExceeded: $size:expr, $limit:expr) => {{
        use std::backtrace::Backtrace;
        $crate::__private::must_use(
            $crate::StrataError::CapacityExceeded($size, $limit, Backtrace::capture())
        )
    }};
    (Context: $msg:literal, $err:expr) => {{
        $crate::__private::must_use(
            $crate::StrataError::Context($msg.into(), Box::new($err))
        )
    }};
    ($variant:ident: $fmt:literal $(, $arg:expr)* $(,)?) => {{
        use std::backtrace::Backtrace;
        $crate::__private::must_use(
            $crate::StrataError::$variant(format!($fmt, $($arg),*).into(), Backtrace::capture())
        )
    }};
    ($fmt:literal $(, $arg:expr)* $(,)?) => {
        $crate::strata_err!(InvalidArgument: $fmt, $($arg),*)
    };
}

/// A convenient macro for returning a StrataError.
#[macro_export]
macro_rules! strata_bail {
    ($($tt:tt)+) => {
        return Err($crate::strata_err!($($tt)+))
    };
}

/// A convenient macro for panicking with a StrataError in the presence of a programmer error
/// (e.g., an invariant has been violated).
#[macro_export]
macro_rules! strata_panic {
    (OutOfBounds: $idx:expr, $start:expr, $stop:expr) => {{
        $crate::strata_panic!($crate::strata_err!(OutOfBounds: $idx, $start, $stop))
    }};
    (NotImplemented: $func:expr, $for_whom:expr) => {{
        $crate::strata_panic!($crate::strata_err!(NotImplemented: $func, $for_whom))
    }};
    (MismatchedTypes: $expected:expr, $actual:expr) => {{
        $crate::strata_panic!($crate::strata_err!(MismatchedTypes: $expected, $actual))
    }};
    ($variant:ident: $fmt:literal $(, $arg:expr)* $(,)?) => {
        $crate::strata_panic!($crate::strata_err!($variant: $fmt, $($arg),*))
    };
    ($fmt:literal $(, $arg:expr)* $(,)?) => {
        $crate::strata_panic!($crate::strata_err!($fmt, $($arg),*))
    };
    ($err:expr, $fmt:literal $(, $arg:expr)* $(,)?) => {{
        let err: $crate::StrataError = $err;
        panic!("{}", err.with_context(format!($fmt, $($arg),*)))
    }};
    ($err:expr) => {{
        let err: $crate::StrataError = $err;
        panic!("{}", err)
    }};
}

#[doc(hidden)]
pub mod __private {
    #[doc(hidden)]
    #[inline]
    #[cold]
    #[must_use]
    pub const fn must_use(error: crate::StrataError) -> crate::StrataError {
        error
    }
}

/// A trait for unwrapping a StrataResult.
pub trait StrataUnwrap {
    /// The type of the value being unwrapped.
    type Output;

    /// Returns the value of the result if it is Ok, otherwise panics with the error.
    /// Should be called only in contexts where the error condition represents a bug (programmer error).
    fn strata_unwrap(self) -> Self::Output;
}

impl<T, E> StrataUnwrap for Result<T, E>
where
    E: Into<StrataError>,
{
    type Output = T;

    #[inline(always)]
    fn strata_unwrap(self) -> Self::Output {
        self.map_err(|err| err.into())
            .unwrap_or_else(|err| strata_panic!(err))
    }
}

/// A trait for expectations on a StrataResult.
pub trait StrataExpect {
    /// The type of the value being expected.
    type Output;

    /// Returns the value of the result if it is Ok, otherwise panics with the error.
    /// Should be called only in contexts where the error condition represents a bug (programmer error).
    fn strata_expect(self, msg: &str) -> Self::Output;
}

impl<T, E> StrataExpect for Result<T, E>
where
    E: Into<StrataError>,
{
    type Output = T;

    #[inline(always)]
    fn strata_expect(self, msg: &str) -> Self::Output {
        self.map_err(|err| err.into())
            .unwrap_or_else(|e| strata_panic!(e.with_context(msg.to_string())))
    }
}

impl<T> StrataExpect for Option<T> {
    type Output = T;

    #[inline(always)]
    fn strata_expect(self, msg: &str) -> Self::Output {
        self.unwrap_or_else(|| {
            let err = StrataError::AssertionFailed(msg.to_string().into(), Backtrace::capture());
            strata_panic!(err)
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn bail_out_of_bounds(idx: usize) -> StrataResult<()> {
        if idx >= 3 {
            strata_bail!(OutOfBounds: idx, 0, 3);
        }
        Ok(())
    }

    #[test]
    fn bail_formats_variant() {
        let err = bail_out_of_bounds(5).unwrap_err();
        assert!(matches!(err, StrataError::OutOfBounds(5, 0, 3, _)));
        assert!(err.to_string().starts_with("index 5 out of bounds from 0 to 3"));
        assert!(bail_out_of_bounds(1).is_ok());
    }

    #[test]
    fn plain_message_is_invalid_argument() {
        let err = strata_err!("bad value {}", 7);
        assert!(matches!(err, StrataError::InvalidArgument(..)));
        assert!(err.to_string().starts_with("bad value 7"));
    }

    #[test]
    fn capacity_exceeded_survives_context() {
        let err = strata_err!(CapacityExceeded: 10, 8).with_context("map column");
        assert!(err.is_capacity_exceeded());
        assert!(err.to_string().starts_with("map column: size 10 exceeds the capacity limit 8"));
        assert!(!strata_err!("other").is_capacity_exceeded());
    }

    #[test]
    fn mismatched_types_message() {
        let err = strata_err!(MismatchedTypes: "map", "int32");
        assert!(
            err.to_string()
                .starts_with("expected type: map but instead got int32")
        );
    }

    #[test]
    #[should_panic(expected = "missing value")]
    fn expect_on_none_panics() {
        let value: Option<u32> = None;
        value.strata_expect("missing value");
    }
}
