// Copyright 2024 Cloudflare, Inc.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
// http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

#![warn(clippy::all)]
//! The error type shared by the connection pool and the factories that feed it.

pub use std::error::Error as ErrorTrait;
use std::borrow::Cow;
use std::fmt;

/// Context string of an [Error]. Static strings are kept without allocation.
pub type ContextStr = Cow<'static, str>;

/// Any error that can be the cause of an [Error]
pub type Cause = Box<dyn ErrorTrait + Send + Sync>;

/// The boxed [Error], the way errors are passed around
pub type BError = Box<Error>;
/// `std::result::Result<T, BError>`
pub type Result<T, E = BError> = std::result::Result<T, E>;

/// A pool error: what went wrong, where, and because of what
#[derive(Debug)]
pub struct Error {
    /// the kind of failure
    pub etype: ErrorType,
    /// the error that led to this one
    pub cause: Option<Cause>,
    /// where or why it happened
    pub context: Option<ContextStr>,
}

/// The kinds of failure
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum ErrorType {
    /// The capacity settings are invalid: zero, or initial above max.
    InvalidCapacity,
    /// The factory failed while the pool was being filled.
    FactoryFailure,
    /// The pool has been shut down.
    PoolClosed,
    /// A release was attempted without a connection.
    InvalidConnection,
    /// A connection could not be established.
    ConnectError,
    /// A connection could not be closed.
    CloseError,
    /// A configuration could not be read or parsed.
    ReadError,
    InternalError,
}

impl ErrorType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorType::InvalidCapacity => "InvalidCapacity",
            ErrorType::FactoryFailure => "FactoryFailure",
            ErrorType::PoolClosed => "PoolClosed",
            ErrorType::InvalidConnection => "InvalidConnection",
            ErrorType::ConnectError => "ConnectError",
            ErrorType::CloseError => "CloseError",
            ErrorType::ReadError => "ReadError",
            ErrorType::InternalError => "InternalError",
        }
    }
}

impl Error {
    /// Build an error from all its parts. The other constructors are shorthands for this.
    #[inline]
    pub fn create(
        etype: ErrorType,
        context: Option<ContextStr>,
        cause: Option<Cause>,
    ) -> BError {
        Box::new(Error {
            etype,
            cause,
            context,
        })
    }

    /// An error of the given type, nothing else
    #[inline]
    pub fn new(e: ErrorType) -> BError {
        Self::create(e, None, None)
    }

    /// An error caused by another error.
    /// ```
    /// use connpool_error::{Error, ErrorType, Result};
    ///
    /// fn dial() -> Result<()> {
    ///     // ...
    ///     Ok(())
    /// }
    /// fn fill() -> Result<()> {
    ///     dial().map_err(|e| Error::because(ErrorType::FactoryFailure, "fill failed", e))
    /// }
    /// ```
    #[inline]
    pub fn because<S: Into<ContextStr>, E: Into<Cause>>(
        e: ErrorType,
        context: S,
        cause: E,
    ) -> BError {
        Self::create(e, Some(context.into()), Some(cause.into()))
    }

    /// `Err(Error::because(..))`
    #[inline]
    pub fn e_because<T, S: Into<ContextStr>, E: Into<Cause>>(
        e: ErrorType,
        context: S,
        cause: E,
    ) -> Result<T> {
        Err(Self::because(e, context, cause))
    }

    /// An error with an explanation but no cause
    #[inline]
    pub fn explain<S: Into<ContextStr>>(e: ErrorType, context: S) -> BError {
        Self::create(e, Some(context.into()), None)
    }

    /// `Err(Error::explain(..))`
    #[inline]
    pub fn e_explain<T, S: Into<ContextStr>>(e: ErrorType, context: S) -> Result<T> {
        Err(Self::explain(e, context))
    }

    pub fn etype(&self) -> &ErrorType {
        &self.etype
    }

    pub fn set_cause<C: Into<Cause>>(&mut self, cause: C) {
        self.cause = Some(cause.into());
    }

    // the next link of the chain, if it is one of ours
    fn inner(&self) -> Option<&Error> {
        self.cause
            .as_ref()
            .and_then(|c| c.downcast_ref::<BError>())
            .map(|e| &**e)
    }

    /// The type of the deepest [Error] in the cause chain
    pub fn root_etype(&self) -> &ErrorType {
        self.inner().map_or(&self.etype, |e| e.root_etype())
    }

    /// The deepest cause, which may be a foreign error
    pub fn root_cause(&self) -> &(dyn ErrorTrait + Send + Sync + 'static) {
        match (self.inner(), self.cause.as_deref()) {
            (Some(e), _) => e.root_cause(),
            (None, Some(c)) => c,
            (None, None) => self,
        }
    }
}

impl fmt::Display for Error {
    // Prints the chain, the type of a link is skipped when it repeats the previous one
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut current = self;
        let mut previous: Option<ErrorType> = None;
        loop {
            if previous != Some(current.etype) {
                write!(f, "{}", current.etype.as_str())?;
            }
            if let Some(c) = current.context.as_ref() {
                write!(f, " context: {c}")?;
            }
            let Some(cause) = current.cause.as_ref() else {
                return Ok(());
            };
            write!(f, " cause: ")?;
            match cause.downcast_ref::<BError>() {
                Some(e) => {
                    previous = Some(current.etype);
                    current = &**e;
                }
                None => return write!(f, "{cause}"),
            }
        }
    }
}

impl ErrorTrait for Error {}

/// Wrap a foreign error into an [Error] of the given type, the foreign error becomes the cause
pub trait OrErr<T, E> {
    fn or_err(self, et: ErrorType, context: &'static str) -> Result<T>
    where
        E: Into<Cause>;

    /// Same as [OrErr::or_err()] with a context built only on failure
    fn or_err_with<C: Into<ContextStr>, F: FnOnce() -> C>(
        self,
        et: ErrorType,
        context: F,
    ) -> Result<T>
    where
        E: Into<Cause>;
}

impl<T, E> OrErr<T, E> for Result<T, E> {
    fn or_err(self, et: ErrorType, context: &'static str) -> Result<T>
    where
        E: Into<Cause>,
    {
        self.map_err(|e| Error::because(et, context, e))
    }

    fn or_err_with<C: Into<ContextStr>, F: FnOnce() -> C>(
        self,
        et: ErrorType,
        context: F,
    ) -> Result<T>
    where
        E: Into<Cause>,
    {
        self.map_err(|e| Error::because(et, context(), e))
    }
}
