//! Error types for the fifokit library.
//!
//! Both public error types are thin message newtypes: construction-time
//! [`ConfigError`] here, and the persistence collaborator's
//! [`StoreError`](crate::store::StoreError). They share one generator so the
//! `Display`/`Error` plumbing exists exactly once.
//!
//! ## Example Usage
//!
//! ```
//! use fifokit::builder::CacheBuilder;
//! use fifokit::error::ConfigError;
//!
//! // Invalid capacity is caught without panicking
//! let bad: Result<_, ConfigError> = CacheBuilder::<u64, u64>::new(0).build();
//! assert!(bad.is_err());
//! ```

/// Defines a `String`-backed error newtype with `new`/`message` accessors
/// and `Display`/`Error` impls.
macro_rules! message_error {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq)]
        pub struct $name(String);

        impl $name {
            /// Creates a new error with the given description.
            #[inline]
            pub fn new(msg: impl Into<String>) -> Self {
                Self(msg.into())
            }

            /// Returns the error description.
            #[inline]
            pub fn message(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl std::error::Error for $name {}
    };
}

pub(crate) use message_error;

message_error! {
    /// Error returned when cache configuration parameters are invalid.
    ///
    /// Produced by [`CacheBuilder::build`](crate::builder::CacheBuilder::build).
    /// Carries a human-readable description of which parameter failed
    /// validation.
    ///
    /// # Example
    ///
    /// ```
    /// use fifokit::builder::CacheBuilder;
    ///
    /// let err = CacheBuilder::<u64, u64>::new(100).fp_rate(1.5).build().unwrap_err();
    /// assert!(err.to_string().contains("fp_rate"));
    /// ```
    ConfigError
}
