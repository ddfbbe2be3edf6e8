//! Macros for connector error handling.
//!
//! Provides convenience macros for creating and returning [`crate::error::CdcError`]
//! instances with reduced boilerplate for common error handling patterns.

/// Creates a [`crate::error::CdcError`] from an error kind and description.
///
/// Accepts an optional dynamic detail (any value implementing `ToString`) and an
/// optional source error introduced by the `source:` keyword.
#[macro_export]
macro_rules! cdc_error {
    ($kind:expr, $desc:expr) => {
        $crate::error::CdcError::from(($kind, $desc))
    };
    ($kind:expr, $desc:expr, source: $source:expr) => {
        $crate::error::CdcError::from(($kind, $desc)).with_source($source)
    };
    ($kind:expr, $desc:expr, $detail:expr) => {
        $crate::error::CdcError::from(($kind, $desc, $detail.to_string()))
    };
    ($kind:expr, $desc:expr, $detail:expr, source: $source:expr) => {
        $crate::error::CdcError::from(($kind, $desc, $detail.to_string())).with_source($source)
    };
}

/// Creates and returns a [`crate::error::CdcError`] from the current function.
///
/// Combines error creation with early return, reducing boilerplate when an error
/// condition should immediately terminate execution. Supports the same optional
/// detail and source arguments as [`cdc_error!`].
#[macro_export]
macro_rules! bail {
    ($kind:expr, $desc:expr) => {
        return ::core::result::Result::Err($crate::cdc_error!($kind, $desc))
    };
    ($kind:expr, $desc:expr, source: $source:expr) => {
        return ::core::result::Result::Err($crate::cdc_error!($kind, $desc, source: $source))
    };
    ($kind:expr, $desc:expr, $detail:expr) => {
        return ::core::result::Result::Err($crate::cdc_error!($kind, $desc, $detail))
    };
    ($kind:expr, $desc:expr, $detail:expr, source: $source:expr) => {
        return ::core::result::Result::Err($crate::cdc_error!(
            $kind,
            $desc,
            $detail,
            source: $source
        ))
    };
}
