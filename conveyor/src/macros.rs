//! Macros for toolkit error handling.
//!
//! Provides convenience macros for creating and returning
//! [`crate::error::ConveyorError`] instances with reduced boilerplate.

/// Creates a [`crate::error::ConveyorError`] from error kind and description.
///
/// Accepts a static description, an optional dynamic detail (use `detail =` to move
/// an owned [`String`]), and an optional source error.
#[macro_export]
macro_rules! conveyor_error {
    ($kind:expr, $desc:expr) => {
        $crate::error::ConveyorError::from(($kind, $desc))
    };
    ($kind:expr, $desc:expr, detail = $detail:expr) => {
        $crate::error::ConveyorError::from(($kind, $desc, $detail))
    };
    ($kind:expr, $desc:expr, detail = $detail:expr, source: $source:expr) => {
        $crate::error::ConveyorError::from(($kind, $desc, $detail)).with_source($source)
    };
}

/// Creates and returns a [`crate::error::ConveyorError`] from the current function.
///
/// Combines error creation with early return for error conditions that should
/// immediately terminate execution. Supports the same optional detail and source
/// arguments as [`conveyor_error!`].
#[macro_export]
macro_rules! bail {
    ($kind:expr, $desc:expr) => {
        return ::core::result::Result::Err($crate::conveyor_error!($kind, $desc))
    };
    ($kind:expr, $desc:expr, detail = $detail:expr) => {
        return ::core::result::Result::Err($crate::conveyor_error!($kind, $desc, detail = $detail))
    };
    ($kind:expr, $desc:expr, detail = $detail:expr, source: $source:expr) => {
        return ::core::result::Result::Err($crate::conveyor_error!(
            $kind,
            $desc,
            detail = $detail,
            source: $source
        ))
    };
}
