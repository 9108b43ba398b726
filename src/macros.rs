// src/macros.rs

// Crate-internal log macros. With `logging` they forward to `tracing`;
// without it errors go to stderr prefixed with the crate name and the other
// levels compile to nothing, so no subscriber is ever required.

#[cfg(feature = "logging")]
mod imp {
    // ---
    macro_rules! log_error {
        ($($arg:tt)*) => { tracing::error!($($arg)*) };
    }

    macro_rules! log_warn {
        ($($arg:tt)*) => { tracing::warn!($($arg)*) };
    }

    macro_rules! log_info {
        ($($arg:tt)*) => { tracing::info!($($arg)*) };
    }

    macro_rules! log_debug {
        ($($arg:tt)*) => { tracing::debug!($($arg)*) };
    }

    pub(crate) use {log_debug, log_error, log_info, log_warn};
}

#[cfg(not(feature = "logging"))]
mod imp {
    // ---
    macro_rules! log_error {
        ($($arg:tt)*) => { eprintln!("ws-rpc: {}", format_args!($($arg)*)) };
    }

    macro_rules! log_warn {
        ($($arg:tt)*) => {};
    }

    macro_rules! log_info {
        ($($arg:tt)*) => {};
    }

    macro_rules! log_debug {
        ($($arg:tt)*) => {};
    }

    pub(crate) use {log_debug, log_error, log_info, log_warn};
}

pub(crate) use imp::{log_debug, log_error, log_info, log_warn};
