//! Operational limits and defaults, kept in one place.

/// Default number of rows per history page.
pub const DEFAULT_PAGE_SIZE: usize = 20;

/// Upper bound for configured page sizes.
pub const MAX_PAGE_SIZE: usize = 100;

/// Length of the guest-shareable reservation code.
pub const SHORT_CODE_LEN: usize = 6;

/// Longest accepted guest or property name.
pub const MAX_NAME_LEN: usize = 256;

/// Longest accepted free-form text (welcome message, block reason).
pub const MAX_TEXT_LEN: usize = 4096;

/// Most listings removed by one sweep, matching the store's multi-delete cap.
pub const MAX_SWEEP_BATCH: usize = 500;
