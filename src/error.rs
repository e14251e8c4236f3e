use core::num::NonZeroU32;

/// The error type used by this library.
///
/// Every variant is reported to the host tool as the FlashOS failure status
/// (see [`Error::code`]); the variant itself only shows up in logs and in the
/// library API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// An erase, program or read was issued outside an `Init`/`UnInit` session.
    NotInitialized,
    /// `Init` was called while a session was already open.
    AlreadyInitialized,
    /// The function code is not 1, 2 or 3, or `UnInit` did not match `Init`.
    InvalidFunction,
    /// The address range leaves the device, or is not granule aligned.
    InvalidAddress,
    /// The controller kept its busy flag set for longer than the timeout.
    Timeout,
    /// Read-back differed from the expected data at `address`.
    VerifyMismatch { address: u32 },
    /// The byte at `address` does not hold the blank pattern.
    NotBlank { address: u32 },
}

impl Error {
    /// FlashOS status for a failed call.
    pub const FAILED: NonZeroU32 = match NonZeroU32::new(1) {
        Some(code) => code,
        None => unreachable!(),
    };

    /// The non-zero status returned through the FlashOS entry points.
    pub const fn code(self) -> NonZeroU32 {
        Self::FAILED
    }
}

/// Maps a driver result onto the FlashOS status word: `0` on success, `1` on
/// failure.
pub fn status<T>(result: &Result<T, Error>) -> u32 {
    match result {
        Ok(_) => 0,
        Err(e) => e.code().get(),
    }
}
