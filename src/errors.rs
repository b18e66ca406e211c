use thiserror::Error;

/// Reasons a hashing request can be rejected, one variant per offending
/// field so callers can pinpoint what to fix.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    #[error("output is shorter than 4 bytes")]
    OutputTooShort,
    #[error("output is longer than 2^32 - 1 bytes")]
    OutputTooLong,
    #[error("password is longer than 2^32 - 1 bytes")]
    PwdTooLong,
    #[error("salt is shorter than 8 bytes")]
    SaltTooShort,
    #[error("salt is longer than 2^32 - 1 bytes")]
    SaltTooLong,
    #[error("secret is longer than 32 bytes")]
    SecretTooLong,
    #[error("associated data is longer than 2^32 - 1 bytes")]
    AdTooLong,
    #[error("memory cost is less than 8 KiB")]
    MemoryTooLittle,
    #[error("time cost is less than 1 pass")]
    TimeTooSmall,
    #[error("fewer than 1 lane requested")]
    LanesTooFew,
    #[error("more than 2^24 - 1 lanes requested")]
    LanesTooMany,
    #[error("fewer than 1 thread requested")]
    ThreadsTooFew,
    #[error("more than 2^24 - 1 threads requested")]
    ThreadsTooMany,
    #[error("free callback given without an allocate callback")]
    AllocateCbkMissing,
    #[error("allocate callback given without a free callback")]
    FreeCbkMissing,
    #[error("memory allocation failed")]
    MemoryAllocation,
}
