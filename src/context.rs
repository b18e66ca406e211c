use crate::block::Block;
use crate::errors::Error;
use crate::{defaults, SLICES_PER_LANE};

pub const MIN_OUTLEN: usize = 4;
pub const MAX_OUTLEN: usize = 0xffff_ffff;
pub const MAX_PWD_LENGTH: usize = 0xffff_ffff;
pub const MIN_SALT_LENGTH: usize = 8;
pub const MAX_SALT_LENGTH: usize = 0xffff_ffff;
pub const MAX_SECRET_LENGTH: usize = 32;
pub const MAX_AD_LENGTH: usize = 0xffff_ffff;
pub const MIN_MEMORY: u32 = 2 * SLICES_PER_LANE;
pub const MIN_TIME: u32 = 1;
pub const MIN_LANES: u32 = 1;
pub const MAX_LANES: u32 = 0x00ff_ffff;
pub const MIN_THREADS: u32 = 1;
pub const MAX_THREADS: u32 = 0x00ff_ffff;

/// Caller-supplied allocator: receives the request in bytes (always a
/// multiple of the block size) and returns the backing blocks, or `None` to
/// abort with [`Error::MemoryAllocation`].
pub type AllocateCbk<'a> = Box<dyn FnMut(usize) -> Option<Vec<Block>> + 'a>;

/// Receives the matrix storage back after finalization, wiped beforehand
/// when `clear_memory` is set.
pub type FreeCbk<'a> = Box<dyn FnMut(Vec<Block>) + 'a>;

/// All inputs and outputs of one hashing request.
///
/// `pwd` and `secret` are mutable so that `clear_password` / `clear_secret`
/// can wipe the caller's buffers in place once they have been absorbed into
/// the prehash.
pub struct Context<'a> {
    /// Receives the tag; its length selects the tag length.
    pub out: &'a mut [u8],
    pub pwd: Option<&'a mut [u8]>,
    pub salt: &'a [u8],
    pub secret: Option<&'a mut [u8]>,
    pub ad: &'a [u8],
    /// Memory cost in KiB (1 KiB = 1 block).
    pub m_cost: u32,
    /// Number of passes over the memory.
    pub t_cost: u32,
    pub lanes: u32,
    /// Worker cap for the fill; never changes the tag.
    pub threads: u32,
    pub clear_password: bool,
    pub clear_secret: bool,
    pub clear_memory: bool,
    pub allocate_cbk: Option<AllocateCbk<'a>>,
    pub free_cbk: Option<FreeCbk<'a>>,
}

impl<'a> Context<'a> {
    /// A context with the default costs, no secret, no associated data, no
    /// wiping, and library-managed memory. Adjust fields as needed before
    /// hashing.
    pub fn new(out: &'a mut [u8], pwd: Option<&'a mut [u8]>, salt: &'a [u8]) -> Context<'a> {
        Context {
            out,
            pwd,
            salt,
            secret: None,
            ad: &[],
            m_cost: defaults::KIB,
            t_cost: defaults::PASSES,
            lanes: defaults::LANES,
            threads: defaults::LANES,
            clear_password: false,
            clear_secret: false,
            clear_memory: false,
            allocate_cbk: None,
            free_cbk: None,
        }
    }

    /// Checks every bound before anything is allocated or absorbed.
    pub fn validate(&self) -> Result<(), Error> {
        validate_lengths(
            self.out.len(),
            self.pwd.as_deref().map_or(0, |p| p.len()),
            self.salt.len(),
            self.secret.as_deref().map_or(0, |k| k.len()),
            self.ad.len(),
        )?;

        if self.m_cost < MIN_MEMORY {
            return Err(Error::MemoryTooLittle);
        }
        if self.t_cost < MIN_TIME {
            return Err(Error::TimeTooSmall);
        }
        if self.lanes < MIN_LANES {
            return Err(Error::LanesTooFew);
        }
        if self.lanes > MAX_LANES {
            return Err(Error::LanesTooMany);
        }
        if self.threads < MIN_THREADS {
            return Err(Error::ThreadsTooFew);
        }
        if self.threads > MAX_THREADS {
            return Err(Error::ThreadsTooMany);
        }
        match (&self.allocate_cbk, &self.free_cbk) {
            (Some(_), None) => Err(Error::FreeCbkMissing),
            (None, Some(_)) => Err(Error::AllocateCbkMissing),
            _ => Ok(()),
        }
    }
}

/// Shared length checks for both entry points. The C-style null-pointer
/// mismatch states cannot be expressed over slices, so only the numeric
/// bounds remain; upper bounds that are tautological for the field types
/// are likewise not repeated here.
pub(crate) fn validate_lengths(
    outlen: usize,
    pwdlen: usize,
    saltlen: usize,
    secretlen: usize,
    adlen: usize,
) -> Result<(), Error> {
    if outlen < MIN_OUTLEN {
        return Err(Error::OutputTooShort);
    }
    if outlen > MAX_OUTLEN {
        return Err(Error::OutputTooLong);
    }
    if pwdlen > MAX_PWD_LENGTH {
        return Err(Error::PwdTooLong);
    }
    if saltlen < MIN_SALT_LENGTH {
        return Err(Error::SaltTooShort);
    }
    if saltlen > MAX_SALT_LENGTH {
        return Err(Error::SaltTooLong);
    }
    if secretlen > MAX_SECRET_LENGTH {
        return Err(Error::SecretTooLong);
    }
    if adlen > MAX_AD_LENGTH {
        return Err(Error::AdTooLong);
    }
    Ok(())
}

/// Clamps `m_cost` up to the 8-blocks-per-lane minimum, then down to a
/// multiple of `4 * lanes` so all segments have equal length.
pub(crate) fn aligned_memory_blocks(m_cost: u32, lanes: u32) -> u32 {
    let quantum = SLICES_PER_LANE * lanes;
    let blocks = m_cost.max(2 * quantum);
    blocks / quantum * quantum
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid<'a>(out: &'a mut [u8], salt: &'a [u8]) -> Context<'a> {
        let mut ctx = Context::new(out, None, salt);
        ctx.m_cost = 16;
        ctx
    }

    #[test]
    fn accepts_reasonable_parameters() {
        let mut out = [0u8; 32];
        let salt = [2u8; 16];
        assert_eq!(valid(&mut out, &salt).validate(), Ok(()));
    }

    #[test]
    fn rejects_short_output() {
        let mut out = [0u8; 3];
        let salt = [2u8; 16];
        assert_eq!(
            valid(&mut out, &salt).validate(),
            Err(Error::OutputTooShort)
        );
    }

    #[test]
    fn rejects_short_salt() {
        let mut out = [0u8; 32];
        let salt = [2u8; 7];
        assert_eq!(valid(&mut out, &salt).validate(), Err(Error::SaltTooShort));
    }

    #[test]
    fn rejects_oversized_secret() {
        let mut out = [0u8; 32];
        let salt = [2u8; 16];
        let mut secret = [3u8; 33];
        let mut ctx = valid(&mut out, &salt);
        ctx.secret = Some(&mut secret);
        assert_eq!(ctx.validate(), Err(Error::SecretTooLong));
    }

    #[test]
    fn rejects_degenerate_costs() {
        let mut out = [0u8; 32];
        let salt = [2u8; 16];

        let mut ctx = valid(&mut out, &salt);
        ctx.m_cost = 7;
        assert_eq!(ctx.validate(), Err(Error::MemoryTooLittle));

        ctx.m_cost = 16;
        ctx.t_cost = 0;
        assert_eq!(ctx.validate(), Err(Error::TimeTooSmall));
    }

    #[test]
    fn rejects_lane_and_thread_bounds() {
        let mut out = [0u8; 32];
        let salt = [2u8; 16];

        let mut ctx = valid(&mut out, &salt);
        ctx.lanes = 0;
        assert_eq!(ctx.validate(), Err(Error::LanesTooFew));
        ctx.lanes = MAX_LANES + 1;
        assert_eq!(ctx.validate(), Err(Error::LanesTooMany));

        ctx.lanes = 1;
        ctx.threads = 0;
        assert_eq!(ctx.validate(), Err(Error::ThreadsTooFew));
        ctx.threads = MAX_THREADS + 1;
        assert_eq!(ctx.validate(), Err(Error::ThreadsTooMany));
    }

    #[test]
    fn rejects_half_an_allocator() {
        let mut out = [0u8; 32];
        let salt = [2u8; 16];

        {
            let mut ctx = valid(&mut out, &salt);
            ctx.allocate_cbk = Some(Box::new(|_| None));
            assert_eq!(ctx.validate(), Err(Error::FreeCbkMissing));
        }

        let mut ctx = valid(&mut out, &salt);
        ctx.free_cbk = Some(Box::new(|_| ()));
        assert_eq!(ctx.validate(), Err(Error::AllocateCbkMissing));
    }

    #[test]
    fn memory_alignment_invariant() {
        for lanes in [1u32, 2, 3, 4, 7, 8, 16] {
            for m_cost in [8u32, 16, 31, 32, 33, 100, 255, 256, 1000, 4096] {
                let blocks = aligned_memory_blocks(m_cost, lanes);
                assert_eq!(blocks % (SLICES_PER_LANE * lanes), 0);
                assert!(blocks >= 2 * SLICES_PER_LANE * lanes);
                let target = m_cost.max(2 * SLICES_PER_LANE * lanes);
                assert!(blocks <= target);
                assert!(target - blocks < SLICES_PER_LANE * lanes);
            }
        }
    }
}
