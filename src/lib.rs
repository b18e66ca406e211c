//! The Argon2 (version 0x10) memory-hard password hashing core, in pure
//! Rust: the raw `(password, salt, secret, associated data) -> tag`
//! transformation for the Argon2d and Argon2i variants.

#[macro_use]
mod block;
mod compress;
mod context;
mod errors;
mod workers;

use blake2_rfc::blake2b::Blake2b;
use zeroize::Zeroize;

use block::{zero, Matrix};
use compress::{g, g_two};
use workers::Workers;

pub use block::{Block, ARGON2_BLOCK_BYTES};
pub use context::{AllocateCbk, Context, FreeCbk};
pub use errors::Error;

/// Variants of the algorithm, differing only in how reference blocks are
/// addressed during the fill.
#[derive(Eq, PartialEq, Copy, Clone, Debug)]
pub enum Variant {
    /// Data-dependent addressing: stronger against time-memory tradeoffs,
    /// not constant-time with respect to the password.
    Argon2d = 0,
    /// Data-independent addressing: the memory access pattern reveals
    /// nothing about the inputs.
    Argon2i = 1,
}

pub const ARGON2_VERSION: u32 = 0x10;

const DEF_B2HASH_LEN: usize = 64;
const PREHASH_SEED_LEN: usize = 72;
pub(crate) const SLICES_PER_LANE: u32 = 4;

pub mod defaults {
    pub const PASSES: u32 = 3;
    pub const KIB: u32 = 4096;
    pub const LANES: u32 = 1;
    pub const LENGTH: usize = 64;
}

fn split_u64(n: u64) -> (u32, u32) {
    ((n & 0xffffffff) as u32, (n >> 32) as u32)
}

fn as32le(k: u32) -> [u8; 4] {
    k.to_le_bytes()
}

fn len32(t: &[u8]) -> [u8; 4] {
    as32le(t.len() as u32)
}

macro_rules! b2hash {
    ($($bytes: expr),*) => {
        {
            let mut out = [0u8; DEF_B2HASH_LEN];
            b2hash!(&mut out; $($bytes),*);
            out
        }
    };
    ($out: expr; $($bytes: expr),*) => {
        {
            let mut b = Blake2b::new($out.len());
            $(b.update($bytes);)*
            $out.clone_from_slice(b.finalize().as_bytes());
        }
    };
}

/// Absorbs every input into the 64-byte prehash digest, returned inside the
/// 72-byte seed buffer whose two trailing words the first-block seeder
/// fills in per lane. `memory_kib` is the requested cost, before alignment.
#[rustfmt::skip]
fn h0(lanes: u32, hash_length: u32, memory_kib: u32, passes: u32, version: u32,
      variant: Variant, p: &[u8], s: &[u8], k: &[u8], x: &[u8])
      -> [u8; PREHASH_SEED_LEN] {
    let mut rv = [0u8; PREHASH_SEED_LEN];
    b2hash!(&mut rv[0..DEF_B2HASH_LEN];
            &as32le(lanes), &as32le(hash_length), &as32le(memory_kib),
            &as32le(passes), &as32le(version), &as32le(variant as u32),
            &len32(p), p,
            &len32(s), s,
            &len32(k), k,
            &len32(x), x);
    rv
}

/// Normalized hashing parameters. Construction clamps the memory cost up to
/// eight blocks per lane and the worker count down to the lane count; the
/// pre-alignment `kib` request is what the prehash absorbs.
pub struct Argon2 {
    passes: u32,
    lanes: u32,
    threads: u32,
    lanelen: u32,
    kib: u32,
    variant: Variant,
}

impl Argon2 {
    /// One worker per lane; see [`Argon2::with_threads`] to cap concurrency.
    pub fn new(passes: u32, lanes: u32, kib: u32, variant: Variant) -> Result<Argon2, Error> {
        Argon2::with_threads(passes, lanes, lanes, kib, variant)
    }

    pub fn with_threads(
        passes: u32,
        lanes: u32,
        threads: u32,
        kib: u32,
        variant: Variant,
    ) -> Result<Argon2, Error> {
        if passes < context::MIN_TIME {
            return Err(Error::TimeTooSmall);
        }
        if lanes < context::MIN_LANES {
            return Err(Error::LanesTooFew);
        }
        if lanes > context::MAX_LANES {
            return Err(Error::LanesTooMany);
        }
        if threads < context::MIN_THREADS {
            return Err(Error::ThreadsTooFew);
        }
        if threads > context::MAX_THREADS {
            return Err(Error::ThreadsTooMany);
        }
        if kib < context::MIN_MEMORY {
            return Err(Error::MemoryTooLittle);
        }

        let memory_blocks = context::aligned_memory_blocks(kib, lanes);
        Ok(Argon2 {
            passes,
            lanes,
            threads: threads.min(lanes),
            lanelen: memory_blocks / lanes,
            kib,
            variant,
        })
    }

    pub fn default(v: Variant) -> Argon2 {
        Argon2::new(defaults::PASSES, defaults::LANES, defaults::KIB, v)
            .expect("default parameters are in bounds")
    }

    /// `(variant, memory kib, passes, lanes)` as requested by the caller.
    pub fn params(&self) -> (Variant, u32, u32, u32) {
        (self.variant, self.kib, self.passes, self.lanes)
    }

    /// Derives an `out.len()`-byte tag from password `p`, salt `s`, secret
    /// value `k` and associated data `x`.
    pub fn hash(
        &self,
        out: &mut [u8],
        p: &[u8],
        s: &[u8],
        k: &[u8],
        x: &[u8],
    ) -> Result<(), Error> {
        context::validate_lengths(out.len(), p.len(), s.len(), k.len(), x.len())?;

        let mut blocks = Matrix::new(self.lanes, self.lanelen);
        let mut h0 = h0(
            self.lanes,
            out.len() as u32,
            self.kib,
            self.passes,
            ARGON2_VERSION,
            self.variant,
            p,
            s,
            k,
            x,
        );

        self.fill_matrix(&mut blocks, &h0);
        h0.zeroize();
        self.finalize(out, &blocks);
        Ok(())
    }

    /// Runs all passes over the matrix. Slices have to be filled in sync:
    /// every `Workers::map` call is one slice of one pass, and its return is
    /// the barrier separating it from the next.
    fn fill_matrix(&self, blocks: &mut Matrix, h0: &[u8; PREHASH_SEED_LEN]) {
        let mut workers = Workers::new(self.lanes, self.threads);

        workers.map(blocks, &|blks: &mut Matrix, lane| {
            self.fill_first_slice(blks, h0, lane)
        });
        for slice in 1..SLICES_PER_LANE {
            workers.map(blocks, &|blks: &mut Matrix, lane| {
                self.fill_slice(blks, 0, lane, slice, 0)
            });
        }

        for pass in 1..self.passes {
            for slice in 0..SLICES_PER_LANE {
                workers.map(blocks, &|blks: &mut Matrix, lane| {
                    self.fill_slice(blks, pass, lane, slice, 0)
                });
            }
        }
    }

    /// Seeds columns 0 and 1 of `lane` from the prehash, then fills the rest
    /// of the first slice.
    fn fill_first_slice(&self, blks: &mut Matrix, h0: &[u8; PREHASH_SEED_LEN], lane: u32) {
        let mut seed = *h0;
        seed[68..72].clone_from_slice(&as32le(lane));

        let mut blockbytes = [0u8; ARGON2_BLOCK_BYTES];
        seed[64..68].clone_from_slice(&as32le(0));
        h_prime(&mut blockbytes, &seed);
        blks[(lane, 0)].load(&blockbytes);

        seed[64..68].clone_from_slice(&as32le(1));
        h_prime(&mut blockbytes, &seed);
        blks[(lane, 1)].load(&blockbytes);

        blockbytes.zeroize();
        seed.zeroize();

        self.fill_slice(blks, 0, lane, 0, 2);
    }

    fn fill_slice(&self, blks: &mut Matrix, pass: u32, lane: u32, slice: u32, offset: u32) {
        let slicelen = self.lanelen / SLICES_PER_LANE;

        // Argon2i draws (j1, j2) from a pregenerated pseudo-random stream;
        // Argon2d reads them out of the previous block.
        let mut jgen = match self.variant {
            Variant::Argon2i => Some(Gen2i::new(
                offset as usize,
                pass,
                lane,
                slice,
                self.lanes * self.lanelen,
                self.passes,
            )),
            Variant::Argon2d => None,
        };

        for idx in offset..slicelen {
            let (j1, j2) = match jgen {
                Some(ref mut gen) => gen.nextj(),
                None => {
                    let col = self.prev(slice * slicelen + idx);
                    split_u64(blks[(lane, col)][0])
                }
            };
            self.fill_block(blks, pass, lane, slice, idx, j1, j2);
        }
    }

    fn fill_block(
        &self,
        blks: &mut Matrix,
        pass: u32,
        lane: u32,
        slice: u32,
        idx: u32,
        j1: u32,
        j2: u32,
    ) {
        let slicelen = self.lanelen / SLICES_PER_LANE;
        let z = index_alpha(pass, lane, slice, self.lanes, idx, slicelen, j1, j2);

        // during the first slice of the first pass nothing outside the
        // current lane exists yet
        let zth = match (pass, slice) {
            (0, 0) => (lane, z),
            _ => (j2 % self.lanes, z),
        };

        let cur = (lane, slice * slicelen + idx);
        let pre = (lane, self.prev(cur.1));
        let (wr, rd, refblk) = blks.get3(cur, pre, zth);
        g(wr, rd, refblk);
    }

    fn prev(&self, n: u32) -> u32 {
        if n > 0 {
            n - 1
        } else {
            self.lanelen - 1
        }
    }

    /// XORs the last column into one block and hashes that into the tag.
    fn finalize(&self, out: &mut [u8], blks: &Matrix) {
        let mut folded = blks.xor_column(self.lanelen - 1);

        let mut foldedbytes = [0u8; ARGON2_BLOCK_BYTES];
        folded.store(&mut foldedbytes);
        h_prime(out, &foldedbytes);

        foldedbytes.zeroize();
        folded.zeroize();
    }
}

/// The full pipeline over a [`Context`]: validate, align the memory cost,
/// allocate, prehash, fill, finalize, wipe and release.
pub fn hash_context(context: &mut Context<'_>, variant: Variant) -> Result<(), Error> {
    context.validate()?;

    let a2 = Argon2::with_threads(
        context.t_cost,
        context.lanes,
        context.threads,
        context.m_cost,
        variant,
    )?;

    let memory_blocks = a2.lanes as usize * a2.lanelen as usize;
    let mut blocks = match context.allocate_cbk.as_mut() {
        Some(allocate) => {
            let storage =
                allocate(memory_blocks * ARGON2_BLOCK_BYTES).ok_or(Error::MemoryAllocation)?;
            if storage.len() != memory_blocks {
                return Err(Error::MemoryAllocation);
            }
            Matrix::from_blocks(storage, a2.lanes, a2.lanelen)
        }
        None => Matrix::new(a2.lanes, a2.lanelen),
    };

    let mut h0 = h0(
        a2.lanes,
        context.out.len() as u32,
        context.m_cost,
        context.t_cost,
        ARGON2_VERSION,
        variant,
        context.pwd.as_deref().unwrap_or(&[]),
        context.salt,
        context.secret.as_deref().unwrap_or(&[]),
        context.ad,
    );

    // the absorbed secrets are no longer needed; wiping them here is an
    // observable effect on the caller's buffers
    if context.clear_password {
        if let Some(pwd) = context.pwd.as_deref_mut() {
            pwd.zeroize();
        }
    }
    if context.clear_secret {
        if let Some(secret) = context.secret.as_deref_mut() {
            secret.zeroize();
        }
    }

    a2.fill_matrix(&mut blocks, &h0);
    h0.zeroize();
    a2.finalize(context.out, &blocks);

    if context.clear_memory {
        blocks.wipe();
    }
    if let Some(free) = context.free_cbk.as_mut() {
        free(blocks.take_blocks());
    }
    Ok(())
}

/// Convenience wrapper around Argon2i for the majority of password/salt
/// hashing use cases.
pub fn argon2i_simple(password: &str, salt: &str) -> Result<[u8; defaults::LENGTH], Error> {
    let mut out = [0; defaults::LENGTH];
    let a2 = Argon2::default(Variant::Argon2i);
    a2.hash(&mut out, password.as_bytes(), salt.as_bytes(), &[], &[])?;
    Ok(out)
}

/// Convenience wrapper around Argon2d for the majority of password/salt
/// hashing use cases.
pub fn argon2d_simple(password: &str, salt: &str) -> Result<[u8; defaults::LENGTH], Error> {
    let mut out = [0; defaults::LENGTH];
    let a2 = Argon2::default(Variant::Argon2d);
    a2.hash(&mut out, password.as_bytes(), salt.as_bytes(), &[], &[])?;
    Ok(out)
}

/// The variable-length hash H': plain BLAKE2b below 64 bytes of output,
/// otherwise a chain of 64-byte digests overlapping by 32.
fn h_prime(out: &mut [u8], input: &[u8]) {
    if out.len() <= DEF_B2HASH_LEN {
        b2hash!(out; &len32(out), input);
    } else {
        let mut tmp = b2hash!(&len32(out), input);
        out[0..DEF_B2HASH_LEN].clone_from_slice(&tmp);
        let mut wr_at: usize = 32;

        while out.len() - wr_at > DEF_B2HASH_LEN {
            b2hash!(&mut tmp; &tmp);
            out[wr_at..wr_at + DEF_B2HASH_LEN].clone_from_slice(&tmp);
            wr_at += DEF_B2HASH_LEN / 2;
        }

        let len = out.len() - wr_at;
        b2hash!(&mut out[wr_at..wr_at + len]; &tmp);
        tmp.zeroize();
    }
}

/// Maps the pseudo-random word `j1` to a reference column, biased toward
/// recent blocks. All intermediate arithmetic is unsigned 64-bit; the
/// reference area size is at least 1 for every reachable position, so the
/// `r - 1` below cannot wrap.
fn index_alpha(
    pass: u32,
    lane: u32,
    slice: u32,
    lanes: u32,
    sliceidx: u32,
    slicelen: u32,
    j1: u32,
    j2: u32,
) -> u32 {
    let lanelen = slicelen * 4;
    let r: u32 = match (pass, slice, j2 % lanes == lane) {
        (0, 0, _) => sliceidx - 1,
        (0, _, false) => slice * slicelen - if sliceidx == 0 { 1 } else { 0 },
        (0, _, true) => slice * slicelen + sliceidx - 1,
        (_, _, false) => lanelen - slicelen - if sliceidx == 0 { 1 } else { 0 },
        (_, _, true) => lanelen - slicelen + sliceidx - 1,
    };

    let (r_, j1_) = (r as u64, j1 as u64);
    let relpos: u32 = (r_ - 1 - (r_ * (j1_ * j1_ >> 32) >> 32)) as u32;

    match (pass, slice) {
        (0, _) | (_, 3) => relpos % lanelen,
        _ => (slicelen * (slice + 1) + relpos) % lanelen,
    }
}

/// Counter-mode stream of pseudo-random `(j1, j2)` pairs for Argon2i,
/// produced 128 at a time by double compression of a parameter block.
struct Gen2i {
    arg: Block,
    pseudos: Block,
    idx: usize,
}

impl Gen2i {
    fn new(
        start_at: usize,
        pass: u32,
        lane: u32,
        slice: u32,
        totblocks: u32,
        totpasses: u32,
    ) -> Gen2i {
        let mut rv = Gen2i {
            arg: zero(),
            pseudos: zero(),
            idx: start_at,
        };
        let args = [
            pass,
            lane,
            slice,
            totblocks,
            totpasses,
            Variant::Argon2i as u32,
        ];
        for (k, &v) in rv.arg.words_mut().iter_mut().zip(args.iter()) {
            *k = u64::from(v);
        }
        rv.more();
        rv
    }

    fn more(&mut self) {
        self.arg[6] += 1;
        g_two(&mut self.pseudos, &self.arg);
    }

    fn nextj(&mut self) -> (u32, u32) {
        let rv = split_u64(self.pseudos[self.idx]);
        self.idx = (self.idx + 1) % per_block!(u64);
        if self.idx == 0 {
            self.more();
        }
        rv
    }
}
