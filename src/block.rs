use std::ops::{BitXorAssign, Index, IndexMut};
use std::slice::Iter;
use zeroize::Zeroize;

pub const ARGON2_BLOCK_BYTES: usize = 1024;

macro_rules! per_block {
    (u8) => {
        $crate::block::ARGON2_BLOCK_BYTES
    };
    (u64) => {
        $crate::block::ARGON2_BLOCK_BYTES / 8
    };
}

/// A 1024-byte working block, viewed as 128 little-endian 64-bit words.
pub struct Block([u64; per_block!(u64)]);

impl Clone for Block {
    #[inline(always)]
    fn clone(&self) -> Self {
        Block(self.0)
    }
}

impl Default for Block {
    fn default() -> Self {
        zero()
    }
}

impl Block {
    /// The 128 words of the block, e.g. for inspecting storage handed back
    /// through a free callback.
    pub fn iter(&self) -> Iter<'_, u64> {
        self.0.iter()
    }

    pub(crate) fn words(&self) -> &[u64; per_block!(u64)] {
        &self.0
    }

    pub(crate) fn words_mut(&mut self) -> &mut [u64; per_block!(u64)] {
        &mut self.0
    }

    /// Writes the little-endian byte image of the block into `out`.
    pub(crate) fn store(&self, out: &mut [u8; per_block!(u8)]) {
        for (chunk, w) in out.chunks_exact_mut(8).zip(self.0.iter()) {
            chunk.clone_from_slice(&w.to_le_bytes());
        }
    }

    /// Reads the block back from its little-endian byte image.
    pub(crate) fn load(&mut self, bytes: &[u8; per_block!(u8)]) {
        let mut w = [0u8; 8];
        for (d, chunk) in self.0.iter_mut().zip(bytes.chunks_exact(8)) {
            w.clone_from_slice(chunk);
            *d = u64::from_le_bytes(w);
        }
    }
}

impl<'a> BitXorAssign<&'a Block> for Block {
    #[inline(always)]
    fn bitxor_assign(&mut self, rhs: &Block) {
        for (d, r) in self.0.iter_mut().zip(rhs.0.iter()) {
            *d ^= *r;
        }
    }
}

impl Index<usize> for Block {
    type Output = u64;
    #[inline(always)]
    fn index(&self, idx: usize) -> &u64 {
        &self.0[idx]
    }
}

impl IndexMut<usize> for Block {
    #[inline(always)]
    fn index_mut(&mut self, idx: usize) -> &mut u64 {
        &mut self.0[idx]
    }
}

impl Zeroize for Block {
    fn zeroize(&mut self) {
        self.0.zeroize();
    }
}

pub(crate) fn zero() -> Block {
    Block([0; per_block!(u64)])
}

/// The memory matrix: `lanes` rows of `lanelen` blocks, stored contiguously
/// and indexed by `(lane, column)`.
pub(crate) struct Matrix {
    blocks: Vec<Block>,
    lanes: u32,
    lanelen: u32,
}

impl Index<(u32, u32)> for Matrix {
    type Output = Block;

    #[inline(always)]
    fn index(&self, idx: (u32, u32)) -> &Block {
        let (row, col) = idx;
        debug_assert!(row < self.lanes && col < self.lanelen);
        unsafe {
            self.blocks
                .get_unchecked(row as usize * self.lanelen as usize + col as usize)
        }
    }
}

impl IndexMut<(u32, u32)> for Matrix {
    #[inline(always)]
    fn index_mut(&mut self, idx: (u32, u32)) -> &mut Block {
        let (row, col) = idx;
        debug_assert!(row < self.lanes && col < self.lanelen);
        unsafe {
            self.blocks
                .get_unchecked_mut(row as usize * self.lanelen as usize + col as usize)
        }
    }
}

impl Matrix {
    pub fn new(lanes: u32, lanelen: u32) -> Self {
        debug_assert!(lanes > 0 && lanelen > 0);
        Matrix {
            blocks: vec![zero(); lanelen as usize * lanes as usize],
            lanes,
            lanelen,
        }
    }

    /// Wraps caller-allocated storage. The blocks need not be zeroed: every
    /// block is written before it is first read.
    pub fn from_blocks(blocks: Vec<Block>, lanes: u32, lanelen: u32) -> Self {
        debug_assert!(blocks.len() == lanelen as usize * lanes as usize);
        Matrix {
            blocks,
            lanes,
            lanelen,
        }
    }

    /// Borrows the write target plus the two read sources of one compression
    /// step at once. The write index must differ from both read indices.
    pub fn get3(
        &mut self,
        wr: (u32, u32),
        rd0: (u32, u32),
        rd1: (u32, u32),
    ) -> (&mut Block, &Block, &Block) {
        assert!(wr != rd0 && wr != rd1);
        let p: *mut Matrix = self;
        unsafe { (&mut (&mut *p)[wr], &(&*p)[rd0], &(&*p)[rd1]) }
    }

    /// Hands out an extra mutable alias for a worker thread.
    ///
    /// # Safety
    /// Callers must uphold the slice discipline: concurrent holders may only
    /// write within their own lane's current segment and may only read
    /// columns no other holder is writing.
    pub unsafe fn mut_ref<'a>(&mut self) -> &'a mut Self {
        &mut *(self as *mut Self)
    }

    // Xors the Blocks of column `col` together.
    pub fn xor_column(&self, col: u32) -> Block {
        debug_assert!(col < self.lanelen);
        let mut rv = self[(0, col)].clone();
        for row in 1..self.lanes {
            rv ^= &self[(row, col)];
        }
        rv
    }

    pub fn wipe(&mut self) {
        for blk in self.blocks.iter_mut() {
            blk.zeroize();
        }
    }

    /// Detaches the underlying storage, e.g. to return it through a caller's
    /// free callback. The emptied matrix wipes nothing on drop.
    pub fn take_blocks(&mut self) -> Vec<Block> {
        std::mem::take(&mut self.blocks)
    }
}

impl Drop for Matrix {
    fn drop(&mut self) {
        self.wipe();
    }
}

#[cfg(test)]
mod tests {
    use super::{zero, Matrix};

    #[test]
    fn store_load_round_trips_little_endian() {
        let mut b = zero();
        b[0] = 0x0123_4567_89ab_cdef;
        b[127] = 1;
        let mut bytes = [0u8; 1024];
        b.store(&mut bytes);
        assert_eq!(&bytes[..8], &[0xef, 0xcd, 0xab, 0x89, 0x67, 0x45, 0x23, 0x01]);

        let mut c = zero();
        c.load(&bytes);
        assert_eq!(c[0], b[0]);
        assert_eq!(c[127], 1);
    }

    #[test]
    fn xor_column_folds_all_lanes() {
        let mut m = Matrix::new(3, 8);
        m[(0, 7)][0] = 0b001;
        m[(1, 7)][0] = 0b011;
        m[(2, 7)][0] = 0b111;
        let folded = m.xor_column(7);
        assert_eq!(folded[0], 0b101);
        assert_eq!(folded[1], 0);
    }

    #[test]
    fn get3_yields_disjoint_blocks() {
        let mut m = Matrix::new(2, 8);
        m[(1, 3)][0] = 7;
        m[(0, 2)][0] = 9;
        let (wr, rd, refblk) = m.get3((0, 4), (0, 2), (1, 3));
        wr[0] = rd[0] ^ refblk[0];
        assert_eq!(m[(0, 4)][0], 14);
    }

    #[test]
    fn take_blocks_skips_drop_wipe() {
        let mut m = Matrix::new(1, 8);
        m[(0, 5)][0] = 42;
        let blocks = m.take_blocks();
        drop(m);
        assert_eq!(blocks[5][0], 42);
    }

    #[test]
    fn wipe_zeroes_every_block() {
        let mut m = Matrix::new(2, 8);
        for lane in 0..2 {
            for col in 0..8 {
                m[(lane, col)][3] = 0xffff_ffff_ffff_ffff;
            }
        }
        m.wipe();
        for lane in 0..2 {
            for col in 0..8 {
                assert!(m[(lane, col)].iter().all(|&w| w == 0));
            }
        }
    }
}
