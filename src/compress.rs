//! The compression function G: a keyless permutation over 1024-byte blocks
//! built from BLAKE2b round transformations with 32-bit multiplications
//! mixed in.

use crate::block::Block;

macro_rules! g_blake2b {
    ($a: expr, $b: expr, $c: expr, $d: expr) => {
        $a = $a.wrapping_add($b).wrapping_add(lower_mult($a, $b));
        $d = ($d ^ $a).rotate_right(32);
        $c = $c.wrapping_add($d).wrapping_add(lower_mult($c, $d));
        $b = ($b ^ $c).rotate_right(24);
        $a = $a.wrapping_add($b).wrapping_add(lower_mult($a, $b));
        $d = ($d ^ $a).rotate_right(16);
        $c = $c.wrapping_add($d).wrapping_add(lower_mult($c, $d));
        $b = ($b ^ $c).rotate_right(63);
    };
}

macro_rules! p {
    ($v0: expr, $v1: expr, $v2: expr, $v3: expr,
     $v4: expr, $v5: expr, $v6: expr, $v7: expr,
     $v8: expr, $v9: expr, $v10: expr, $v11: expr,
     $v12: expr, $v13: expr, $v14: expr, $v15: expr) => {
        g_blake2b!($v0, $v4, $v8, $v12); g_blake2b!($v1, $v5, $v9, $v13);
        g_blake2b!($v2, $v6, $v10, $v14); g_blake2b!($v3, $v7, $v11, $v15);
        g_blake2b!($v0, $v5, $v10, $v15); g_blake2b!($v1, $v6, $v11, $v12);
        g_blake2b!($v2, $v7, $v8, $v13); g_blake2b!($v3, $v4, $v9, $v14);
    };
}

// g x y = let r = x `xor` y in p_col (p_row r) `xor` r
pub(crate) fn g(dest: &mut Block, lhs: &Block, rhs: &Block) {
    let d = dest.words_mut();
    let (l, r) = (lhs.words(), rhs.words());

    for (d, (l, r)) in d.iter_mut().zip(l.iter().zip(r.iter())) {
        *d = *l ^ *r;
    }

    for row in 0..8 {
        p_row(row, d);
    }
    // column-wise, 2x u64 groups
    for col in 0..8 {
        p_col(col, d);
    }

    for (d, (l, r)) in d.iter_mut().zip(l.iter().zip(r.iter())) {
        *d = *d ^ *l ^ *r;
    }
}

/// ``` g2 y = let g' y = g 0 y in g' . g' ```
/// Used for data-independent index generation.
pub(crate) fn g_two(dest: &mut Block, src: &Block) {
    let d = dest.words_mut();
    let s = src.words();
    *d = *s;

    for row in 0..8 {
        p_row(row, d);
    }
    for col in 0..8 {
        p_col(col, d);
    }

    for (d, s) in d.iter_mut().zip(s.iter()) {
        *d ^= *s;
    }

    let tmp = *d;

    for row in 0..8 {
        p_row(row, d);
    }
    for col in 0..8 {
        p_col(col, d);
    }

    for (d, t) in d.iter_mut().zip(tmp.iter()) {
        *d ^= *t;
    }
}

#[rustfmt::skip]
fn p_row(row: usize, b: &mut [u64; per_block!(u64)]) {
    p!(b[16 * row + 0], b[16 * row + 1], b[16 * row + 2], b[16 * row + 3],
       b[16 * row + 4], b[16 * row + 5], b[16 * row + 6], b[16 * row + 7],
       b[16 * row + 8], b[16 * row + 9], b[16 * row + 10], b[16 * row + 11],
       b[16 * row + 12], b[16 * row + 13], b[16 * row + 14], b[16 * row + 15]);
}

#[rustfmt::skip]
fn p_col(col: usize, b: &mut [u64; per_block!(u64)]) {
    p!(b[2 * col + 16 * 0], b[2 * col + 16 * 0 + 1],
       b[2 * col + 16 * 1], b[2 * col + 16 * 1 + 1],
       b[2 * col + 16 * 2], b[2 * col + 16 * 2 + 1],
       b[2 * col + 16 * 3], b[2 * col + 16 * 3 + 1],
       b[2 * col + 16 * 4], b[2 * col + 16 * 4 + 1],
       b[2 * col + 16 * 5], b[2 * col + 16 * 5 + 1],
       b[2 * col + 16 * 6], b[2 * col + 16 * 6 + 1],
       b[2 * col + 16 * 7], b[2 * col + 16 * 7 + 1]);
}

#[inline(always)]
fn lower_mult(a: u64, b: u64) -> u64 {
    fn lower32(k: u64) -> u64 {
        k & 0xffff_ffff
    }
    lower32(a).wrapping_mul(lower32(b)).wrapping_mul(2)
}

#[cfg(test)]
mod tests {
    use super::{g, g_two, lower_mult};
    use crate::block::zero;

    #[test]
    fn zero_is_a_fixed_point_of_g() {
        let mut dest = zero();
        let (a, b) = (zero(), zero());
        g(&mut dest, &a, &b);
        assert!(dest.iter().all(|&w| w == 0));
    }

    #[test]
    fn g_is_deterministic_and_diffuses() {
        let mut a = zero();
        a[0] = 1;
        let b = zero();

        let mut d0 = zero();
        let mut d1 = zero();
        g(&mut d0, &a, &b);
        g(&mut d1, &a, &b);
        assert!(d0.words() == d1.words());

        // a single input bit must touch most of the output
        let nonzero = d0.iter().filter(|&&w| w != 0).count();
        assert!(nonzero > 100);
    }

    #[test]
    fn g_two_differs_from_single_application() {
        let mut src = zero();
        src[6] = 1;
        let mut once = zero();
        let mut twice = zero();
        g(&mut once, &zero(), &src);
        g_two(&mut twice, &src);
        assert!(once.words() != twice.words());
    }

    #[test]
    fn lower_mult_uses_low_halves_only() {
        assert_eq!(lower_mult(0xffff_ffff_0000_0003, 0x5), 30);
    }
}
