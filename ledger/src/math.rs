//! 256-bit intermediate arithmetic for pool shares.
//!
//! A pool share is `pool × stake / total`. With 18-decimal amounts the product
//! of a token pool and a wei stake exceeds `u128` long before either factor
//! does, so the product is held in 256 bits.

/// `floor(a × b / c)`, or `None` if `c == 0` or the quotient exceeds `u128`.
pub fn mul_div(a: u128, b: u128, c: u128) -> Option<u128> {
    if c == 0 {
        return None;
    }
    let (hi, lo) = widening_mul(a, b);
    div_wide(hi, lo, c)
}

/// 128×128 → 256-bit multiply, returned as `(hi, lo)`.
fn widening_mul(a: u128, b: u128) -> (u128, u128) {
    const MASK: u128 = 0xFFFF_FFFF_FFFF_FFFF;
    let (a_lo, a_hi) = (a & MASK, a >> 64);
    let (b_lo, b_hi) = (b & MASK, b >> 64);

    let ll = a_lo * b_lo;
    let lh = a_lo * b_hi;
    let hl = a_hi * b_lo;
    let hh = a_hi * b_hi;

    let (mid, mid_carry) = lh.overflowing_add(hl);
    let (lo, lo_carry) = ll.overflowing_add(mid << 64);

    let hi = hh
        .wrapping_add(mid >> 64)
        .wrapping_add(if mid_carry { 1u128 << 64 } else { 0 })
        .wrapping_add(u128::from(lo_carry));

    (hi, lo)
}

/// Binary long division of the 256-bit `(hi, lo)` by `divisor`.
fn div_wide(hi: u128, lo: u128, divisor: u128) -> Option<u128> {
    if hi == 0 {
        return Some(lo / divisor);
    }
    if hi >= divisor {
        return None;
    }

    // rem < divisor holds at the top of every iteration.
    let mut rem = hi;
    let mut quotient: u128 = 0;
    for i in (0u32..128).rev() {
        let carry = rem >> 127;
        rem = (rem << 1) | ((lo >> i) & 1);
        quotient <<= 1;
        // With carry set the true remainder is rem + 2^128, which exceeds divisor.
        if carry > 0 || rem >= divisor {
            rem = rem.wrapping_sub(divisor);
            quotient |= 1;
        }
    }
    Some(quotient)
}
