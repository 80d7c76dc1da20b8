// Copyright (C) Microsoft Corporation. All rights reserved.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![allow(clippy::panic)]
#![deny(clippy::manual_assert)]

//! Cryptographically secure pseudorandom generator built on the SHAKE-256 XOF.
//!
//! A [`Csprng`] is constructed from seed material written through a
//! [`CsprngBuilder`]; every write is length-prefixed so distinct seed
//! sequences can never collide. [`Csprng::new`] seeds from the operating
//! system RNG (the `getrandom` crate).

use num_bigint::BigUint;
use num_traits::Zero;
use std::num::NonZeroUsize;
use tracing::error;

/// Accumulates seed material for a [`Csprng`].
pub struct CsprngBuilder {
    hasher: sha3::Shake256,
}

impl CsprngBuilder {
    /// Absorbs arbitrary bytes, length-prefixed.
    #[must_use]
    pub fn write_bytes<B: AsRef<[u8]>>(mut self, bytes: B) -> Self {
        use sha3::digest::Update;

        let bytes = bytes.as_ref();
        self.hasher.update(&(bytes.len() as u64).to_le_bytes());
        self.hasher.update(bytes);
        self
    }

    /// Absorbs a `u64`, length-prefixed.
    #[must_use]
    pub fn write_u64(self, u: u64) -> Self {
        self.write_bytes(u.to_le_bytes())
    }

    pub fn finish(self) -> Csprng {
        use sha3::digest::ExtendableOutput;

        Csprng(Box::new(self.hasher.finalize_xof()))
    }
}

pub struct Csprng(Box<dyn sha3::digest::XofReader + Send>);

impl Csprng {
    /// Starts a builder with the fixed domain-separation prefix already absorbed.
    pub fn build() -> CsprngBuilder {
        let builder = CsprngBuilder {
            hasher: sha3::Shake256::default(),
        };
        builder.write_bytes(b"chainvote::util::csprng")
    }

    /// Returns a generator seeded with 256 bits from the operating system RNG,
    /// plus a caller-supplied customization string.
    ///
    /// Panics if the OS RNG is unavailable or hands back all zeros. There is
    /// no way to continue securely from either condition.
    pub fn new(customization: &[u8]) -> Csprng {
        let mut seed = [0u8; 32];
        if let Err(e) = getrandom::fill(&mut seed) {
            let e = format!("Couldn't read {} bytes from the OS RNG: {e}", seed.len());
            error!("{e}");
            panic!("{e}");
        }

        // Simple sanity check for one failure mode of a faulty OS RNG.
        if seed.iter().all(|&b| b == 0) {
            let e = "The OS RNG produced 32 consecutive zero bytes. This is an error.";
            error!("{e}");
            panic!("{e}");
        }

        Csprng::build()
            .write_bytes(seed)
            .write_bytes(customization)
            .finish()
    }

    /// Returns a uniformly random `u8`.
    pub fn next_u8(&mut self) -> u8 {
        let mut buf = [0u8];
        self.0.read(&mut buf);
        buf[0]
    }

    /// Returns a uniformly random `u32`.
    pub fn next_u32(&mut self) -> u32 {
        let mut buf = [0u8; 4];
        self.0.read(&mut buf);
        u32::from_le_bytes(buf)
    }

    /// Returns a uniformly random `u64`.
    pub fn next_u64(&mut self) -> u64 {
        let mut buf = [0u8; 8];
        self.0.read(&mut buf);
        u64::from_le_bytes(buf)
    }

    /// Returns a uniformly random `u128`.
    pub fn next_u128(&mut self) -> u128 {
        let mut buf = [0u8; 16];
        self.0.read(&mut buf);
        u128::from_le_bytes(buf)
    }

    /// Returns a uniformly random `bool`.
    pub fn next_bool(&mut self) -> bool {
        self.next_u8() & 1 != 0
    }

    /// Fills `buf` with random bytes.
    pub fn fill_bytes(&mut self, buf: &mut [u8]) {
        self.0.read(buf);
    }

    /// Returns a random number chosen uniformly from `0 <= n < 2^bits`.
    pub fn next_biguint(&mut self, bits: NonZeroUsize) -> BigUint {
        self.next_biguint_impl(bits, false)
    }

    /// Returns a random number that requires exactly the specified number of
    /// bits to represent: the high bit of position `bits - 1` is guaranteed
    /// set, all lower positions are uniform.
    pub fn next_biguint_requiring_bits(&mut self, bits: NonZeroUsize) -> BigUint {
        self.next_biguint_impl(bits, true)
    }

    fn next_biguint_impl(&mut self, bits: NonZeroUsize, set_high_bit: bool) -> BigUint {
        let bits: usize = bits.get();

        let cnt_bytes = bits.div_ceil(8);
        let mut buf = vec![0; cnt_bytes];
        self.0.read(buf.as_mut_slice());

        if bits == 1 {
            buf[0] &= 1;
        } else {
            // Turn off any extra bits.
            let cnt_extra_bits = cnt_bytes * 8 - bits;
            if 0 < cnt_extra_bits {
                debug_assert!(cnt_extra_bits < 8);
                let mask = !(((1u8 << cnt_extra_bits) - 1) << (8 - cnt_extra_bits));
                buf[0] &= mask;
            }

            if set_high_bit {
                let high_bit_pos = (bits - 1) % 8;
                buf[0] |= 1u8 << high_bit_pos;
            }
        }

        BigUint::from_bytes_be(buf.as_slice())
    }

    /// Returns a random number uniformly from `0 <= n < end`.
    /// `end` must be greater than `0`.
    pub fn next_biguint_lt(&mut self, end: &BigUint) -> BigUint {
        assert!(!end.is_zero(), "end must be greater than 0");

        // The `.unwrap()` is justified here because `end` is nonzero.
        #[allow(clippy::unwrap_used)]
        let bits = NonZeroUsize::new(end.bits() as usize).unwrap();

        loop {
            let n = self.next_biguint(bits);
            if &n < end {
                break n;
            }
        }
    }

    /// Returns a random number uniformly from `start <= n < end`.
    /// `start` must be less than `end`.
    pub fn next_biguint_range(&mut self, start: &BigUint, end: &BigUint) -> BigUint {
        assert!(start < end, "`start` must be less than `end`");
        start + self.next_biguint_lt(&(end - start))
    }
}

impl rand::RngCore for Csprng {
    fn next_u32(&mut self) -> u32 {
        self.next_u32()
    }
    fn next_u64(&mut self) -> u64 {
        self.next_u64()
    }
    fn fill_bytes(&mut self, dest: &mut [u8]) {
        self.0.read(dest);
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use num_traits::One;

    #[test]
    fn deterministic_for_equal_seeds() {
        let mut a = Csprng::build().write_bytes(b"seed").write_u64(7).finish();
        let mut b = Csprng::build().write_bytes(b"seed").write_u64(7).finish();
        for _ in 0..16 {
            assert_eq!(a.next_u64(), b.next_u64());
        }
    }

    #[test]
    fn distinct_for_distinct_seeds() {
        let mut a = Csprng::build().write_bytes(b"seed-a").finish();
        let mut b = Csprng::build().write_bytes(b"seed-b").finish();
        assert_ne!(a.next_u128(), b.next_u128());
    }

    #[test]
    fn length_prefix_prevents_seed_sliding() {
        // ("ab", "c") and ("a", "bc") must not produce the same stream.
        let mut a = Csprng::build().write_bytes(b"ab").write_bytes(b"c").finish();
        let mut b = Csprng::build().write_bytes(b"a").write_bytes(b"bc").finish();
        assert_ne!(a.next_u128(), b.next_u128());
    }

    #[test]
    fn next_biguint_stays_below_bound() {
        let mut csprng = Csprng::build().write_bytes(b"bounds").finish();
        for bits in 1..100 {
            #[allow(clippy::unwrap_used)]
            let j = csprng.next_biguint(NonZeroUsize::new(bits).unwrap());
            assert!(j < (BigUint::one() << bits));
        }
    }

    #[test]
    fn next_biguint_requiring_bits_sets_high_bit() {
        let mut csprng = Csprng::build().write_bytes(b"high-bit").finish();
        for bits in 2..100 {
            #[allow(clippy::unwrap_used)]
            let j = csprng.next_biguint_requiring_bits(NonZeroUsize::new(bits).unwrap());
            let beg = BigUint::one() << (bits - 1);
            let end = BigUint::one() << bits;
            assert!((beg..end).contains(&j));
        }
    }

    #[test]
    fn next_biguint_lt_is_bounded() {
        let mut csprng = Csprng::build().write_bytes(b"lt").finish();
        for end in 1_usize..100 {
            let end: BigUint = end.into();
            assert!(csprng.next_biguint_lt(&end) < end);
        }
    }

    #[test]
    fn os_seeded_generators_disagree() {
        let mut a = Csprng::new(b"test");
        let mut b = Csprng::new(b"test");
        // 2^-128 false-failure probability.
        assert_ne!(a.next_u128(), b.next_u128());
    }
}
