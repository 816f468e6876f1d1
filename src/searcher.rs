//! Amortized search of the two structural bytes of a line: the delimiter and
//! the quote char.
//!
//! Contrary to `memchr2_iter`, a move mask containing several matches is kept
//! and consumed progressively on subsequent calls, instead of restarting a
//! search right after the previous match. The results are exactly the same as
//! the scalar search.
use std::iter::FusedIterator;

#[inline(always)]
unsafe fn distance(current: *const u8, origin: *const u8) -> usize {
    current.offset_from(origin) as usize
}

#[inline(always)]
fn remaining(current: *const u8, end: *const u8) -> usize {
    (end as usize).saturating_sub(current as usize)
}

const STEP: usize = 16;

#[cfg(target_arch = "x86_64")]
mod x86_64 {
    use core::arch::x86_64::{
        __m128i, _mm_cmpeq_epi8, _mm_loadu_si128, _mm_movemask_epi8, _mm_or_si128, _mm_set1_epi8,
    };
    use std::marker::PhantomData;

    use super::{distance, remaining, STEP};

    #[inline(always)]
    fn first_offset(mask: u32) -> usize {
        mask.trailing_zeros() as usize
    }

    #[inline(always)]
    fn clear_least_significant_bit(mask: u32) -> u32 {
        mask & (mask - 1)
    }

    #[derive(Debug, Clone, Copy)]
    pub struct SSE2Searcher {
        n1: u8,
        n2: u8,
        v1: __m128i,
        v2: __m128i,
    }

    impl SSE2Searcher {
        #[inline]
        pub unsafe fn new(n1: u8, n2: u8) -> Self {
            Self {
                n1,
                n2,
                v1: _mm_set1_epi8(n1 as i8),
                v2: _mm_set1_epi8(n2 as i8),
            }
        }

        #[inline(always)]
        pub fn iter<'s, 'h>(&'s self, haystack: &'h [u8]) -> SSE2Indices<'s, 'h> {
            let ptr = haystack.as_ptr();

            SSE2Indices {
                searcher: self,
                haystack: PhantomData,
                start: ptr,
                end: ptr.wrapping_add(haystack.len()),
                current: ptr,
                mask: 0,
            }
        }
    }

    #[derive(Debug)]
    pub struct SSE2Indices<'s, 'h> {
        searcher: &'s SSE2Searcher,
        haystack: PhantomData<&'h [u8]>,
        start: *const u8,
        end: *const u8,
        current: *const u8,
        mask: u32,
    }

    impl SSE2Indices<'_, '_> {
        pub unsafe fn next(&mut self) -> Option<usize> {
            let mut mask = self.mask;
            let mut current = self.current;
            let start = self.start;

            'main: loop {
                // Consuming what is left of the current move mask
                if mask != 0 {
                    let offset = current.sub(STEP).add(first_offset(mask));
                    self.mask = clear_least_significant_bit(mask);
                    self.current = current;

                    return Some(distance(offset, start));
                }

                while remaining(current, self.end) >= STEP {
                    let chunk = _mm_loadu_si128(current as *const __m128i);
                    let cmp1 = _mm_cmpeq_epi8(chunk, self.searcher.v1);
                    let cmp2 = _mm_cmpeq_epi8(chunk, self.searcher.v2);

                    mask = _mm_movemask_epi8(_mm_or_si128(cmp1, cmp2)) as u32;
                    current = current.add(STEP);

                    if mask != 0 {
                        continue 'main;
                    }
                }

                // Tail
                while current < self.end {
                    if *current == self.searcher.n1 || *current == self.searcher.n2 {
                        let offset = distance(current, start);
                        self.mask = 0;
                        self.current = current.add(1);
                        return Some(offset);
                    }
                    current = current.add(1);
                }

                self.mask = 0;
                self.current = current;

                return None;
            }
        }
    }
}

#[cfg(target_arch = "aarch64")]
mod aarch64 {
    use core::arch::aarch64::{
        uint8x16_t, vceqq_u8, vdupq_n_u8, vget_lane_u64, vld1q_u8, vorrq_u8, vreinterpret_u64_u8,
        vreinterpretq_u16_u8, vshrn_n_u16,
    };
    use std::marker::PhantomData;

    use super::{distance, remaining, STEP};

    #[inline(always)]
    unsafe fn neon_movemask(v: uint8x16_t) -> u64 {
        let asu16s = vreinterpretq_u16_u8(v);
        let mask = vshrn_n_u16(asu16s, 4);
        let asu64 = vreinterpret_u64_u8(mask);
        let scalar64 = vget_lane_u64(asu64, 0);

        scalar64 & 0x8888888888888888
    }

    #[inline(always)]
    fn first_offset(mask: u64) -> usize {
        (mask.trailing_zeros() >> 2) as usize
    }

    #[inline(always)]
    fn clear_least_significant_bit(mask: u64) -> u64 {
        mask & (mask - 1)
    }

    #[derive(Debug, Clone, Copy)]
    pub struct NeonSearcher {
        n1: u8,
        n2: u8,
        v1: uint8x16_t,
        v2: uint8x16_t,
    }

    impl NeonSearcher {
        #[inline]
        pub unsafe fn new(n1: u8, n2: u8) -> Self {
            Self {
                n1,
                n2,
                v1: vdupq_n_u8(n1),
                v2: vdupq_n_u8(n2),
            }
        }

        #[inline(always)]
        pub fn iter<'s, 'h>(&'s self, haystack: &'h [u8]) -> NeonIndices<'s, 'h> {
            let ptr = haystack.as_ptr();

            NeonIndices {
                searcher: self,
                haystack: PhantomData,
                start: ptr,
                end: ptr.wrapping_add(haystack.len()),
                current: ptr,
                mask: 0,
            }
        }
    }

    #[derive(Debug)]
    pub struct NeonIndices<'s, 'h> {
        searcher: &'s NeonSearcher,
        haystack: PhantomData<&'h [u8]>,
        start: *const u8,
        end: *const u8,
        current: *const u8,
        mask: u64,
    }

    impl NeonIndices<'_, '_> {
        pub unsafe fn next(&mut self) -> Option<usize> {
            let mut mask = self.mask;
            let mut current = self.current;
            let start = self.start;

            'main: loop {
                if mask != 0 {
                    let offset = current.sub(STEP).add(first_offset(mask));
                    self.mask = clear_least_significant_bit(mask);
                    self.current = current;

                    return Some(distance(offset, start));
                }

                while remaining(current, self.end) >= STEP {
                    let chunk = vld1q_u8(current);
                    let cmp1 = vceqq_u8(chunk, self.searcher.v1);
                    let cmp2 = vceqq_u8(chunk, self.searcher.v2);

                    mask = neon_movemask(vorrq_u8(cmp1, cmp2));
                    current = current.add(STEP);

                    if mask != 0 {
                        continue 'main;
                    }
                }

                while current < self.end {
                    if *current == self.searcher.n1 || *current == self.searcher.n2 {
                        let offset = distance(current, start);
                        self.mask = 0;
                        self.current = current.add(1);
                        return Some(offset);
                    }
                    current = current.add(1);
                }

                self.mask = 0;
                self.current = current;

                return None;
            }
        }
    }
}

/// Returns the SIMD instructions set used by this crate's amortized
/// searcher.
///
/// Note that `memchr` routines, also used by this crate, might use
/// different instruction sets.
pub fn searcher_simd_instructions() -> &'static str {
    #[cfg(target_arch = "x86_64")]
    {
        "sse2"
    }

    #[cfg(target_arch = "aarch64")]
    {
        "neon"
    }

    #[cfg(not(any(target_arch = "x86_64", target_arch = "aarch64")))]
    {
        "none"
    }
}

/// Finds every occurrence of either of two bytes in a haystack.
#[derive(Debug, Clone, Copy)]
pub struct Searcher {
    #[cfg(target_arch = "x86_64")]
    inner: x86_64::SSE2Searcher,

    #[cfg(target_arch = "aarch64")]
    inner: aarch64::NeonSearcher,

    #[cfg(not(any(target_arch = "x86_64", target_arch = "aarch64")))]
    inner: memchr::arch::all::memchr::Two,
}

impl Searcher {
    #[inline(always)]
    pub fn new(n1: u8, n2: u8) -> Self {
        // SAFETY: sse2 & neon are part of the baseline of their target_arch.
        #[cfg(target_arch = "x86_64")]
        {
            unsafe {
                Self {
                    inner: x86_64::SSE2Searcher::new(n1, n2),
                }
            }
        }

        #[cfg(target_arch = "aarch64")]
        {
            unsafe {
                Self {
                    inner: aarch64::NeonSearcher::new(n1, n2),
                }
            }
        }

        #[cfg(not(any(target_arch = "x86_64", target_arch = "aarch64")))]
        {
            Self {
                inner: memchr::arch::all::memchr::Two::new(n1, n2),
            }
        }
    }

    #[inline(always)]
    pub fn search<'s, 'h>(&'s self, haystack: &'h [u8]) -> Indices<'s, 'h> {
        Indices {
            inner: self.inner.iter(haystack),
        }
    }
}

/// Iterator over the offsets found by a [`Searcher`].
#[derive(Debug)]
pub struct Indices<'s, 'h> {
    #[cfg(target_arch = "x86_64")]
    inner: x86_64::SSE2Indices<'s, 'h>,

    #[cfg(target_arch = "aarch64")]
    inner: aarch64::NeonIndices<'s, 'h>,

    #[cfg(not(any(target_arch = "x86_64", target_arch = "aarch64")))]
    inner: memchr::arch::all::memchr::TwoIter<'s, 'h>,
}

impl FusedIterator for Indices<'_, '_> {}

impl Iterator for Indices<'_, '_> {
    type Item = usize;

    #[inline(always)]
    fn next(&mut self) -> Option<Self::Item> {
        #[cfg(any(target_arch = "x86_64", target_arch = "aarch64"))]
        {
            // SAFETY: pointers never leave the bounds of the borrowed haystack.
            unsafe { self.inner.next() }
        }

        #[cfg(not(any(target_arch = "x86_64", target_arch = "aarch64")))]
        {
            self.inner.next()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use memchr::arch::all::memchr::Two;
    use proptest::prelude::*;

    static TEST_STRING: &[u8] = b"name,\"surname\",age,color,oper\n,\n,\nation,punctuation\nname,surname,age,color,operation,punctuation";
    static TEST_STRING_OFFSETS: &[usize; 14] = &[4, 5, 13, 14, 18, 24, 30, 32, 39, 56, 64, 68, 74, 84];

    fn scalar_split(haystack: &[u8]) -> Vec<usize> {
        Two::new(b',', b'"').iter(haystack).collect()
    }

    fn split(haystack: &[u8]) -> Vec<usize> {
        let searcher = Searcher::new(b',', b'"');
        searcher.search(haystack).collect()
    }

    #[test]
    fn test_scalar_searcher() {
        assert_eq!(scalar_split(TEST_STRING), TEST_STRING_OFFSETS);
    }

    #[test]
    fn test_searcher() {
        assert_eq!(split(TEST_STRING), TEST_STRING_OFFSETS);

        // Empty
        assert!(split(b"").is_empty());

        // Not found at all
        assert!(split("b".repeat(75).as_bytes()).is_empty());

        // Regular
        assert_eq!(split("b,".repeat(75).as_bytes()).len(), 75);

        // Exactly 64
        assert_eq!(split("b,".repeat(64).as_bytes()).len(), 64);

        // Less than 32
        assert_eq!(split("b,".repeat(25).as_bytes()).len(), 25);

        // Less than 16
        assert_eq!(split("b,".repeat(7).as_bytes()).len(), 7);

        // Every byte is a match
        assert_eq!(split(",\"".repeat(40).as_bytes()).len(), 80);
    }

    #[test]
    fn test_searcher_is_fused() {
        let searcher = Searcher::new(b',', b'"');
        let mut indices = searcher.search(b"a,b");

        assert_eq!(indices.next(), Some(1));
        assert_eq!(indices.next(), None);
        assert_eq!(indices.next(), None);
    }

    proptest! {
        #[test]
        fn searcher_matches_scalar(
            bytes in proptest::collection::vec(
                prop_oneof![Just(b','), Just(b'"'), Just(b'a'), any::<u8>()],
                0..200,
            )
        ) {
            prop_assert_eq!(split(&bytes), scalar_split(&bytes));
        }
    }
}
