//! Byte-range copy, move, fill and compare.

use core::cmp::Ordering;

/// Copy the first `n` bytes of `src` into `dst`, front to back.
///
/// # Panics
///
/// Panics if either slice is shorter than `n`.
pub fn copy(dst: &mut [u8], src: &[u8], n: usize) {
    for (d, s) in dst[..n].iter_mut().zip(&src[..n]) {
        *d = *s;
    }
}

/// Move `n` bytes from `buf[src..]` to `buf[dst..]`; the ranges may overlap.
///
/// Copies front to back when the source lies after the destination and
/// back to front when it lies before, so no byte is read after it has been
/// overwritten.
///
/// # Panics
///
/// Panics if either range extends past the end of `buf`.
pub fn move_within(buf: &mut [u8], src: usize, dst: usize, n: usize) {
    assert!(
        src.checked_add(n).is_some_and(|end| end <= buf.len()),
        "source range {src}+{n} exceeds buffer of {} bytes",
        buf.len()
    );
    assert!(
        dst.checked_add(n).is_some_and(|end| end <= buf.len()),
        "destination range {dst}+{n} exceeds buffer of {} bytes",
        buf.len()
    );

    match src.cmp(&dst) {
        Ordering::Greater => {
            for i in 0..n {
                buf[dst + i] = buf[src + i];
            }
        }
        Ordering::Less => {
            for i in (0..n).rev() {
                buf[dst + i] = buf[src + i];
            }
        }
        Ordering::Equal => {}
    }
}

/// Set every byte of `dst` to `value`.
pub fn fill(dst: &mut [u8], value: u8) {
    for byte in dst.iter_mut() {
        *byte = value;
    }
}

/// Compare the first `n` bytes of `a` and `b` as unsigned values.
///
/// The first differing byte decides the result.
///
/// # Panics
///
/// Panics if either slice is shorter than `n`.
pub fn compare(a: &[u8], b: &[u8], n: usize) -> Ordering {
    for (x, y) in a[..n].iter().zip(&b[..n]) {
        if x != y {
            return x.cmp(y);
        }
    }
    Ordering::Equal
}
