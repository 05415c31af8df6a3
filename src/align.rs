/// Rounds `value` up to the next multiple of `align`, which must be a power of
/// two. With a single argument the metadata word width ([`TAG_WIDTH`]) is used.
///
/// [`TAG_WIDTH`]: crate::TAG_WIDTH
///
/// # Examples
///
/// ```rust
/// use tagalloc::align;
///
/// assert_eq!(align!(13), 16);
/// assert_eq!(align!(16), 16);
/// assert_eq!(align!(13, 8), 16);
/// ```
#[macro_export]
macro_rules! align {
  ($value:expr) => {
    $crate::align!($value, $crate::TAG_WIDTH)
  };
  ($value:expr, $align:expr) => {
    ($value + $align - 1) & !($align - 1)
  };
}

#[cfg(test)]
mod tests {
  use crate::TAG_WIDTH;

  #[test]
  fn test_rounds_up_to_tag_width() {
    let cases = [(0, 0), (1, 4), (3, 4), (4, 4), (5, 8), (18, 20), (32, 32), (4087, 4088)];

    for (size, expected) in cases {
      assert_eq!(align!(size), expected, "align!({size})");
      assert_eq!(align!(size) % TAG_WIDTH, 0);
    }
  }

  #[test]
  fn test_rounds_up_to_explicit_boundary() {
    assert_eq!(align!(0usize, 8), 0);
    assert_eq!(align!(1usize, 8), 8);
    assert_eq!(align!(9usize, 8), 16);
    assert_eq!(align!(4095usize, 4096), 4096);
  }
}
