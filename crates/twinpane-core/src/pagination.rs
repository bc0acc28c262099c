use std::ops::Range;

pub const DEFAULT_PAGE_SIZE: usize = 6;
pub const PAGE_WINDOW: usize = 5;

pub fn total_pages(
  count: usize,
  page_size: usize
) -> usize {
  if page_size == 0 {
    return 0;
  }
  count.div_ceil(page_size)
}

/// Clamps into `[1, total]`. With no pages the result is 1.
pub fn clamp_page(
  page: i64,
  total: usize
) -> usize {
  let upper = total.max(1) as i64;
  page.clamp(1, upper) as usize
}

/// Index range of `page` (1-based) inside a list of `count` items.
pub fn page_bounds(
  page: usize,
  page_size: usize,
  count: usize
) -> Range<usize> {
  let start = page
    .saturating_sub(1)
    .saturating_mul(page_size)
    .min(count);
  let end = start
    .saturating_add(page_size)
    .min(count);
  start..end
}

/// Page numbers to show as controls, at most `width` of them, kept around
/// `current` without running past either end.
pub fn page_window(
  current: usize,
  total: usize,
  width: usize
) -> Vec<usize> {
  if total <= width {
    return (1..=total).collect();
  }

  let half = width / 2;
  let first = if current <= half + 1 {
    1
  } else if current + half >= total {
    total + 1 - width
  } else {
    current - half
  };

  (first..first + width).collect()
}

#[cfg(test)]
mod tests {
  use super::{
    DEFAULT_PAGE_SIZE,
    PAGE_WINDOW,
    clamp_page,
    page_bounds,
    page_window,
    total_pages
  };

  #[test]
  fn total_pages_rounds_up() {
    assert_eq!(
      total_pages(0, DEFAULT_PAGE_SIZE),
      0
    );
    assert_eq!(
      total_pages(6, DEFAULT_PAGE_SIZE),
      1
    );
    assert_eq!(
      total_pages(14, DEFAULT_PAGE_SIZE),
      3
    );
    assert_eq!(
      total_pages(
        100,
        DEFAULT_PAGE_SIZE
      ),
      17
    );
  }

  #[test]
  fn clamp_keeps_page_in_range() {
    assert_eq!(clamp_page(-4, 3), 1);
    assert_eq!(clamp_page(0, 3), 1);
    assert_eq!(clamp_page(2, 3), 2);
    assert_eq!(clamp_page(99, 3), 3);
    assert_eq!(clamp_page(7, 0), 1);
  }

  #[test]
  fn bounds_slice_last_partial_page() {
    assert_eq!(
      page_bounds(1, 6, 14),
      0..6
    );
    assert_eq!(
      page_bounds(3, 6, 14),
      12..14
    );
    assert_eq!(
      page_bounds(4, 6, 14),
      14..14
    );
    assert_eq!(
      page_bounds(1, 6, 0),
      0..0
    );
  }

  #[test]
  fn window_shows_everything_when_small()
  {
    assert_eq!(
      page_window(2, 3, PAGE_WINDOW),
      vec![1, 2, 3]
    );
    assert_eq!(
      page_window(5, 5, PAGE_WINDOW),
      vec![1, 2, 3, 4, 5]
    );
  }

  #[test]
  fn window_pins_to_edges_and_slides()
  {
    let total = 17;
    for current in 1..=3 {
      assert_eq!(
        page_window(
          current,
          total,
          PAGE_WINDOW
        ),
        vec![1, 2, 3, 4, 5]
      );
    }
    assert_eq!(
      page_window(4, total, PAGE_WINDOW),
      vec![2, 3, 4, 5, 6]
    );
    assert_eq!(
      page_window(9, total, PAGE_WINDOW),
      vec![7, 8, 9, 10, 11]
    );
    for current in 15..=17 {
      assert_eq!(
        page_window(
          current,
          total,
          PAGE_WINDOW
        ),
        vec![13, 14, 15, 16, 17]
      );
    }
    assert_eq!(
      page_window(14, total, PAGE_WINDOW),
      vec![12, 13, 14, 15, 16]
    );
  }
}
