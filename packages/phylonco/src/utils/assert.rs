/// Like `approx::assert_ulps_eq!`, but prints both sides with `{:#?}` on failure, which is easier to read for arrays.
#[macro_export]
macro_rules! pretty_assert_ulps_eq {
  ($left:expr, $right:expr, epsilon = $eps:expr) => {{
    let left = &$left;
    let right = &$right;
    if !approx::ulps_eq!(left, right, epsilon = $eps) {
      pretty_assertions::assert_eq!(format!("{:#?}", left), format!("{:#?}", right));
      std::panic!("assertion failed: values differ by more than epsilon = {}", $eps);
    }
  }};
  ($left:expr, $right:expr) => {{
    $crate::pretty_assert_ulps_eq!($left, $right, epsilon = f64::EPSILON)
  }};
}
