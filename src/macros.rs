/// Continue a loop if a condition is met.
/// ```rs
/// for index in 0..10 {
/// 	continue_if!((index & 1) == 0);
/// 	println!("{}", index);
/// }
/// ```
/// Alternatively, you can also use a loop identifier:
/// ```rs
/// 'x: for x in 0..32 {
/// 	'y: for y in 0..32 {
/// 		continue_if!('x: y == 10);
/// 	}
/// }
/// ```
#[macro_export]
macro_rules! continue_if {
    ($($label:lifetime : )? $condition:expr) => {
        if $condition { continue $($label)?; }
    };
}

/// Return from a function if a condition is met.
/// ```rs
/// fn sample(items: &[u8]) -> Option<usize> {
/// 	return_if!(items.is_empty() => None);
/// 	Some(items.len())
/// }
/// ```
#[macro_export]
macro_rules! return_if {
    ($condition:expr $(=> $result:expr)?) => {
        if $condition {
            return $($result)?;
        }
    };
}

#[cfg(test)]
mod tests {
    #[test]
    fn flow_macros() {
        let mut odd = Vec::new();
        for i in 0..6 {
            continue_if!(i % 2 == 0);
            odd.push(i);
        }
        assert_eq!(odd, vec![1, 3, 5]);

        fn first_or_zero(items: &[i32]) -> i32 {
            return_if!(items.is_empty() => 0);
            items[0]
        }
        assert_eq!(first_or_zero(&[]), 0);
        assert_eq!(first_or_zero(&[7, 8]), 7);
    }
}
