//! Batch-local missing value imputation

use crate::stats::median;

/// Fill every `None` in `column` with the median of the present values.
///
/// The median is computed over the slice passed in, so two different batches
/// can receive different fill values. A column with no present values at all
/// is filled with `0.0`. Returns the fill value that was used.
pub fn impute_median(column: &mut [Option<f64>]) -> f64 {
    let present: Vec<f64> = column.iter().flatten().copied().collect();
    let fill = median(&present).unwrap_or(0.0);

    for slot in column.iter_mut() {
        if slot.is_none() {
            *slot = Some(fill);
        }
    }

    fill
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fills_with_batch_median() {
        let mut column = vec![Some(1.0), None, Some(5.0), Some(3.0), None];
        let fill = impute_median(&mut column);
        assert_eq!(fill, 3.0);
        assert_eq!(
            column,
            vec![Some(1.0), Some(3.0), Some(5.0), Some(3.0), Some(3.0)]
        );
    }

    #[test]
    fn all_missing_falls_back_to_zero() {
        let mut column = vec![None, None];
        assert_eq!(impute_median(&mut column), 0.0);
        assert_eq!(column, vec![Some(0.0), Some(0.0)]);
    }

    #[test]
    fn different_batches_get_different_fills() {
        let mut a = vec![Some(10.0), None];
        let mut b = vec![Some(20.0), None];
        assert_ne!(impute_median(&mut a), impute_median(&mut b));
    }
}
