//! Stepping helpers for sweeps.

use crate::error::{DaqError, DaqResult};
use crate::value::Value;

/// Values from `start` towards `stop` in increments of `|step|`, excluding
/// `stop` itself.
///
/// The direction comes from the endpoints, never from the sign of `step`, so
/// a positive step always works. A tiny tolerance keeps floating point noise
/// from adding a point that would land on `stop`. All-integer inputs stay
/// integers; anything else is stepped as `f64`.
///
/// ```rust,ignore
/// let xs = permissive_range(&0.1.into(), &0.6.into(), &0.2.into())?;
/// // [0.1, 0.3, 0.5]
/// ```
pub fn permissive_range(start: &Value, stop: &Value, step: &Value) -> DaqResult<Vec<Value>> {
    match (start, stop, step) {
        (Value::Int(a), Value::Int(b), Value::Int(s)) => int_range(*a, *b, *s),
        _ => {
            let (a, b, s) = match (start.as_f64(), stop.as_f64(), step.as_f64()) {
                (Some(a), Some(b), Some(s)) => (a, b, s),
                _ => {
                    return Err(DaqError::TypeMismatch(format!(
                        "cannot step from {} to {} by {}",
                        start, stop, step
                    )))
                }
            };
            float_range(a, b, s)
        }
    }
}

/// Most points a single range may expand to.
pub const MAX_RANGE_POINTS: usize = 1_000_000;

fn too_many_points(start: &dyn std::fmt::Display, stop: &dyn std::fmt::Display) -> DaqError {
    DaqError::Configuration(format!(
        "range from {} to {} exceeds {} points",
        start, stop, MAX_RANGE_POINTS
    ))
}

fn float_range(start: f64, stop: f64, step: f64) -> DaqResult<Vec<Value>> {
    if !(step.is_finite() && step != 0.0) {
        return Err(DaqError::Configuration(format!(
            "step must be a nonzero finite number, got {}",
            step
        )));
    }
    if !(start.is_finite() && stop.is_finite()) {
        return Err(DaqError::Configuration(format!(
            "cannot step from {} to {}, endpoints must be finite",
            start, stop
        )));
    }
    if start == stop {
        return Ok(Vec::new());
    }
    let signed_step = if stop > start { step.abs() } else { -step.abs() };
    // an overflowing span comes out infinite and fails the bound
    let count = ((stop - start) / signed_step - 1e-10).ceil().max(0.0);
    if count > MAX_RANGE_POINTS as f64 {
        return Err(too_many_points(&start, &stop));
    }
    Ok((0..count as usize)
        .map(|i| Value::Float(start + i as f64 * signed_step))
        .collect())
}

fn int_range(start: i64, stop: i64, step: i64) -> DaqResult<Vec<Value>> {
    let Some(step) = step.checked_abs().filter(|s| *s != 0) else {
        return Err(DaqError::Configuration(format!(
            "step must be a nonzero integer with a magnitude, got {}",
            step
        )));
    };
    let span = (i128::from(stop) - i128::from(start)).unsigned_abs();
    let count = span.div_ceil(step.unsigned_abs() as u128);
    if count > MAX_RANGE_POINTS as u128 {
        return Err(too_many_points(&start, &stop));
    }
    let signed_step = if stop > start { step } else { -step };
    let mut out = Vec::with_capacity(count as usize);
    let mut next = Some(start);
    while let Some(v) = next {
        if !((signed_step > 0 && v < stop) || (signed_step < 0 && v > stop)) {
            break;
        }
        out.push(Value::Int(v));
        next = v.checked_add(signed_step);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn floats(xs: &[Value]) -> Vec<f64> {
        xs.iter().filter_map(Value::as_f64).collect()
    }

    fn close(a: &[f64], b: &[f64]) -> bool {
        a.len() == b.len() && a.iter().zip(b).all(|(x, y)| (x - y).abs() < 1e-9)
    }

    #[test]
    fn test_exact_multiple_excludes_stop() {
        let xs = permissive_range(&0.0.into(), &0.5.into(), &0.1.into()).unwrap();
        assert!(close(&floats(&xs), &[0.0, 0.1, 0.2, 0.3, 0.4]));
    }

    #[test]
    fn test_partial_last_step() {
        let xs = permissive_range(&0.1.into(), &0.6.into(), &0.2.into()).unwrap();
        assert!(close(&floats(&xs), &[0.1, 0.3, 0.5]));
    }

    #[test]
    fn test_direction_from_endpoints() {
        let xs = permissive_range(&1.0.into(), &0.0.into(), &0.25.into()).unwrap();
        assert!(close(&floats(&xs), &[1.0, 0.75, 0.5, 0.25]));
        let xs = permissive_range(&1.0.into(), &0.0.into(), &(-0.25).into()).unwrap();
        assert_eq!(xs.len(), 4);
    }

    #[test]
    fn test_integer_range() {
        let xs = permissive_range(&Value::Int(0), &Value::Int(10), &Value::Int(3)).unwrap();
        assert_eq!(xs, vec![Value::Int(0), Value::Int(3), Value::Int(6), Value::Int(9)]);
        assert!(xs.iter().all(|v| matches!(v, Value::Int(_))));
    }

    #[test]
    fn test_degenerate_inputs() {
        assert!(permissive_range(&1.0.into(), &1.0.into(), &0.1.into())
            .unwrap()
            .is_empty());
        assert!(permissive_range(&0.0.into(), &1.0.into(), &0.0.into()).is_err());
        assert!(permissive_range(&"a".into(), &1.0.into(), &0.1.into()).is_err());
    }

    #[test]
    fn test_unbounded_float_ranges_are_rejected() {
        for (start, stop, step) in [
            (0.0, f64::INFINITY, 0.1),
            (f64::NEG_INFINITY, 0.0, 0.1),
            (0.0, f64::NAN, 0.1),
            (-f64::MAX, f64::MAX, 1.0),
            (0.0, 1.0, 1e-9),
        ] {
            let err = permissive_range(&start.into(), &stop.into(), &step.into()).unwrap_err();
            assert!(matches!(err, DaqError::Configuration(_)), "{} {} {}", start, stop, step);
        }
    }

    #[test]
    fn test_integer_range_near_the_limits() {
        let xs = permissive_range(
            &Value::Int(i64::MAX - 5),
            &Value::Int(i64::MAX),
            &Value::Int(10),
        )
        .unwrap();
        assert_eq!(xs, vec![Value::Int(i64::MAX - 5)]);

        let xs = permissive_range(
            &Value::Int(i64::MIN + 3),
            &Value::Int(i64::MIN),
            &Value::Int(2),
        )
        .unwrap();
        assert_eq!(xs, vec![Value::Int(i64::MIN + 3), Value::Int(i64::MIN + 1)]);

        assert!(permissive_range(&Value::Int(0), &Value::Int(1), &Value::Int(i64::MIN)).is_err());
        assert!(matches!(
            permissive_range(&Value::Int(i64::MIN), &Value::Int(i64::MAX), &Value::Int(1)),
            Err(DaqError::Configuration(_))
        ));
    }
}
