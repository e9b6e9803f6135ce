//! SweepValues sequences bound to fixture parameters.

mod common;

use common::{assert_close, fixture, history_len, written_floats};
use daq_param::sweep_values::{run_sweep, SweepKey};
use daq_param::{AdaptiveSweep, DaqError, Slice, Sweep, Value};

fn floats(values: &[Value]) -> Vec<f64> {
    values.iter().filter_map(Value::as_f64).collect()
}

#[test]
fn test_mixed_keys_flatten_in_order() {
    let f = fixture();
    let c0 = f.gates.parameter("c0").unwrap();
    let sv = c0
        .sweep_keys(vec![
            SweepKey::from(Slice::new(0.0, 1.0, 0.5)),
            SweepKey::from(3.0),
            SweepKey::from(vec![Value::Float(-1.0), Value::Float(-2.0)]),
        ])
        .unwrap();
    assert_close(&floats(sv.values()), &[0.0, 0.5, 3.0, -1.0, -2.0]);
    assert!(sv.contains(&Value::Float(3.0)));
    assert_eq!(sv[1], Value::Float(0.5));
    assert_eq!(sv.name(), "c0");
}

#[test]
fn test_malformed_ranges_are_type_errors() {
    let f = fixture();
    let c0 = f.gates.parameter("c0").unwrap();
    for key in [
        SweepKey::from(0.0..1.0),
        SweepKey::from(0.0..),
        SweepKey::from(..1.0),
        SweepKey::from(..),
    ] {
        assert!(matches!(c0.sweep(key), Err(DaqError::TypeMismatch(_))));
    }
}

#[test]
fn test_out_of_range_slices_fail_before_expanding() {
    let f = fixture();
    let c0 = f.gates.parameter("c0").unwrap();

    for slice in [
        Slice::new(0.0, f64::INFINITY, 1.0),
        Slice::new(f64::NEG_INFINITY, 0.0, 1.0),
        Slice::new(20.0, 0.0, 1e-9),
    ] {
        let err = c0.sweep(slice).unwrap_err();
        assert!(matches!(err, DaqError::Validation { .. }), "{:?}", err);
    }
    // in range, but a billion points
    let err = c0.sweep(Slice::new(0.0, 1.0, 1e-9)).unwrap_err();
    assert!(matches!(err, DaqError::TypeMismatch(_)), "{:?}", err);
}

#[test]
fn test_reverse_twice_restores_order() {
    let f = fixture();
    let c0 = f.gates.parameter("c0").unwrap();
    let original = c0.sweep(Slice::new(-1.0, 1.0, 0.3)).unwrap();
    let mut sv = original.copy();
    sv.reverse();
    assert_eq!(sv.values(), original.reversed().values());
    sv.reverse();
    assert_eq!(sv.values(), original.values());
    assert_eq!(original.reversed().reversed().values(), original.values());
}

#[test]
fn test_concat_requires_same_parameter() {
    let f = fixture();
    let c0 = f.gates.parameter("c0").unwrap();
    let c1 = f.gates.parameter("c1").unwrap();

    let xs = c0.sweep(Slice::new(0.0, 1.0, 0.5)).unwrap();
    let ys = c0.sweep(vec![Value::Float(5.0), Value::Float(6.0)]).unwrap();
    let zs = c1.sweep(2.0).unwrap();

    let joined = (&xs + &ys).unwrap();
    let mut expected = xs.values().to_vec();
    expected.extend_from_slice(ys.values());
    assert_eq!(joined.values(), expected.as_slice());
    assert!(joined.is_bound_to(c0));

    assert!(matches!(&xs + &zs, Err(DaqError::TypeMismatch(_))));
    assert!(matches!(xs.concat(&zs), Err(DaqError::TypeMismatch(_))));
    let mut target = xs.copy();
    assert!(matches!(target.extend(&zs), Err(DaqError::TypeMismatch(_))));
    assert_eq!(target.values(), xs.values());

    // a clone of the same parameter is the same parameter
    let c0_again = c0.clone();
    let ws = c0_again.sweep(9.0).unwrap();
    assert_eq!((xs + ws).unwrap().len(), 3);
}

#[test]
fn test_copy_is_independent() {
    let f = fixture();
    let c0 = f.gates.parameter("c0").unwrap();
    let xs = c0.sweep(Slice::new(0.0, 1.0, 0.25)).unwrap();
    let before = xs.values().to_vec();

    let mut copy = xs.copy();
    copy.append(9.0).unwrap();
    copy.reverse();
    copy.extend(vec![Value::Float(1.0)]).unwrap();

    assert_eq!(xs.values(), before.as_slice());
    assert!(copy.is_bound_to(c0));
}

#[test]
fn test_append_and_extend_contracts() {
    let f = fixture();
    let c0 = f.gates.parameter("c0").unwrap();
    let mut xs = c0.sweep(1.0).unwrap();
    let other = c0.sweep(2.0).unwrap();

    assert!(matches!(xs.append(&other), Err(DaqError::TypeMismatch(_))));
    assert!(matches!(xs.extend(3.0), Err(DaqError::TypeMismatch(_))));
    assert!(matches!(xs.append(42.0), Err(DaqError::Validation { .. })));
    assert!(matches!(
        xs.extend(vec![Value::Float(4.0), Value::Float(40.0)]),
        Err(DaqError::Validation { .. })
    ));
    assert_eq!(xs.len(), 1);

    xs.extend(&other).unwrap();
    xs.append(3.0).unwrap();
    assert_close(&floats(xs.values()), &[1.0, 2.0, 3.0]);
}

#[test]
fn test_setter_comes_from_the_parameter() {
    let mut f = fixture();
    let sv = f.gates.parameter("c2").unwrap().sweep(Slice::new(0.0, 0.3, 0.1)).unwrap();
    assert!(sv.has_set() && sv.has_set_async());

    let start = history_len(&f.gates);
    for value in &sv {
        sv.set(value.clone()).unwrap();
    }
    assert_close(&written_floats(&f.gates, start), &[0.0, 0.1, 0.2]);

    f.gates.parameter_mut("c2").unwrap().remove_set();
    let later = f.gates.parameter("c2").unwrap().sweep(0.5).unwrap();
    assert!(!later.has_set());
    assert!(matches!(later.setter(), Err(DaqError::CapabilityAbsent { .. })));
    assert!(matches!(
        later.set(Value::Float(0.5)),
        Err(DaqError::CapabilityAbsent { .. })
    ));
    // captured before the removal
    sv.set(Value::Float(0.4)).unwrap();
}

#[test]
fn test_fixed_sweep_drives_measurement() {
    let f = fixture();
    f.source.set("amplitude", 1.0).unwrap();
    let meter = f.meter.parameter("amplitude").unwrap().clone();

    let mut sweep = f
        .gates
        .parameter("c1")
        .unwrap()
        .sweep(vec![Value::Float(1.0), Value::Float(2.0), Value::Float(3.0)])
        .unwrap()
        .into_sweep();
    let points = run_sweep(&mut sweep, |_| meter.get()).unwrap();
    let measured: Vec<f64> = points.iter().filter_map(|(_, m)| m.as_f64()).collect();
    assert_close(&measured, &[1.0, 4.0, 9.0]);
}

#[test]
fn test_adaptive_sweep_stays_within_bounds() {
    let f = fixture();
    f.source.set("amplitude", 1.0).unwrap();
    let meter = f.meter.parameter("amplitude").unwrap().clone();
    let c2 = f.gates.parameter("c2").unwrap();

    let mut sweep = AdaptiveSweep::new(c2, 0.0, 2.0, 0.5, Some(0.5), Some(0.05)).unwrap();
    assert_eq!(sweep.name(), "c2");
    let points = run_sweep(&mut sweep, |_| meter.get()).unwrap();

    let xs: Vec<f64> = points.iter().filter_map(|(x, _)| x.as_f64()).collect();
    assert_eq!(xs[0], 0.0);
    assert!((xs.last().copied().unwrap() - 2.0).abs() < 1e-9);
    for pair in xs.windows(2) {
        let step = pair[1] - pair[0];
        assert!(step > 0.0 && step <= 0.5 + 1e-9, "{:?}", xs);
    }
}
