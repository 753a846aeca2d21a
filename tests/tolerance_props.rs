use proptest::prelude::*;
use arcs_verify::{ closest_setpoint, resolve, Quantity, ToleranceSpec };

fn tolerance() -> impl Strategy<Value = ToleranceSpec>
{
    prop_oneof![
        (0.0..1.0f64).prop_map(|width| ToleranceSpec::Absolute(Quantity::volts(width))),
        (0.0..5.0f64).prop_map(ToleranceSpec::Percent),
        (0.0..5.0f64, 0.0..1e-3f64).prop_map(|(percent, floor)| ToleranceSpec::Formula {
            percent_of_value: percent,
            floor: Quantity::volts(floor),
        }),
    ]
}

proptest! {
    #[test]
    fn achieved_lies_within_its_limits(
        nominal in -250.0..250.0f64,
        step_exponent in -7i32..0,
        tolerance in tolerance(),
        readback in proptest::option::of(-250.0..250.0f64),
    )
    {
        let step = Quantity::volts(10f64.powi(step_exponent));
        let point = resolve(Quantity::volts(nominal), &tolerance, step, || readback.map(Quantity::volts));

        prop_assert!(point.lower.value() <= point.achieved.value());
        prop_assert!(point.achieved.value() <= point.upper.value());
        prop_assert_eq!(point.setpoint_estimated, readback.is_none());
    }

    #[test]
    fn representable_nominals_are_untouched(count in -200_000i64..200_000, step_exponent in -4i32..1)
    {
        let step = 10f64.powi(step_exponent);
        let nominal = count as f64 * step;

        prop_assert_eq!(closest_setpoint(nominal, step), nominal);

        let point = resolve(Quantity::volts(nominal), &ToleranceSpec::Percent(0.05), Quantity::volts(step), || None);
        prop_assert_eq!(point.achieved.value(), nominal);
    }

    #[test]
    fn rounding_is_idempotent(nominal in -250.0..250.0f64, step_exponent in -6i32..0)
    {
        let step = 10f64.powi(step_exponent);
        let once = closest_setpoint(nominal, step);

        prop_assert_eq!(closest_setpoint(once, step), once);
        prop_assert!((once - nominal).abs() <= step / 2.0 + step * 1e-6);
    }

    #[test]
    fn percent_width_tracks_the_achieved_value(
        nominal in 0.1..200.0f64,
        percent in 0.001..1.0f64,
        ratio in 0.5..2.0f64,
    )
    {
        let tolerance = ToleranceSpec::Percent(percent);
        let step = Quantity::volts(1e-6);

        let at_nominal = resolve(Quantity::volts(nominal), &tolerance, step, || Some(Quantity::volts(nominal)));
        let shifted = resolve(Quantity::volts(nominal), &tolerance, step, || Some(Quantity::volts(nominal * ratio)));

        let expected = at_nominal.width() * ratio;
        prop_assert!((shifted.width() - expected).abs() <= expected * 1e-9);
    }
}
