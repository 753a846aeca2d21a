//! Closest-value setpoint resolution and tolerance windows
//!
//! When a source cannot hit the manual's nominal exactly, the point is verified at the closest
//! value it _can_ produce and the limits follow the value actually achieved. Judging a quantized
//! source against `nominal ± tolerance(nominal)` would fail instruments for their own resolution,
//! so the window is always `achieved ± tolerance(achieved)`.

use serde::{ Deserialize, Serialize };
use crate::units::{ Quantity, QuantityKind };

/// Fraction of a step within which a value counts as sitting on a step or exactly between two
const STEP_EPSILON: f64 = 1e-9;

/// How wide the acceptance window around a value is
///
/// Every variant describes a symmetric, non-negative half-width.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToleranceSpec
{
    /// A fixed half-width
    Absolute(Quantity),
    /// A percentage of the value
    Percent(f64),
    /// The manual's accuracy formula: a percentage of the value plus a fixed floor
    Formula
    {
        percent_of_value: f64,
        floor: Quantity,
    },
}

impl ToleranceSpec
{
    /// Converts a manual row's published low/high limits into a fixed half-width
    ///
    /// The published tables list limits already evaluated at the nominal. The nearer of the two
    /// limits sets the half-width, so the window re-centred on the achieved value is never looser
    /// than the manual on either side. Limits that do not bracket the nominal give a negative
    /// half-width, which [`ToleranceSpec::check`] rejects.
    pub fn from_limits(nominal: Quantity, low: Quantity, high: Quantity) -> Self
    {
        let below = nominal.value() - low.value();
        let above = high.value() - nominal.value();

        Self::Absolute(nominal.with_value(below.min(above)))
    }

    /// Half-width of the window around `at`, in base units
    pub fn width(&self, at: f64) -> f64
    {
        match self {
            Self::Absolute(half_width) => half_width.value().abs(),
            Self::Percent(percent) => (percent / 100.0 * at).abs(),
            Self::Formula { percent_of_value, floor } => {
                (percent_of_value / 100.0 * at).abs() + floor.value().abs()
            }
        }
    }

    /// Checks this spec can describe a window for values of `kind`
    pub fn check(&self, kind: QuantityKind) -> Result<(), String>
    {
        let (percent, fixed) = match self {
            Self::Absolute(half_width) => (None, Some(half_width)),
            Self::Percent(percent) => (Some(*percent), None),
            Self::Formula { percent_of_value, floor } => (Some(*percent_of_value), Some(floor)),
        };

        if let Some(percent) = percent {
            if !percent.is_finite() || percent < 0.0 {
                return Err(format!("tolerance percentage {} is not a finite non-negative number", percent));
            }
        }

        if let Some(fixed) = fixed {
            if fixed.kind() != kind {
                return Err(format!("tolerance is in {} but the value is in {}", fixed.kind(), kind));
            }
            if !fixed.is_finite() || fixed.value() < 0.0 {
                return Err(format!("tolerance {} is not a finite non-negative amount", fixed.value()));
            }
        }

        Ok(())
    }
}

/// The setpoint and acceptance window worked out for one verification point
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedPoint
{
    /// What the manual asks for
    pub nominal: Quantity,
    /// The closest value the source can be set to
    pub target: Quantity,
    /// What the source reports producing, or `target` when it could not say
    pub achieved: Quantity,
    pub lower: Quantity,
    pub upper: Quantity,
    /// Set when `achieved` is the rounded estimate rather than a confirmed readback
    pub setpoint_estimated: bool,
}

impl ResolvedPoint
{
    /// Inclusive window check
    pub fn contains(&self, measured: f64) -> bool
    {
        self.lower.value() <= measured && measured <= self.upper.value()
    }

    /// Half-width of the window
    pub fn width(&self) -> f64
    {
        self.upper.value() - self.achieved.value()
    }
}

/// Rounds `nominal` to the nearest multiple of `step`
///
/// A nominal already on a step is returned untouched. A nominal exactly between two steps goes to
/// the one further from zero. A step that is not a positive finite number means any value can be
/// set.
pub fn closest_setpoint(nominal: f64, step: f64) -> f64
{
    if !(step.is_finite() && step > 0.0) || !nominal.is_finite() {
        return nominal;
    }

    let steps = nominal / step;
    let nearest = steps.round();

    if (steps - nearest).abs() <= STEP_EPSILON {
        return nominal;
    }

    let below = steps.floor();
    let fraction = steps - below;

    let chosen = if (fraction - 0.5).abs() <= STEP_EPSILON {
        if nominal >= 0.0 { below + 1.0 } else { below }
    }
    else {
        nearest
    };

    snap(chosen * step, step)
}

/// Strips the binary noise left by multiplying a step count back out
fn snap(value: f64, step: f64) -> f64
{
    if step >= 1.0 {
        return value;
    }

    let decimals = (-step.log10()).ceil() as i32 + 2;
    let scale = 10f64.powi(decimals);
    let scaled = value * scale;

    if scaled.abs() > 1e15 {
        value
    }
    else {
        scaled.round() / scale
    }
}

/// Works out the setpoint and acceptance window for one point
///
/// `readback` wraps the instrument's report of what it is actually producing. It is consulted once;
/// `None`, a value of the wrong kind, or a non-finite value all mean no confirmation was available
/// and the rounded estimate is used instead.
pub fn resolve<F>(nominal: Quantity, tolerance: &ToleranceSpec, step: Quantity, readback: F) -> ResolvedPoint
    where F: FnOnce() -> Option<Quantity>
{
    let target = nominal.with_value(closest_setpoint(nominal.value(), step.value()));

    let confirmed = readback()
        .filter(|value| value.kind() == nominal.kind() && value.is_finite());

    let (achieved, setpoint_estimated) = match confirmed {
        Some(value) => (value, false),
        None => (target, true),
    };

    let width = tolerance.width(achieved.value());

    ResolvedPoint {
        nominal: nominal,
        target: target,
        achieved: achieved,
        lower: achieved.with_value(achieved.value() - width),
        upper: achieved.with_value(achieved.value() + width),
        setpoint_estimated: setpoint_estimated,
    }
}

#[cfg(test)]
mod tests
{
    use super::{ closest_setpoint, resolve, ToleranceSpec };
    use crate::units::Quantity;

    fn close(a: f64, b: f64) -> bool
    {
        (a - b).abs() <= 1e-12 * a.abs().max(b.abs()).max(1.0)
    }

    #[test]
    fn representable_nominal_resolves_exactly()
    {
        let point = resolve(
            Quantity::volts(10.0),
            &ToleranceSpec::Percent(0.05),
            Quantity::volts(0.001),
            || None,
        );

        assert_eq!(point.achieved.value(), 10.0);
        assert_eq!(point.target.value(), 10.0);
        assert!(close(point.lower.value(), 9.995));
        assert!(close(point.upper.value(), 10.005));
    }

    #[test]
    fn unrepresentable_nominal_rounds_and_flags_estimate()
    {
        let point = resolve(
            Quantity::volts(7.0003),
            &ToleranceSpec::Percent(0.05),
            Quantity::volts(0.001),
            || None,
        );

        assert!(close(point.achieved.value(), 7.0));
        assert!(point.setpoint_estimated);
        assert_eq!(point.nominal.value(), 7.0003);
    }

    #[test]
    fn readback_replaces_estimate()
    {
        let point = resolve(
            Quantity::volts(7.0003),
            &ToleranceSpec::Absolute(Quantity::volts(0.01)),
            Quantity::volts(0.001),
            || Some(Quantity::volts(7.0012)),
        );

        assert!(!point.setpoint_estimated);
        assert!(close(point.target.value(), 7.0));
        assert_eq!(point.achieved.value(), 7.0012);
        assert!(close(point.lower.value(), 6.9912));
        assert!(close(point.upper.value(), 7.0112));
    }

    #[test]
    fn readback_of_wrong_kind_is_ignored()
    {
        let point = resolve(
            Quantity::volts(2.0),
            &ToleranceSpec::Percent(0.1),
            Quantity::volts(0.001),
            || Some(Quantity::amperes(2.0)),
        );

        assert!(point.setpoint_estimated);
        assert_eq!(point.achieved, Quantity::volts(2.0));
    }

    #[test]
    fn relative_width_tracks_achieved_value()
    {
        let spec = ToleranceSpec::Percent(0.05);
        let nominal = Quantity::volts(10.0);
        let step = Quantity::volts(0.001);

        let at_nominal = resolve(nominal, &spec, step, || Some(Quantity::volts(10.0)));
        let doubled = resolve(nominal, &spec, step, || Some(Quantity::volts(20.0)));

        assert!(close(doubled.width(), 2.0 * at_nominal.width()));
    }

    #[test]
    fn exact_ties_round_away_from_zero()
    {
        assert_eq!(closest_setpoint(1.25, 0.5), 1.5);
        assert_eq!(closest_setpoint(-1.25, 0.5), -1.5);
        assert!(close(closest_setpoint(7.0005, 0.001), 7.001));
        assert!(close(closest_setpoint(-7.0005, 0.001), -7.001));
    }

    #[test]
    fn non_positive_step_leaves_nominal()
    {
        assert_eq!(closest_setpoint(3.14159, 0.0), 3.14159);
        assert_eq!(closest_setpoint(3.14159, -1.0), 3.14159);
    }

    #[test]
    fn formula_adds_floor_to_percentage()
    {
        let spec = ToleranceSpec::Formula { percent_of_value: 0.02, floor: Quantity::volts(600e-6) };
        assert!(close(spec.width(2.0), 0.0004 + 0.0006));
        assert!(close(spec.width(-2.0), 0.0004 + 0.0006));
    }

    #[test]
    fn published_limits_become_half_span()
    {
        let spec = ToleranceSpec::from_limits(Quantity::volts(2.0), Quantity::volts(1.99900), Quantity::volts(2.00100));
        assert!(close(spec.width(123.0), 0.001));
    }

    #[test]
    fn asymmetric_limits_keep_the_tighter_side()
    {
        let nominal = Quantity::amperes(10e-12);
        let spec = ToleranceSpec::from_limits(nominal, Quantity::amperes(9.9150e-12), Quantity::amperes(10.0085e-12));

        let point = resolve(nominal, &spec, Quantity::amperes(0.0), || None);
        assert!(point.upper.value() <= 10.0085e-12 * (1.0 + 1e-12));
        assert!(point.lower.value() >= 9.9150e-12);
        assert!(!point.contains(10.03e-12));
        assert!(point.contains(10.008e-12));
    }

    #[test]
    fn limits_that_miss_the_nominal_are_rejected()
    {
        use crate::units::QuantityKind;

        let spec = ToleranceSpec::from_limits(Quantity::volts(2.0), Quantity::volts(2.1), Quantity::volts(2.2));
        assert!(spec.check(QuantityKind::Volt).is_err());
    }

    #[test]
    fn check_rejects_mismatched_and_negative_specs()
    {
        use crate::units::QuantityKind;

        assert!(ToleranceSpec::Absolute(Quantity::amperes(1e-9)).check(QuantityKind::Volt).is_err());
        assert!(ToleranceSpec::Percent(-0.1).check(QuantityKind::Volt).is_err());
        assert!(ToleranceSpec::Percent(f64::NAN).check(QuantityKind::Volt).is_err());
        assert!(ToleranceSpec::Formula { percent_of_value: 0.1, floor: Quantity::volts(-1.0) }
            .check(QuantityKind::Volt)
            .is_err());
        assert!(ToleranceSpec::Percent(0.05).check(QuantityKind::Ohm).is_ok());
    }
}
