//! Physical quantities and their display with engineering prefixes
//!
//! Section 18 of the manual spans values from single picoamps up to tens of teraohms, so values
//! are carried as `f64` in base units. Integer fixed-point storage cannot cover that range without
//! losing the small end. The prefix machinery only affects how a value is _shown_, never the
//! stored number.

use std::{
    fmt,
    cmp::{ PartialOrd, Ordering },
};
use serde::{ Deserialize, Serialize };

/// Defines a scalar prefix type for displaying units without changing the underlying value e.g.
/// "giga-" or "micro-"
pub trait Scalar
{
    /// Return the power of 10 of this scalar
    ///
    /// For example, a prefix of "milli-" should return -3.
    fn magnitude() -> i32;

    /// Return this scalar's written shorthand notation
    ///
    /// For example, a prefix of "giga-" should return "G"
    fn notation() -> &'static str;
}

macro_rules! impl_prefix
{
    { $name:ident, $magnitude:literal, $notation:literal } => {
        pub struct $name {}

        impl $name
        {
            pub const MAGNITUDE: i32 = $magnitude;
            pub const NOTATION: &'static str = $notation;
        }

        impl Scalar for $name
        {
            fn magnitude() -> i32
            {
                Self::MAGNITUDE
            }

            fn notation() -> &'static str
            {
                Self::NOTATION
            }
        }
    }
}

impl_prefix!{ Pico, -12, "p" }
impl_prefix!{ Nano, -9, "n" }
impl_prefix!{ Micro, -6, "u" }
impl_prefix!{ Milli, -3, "m" }
impl_prefix!{ Base, 0, "" }
impl_prefix!{ Kilo, 3, "k" }
impl_prefix!{ Mega, 6, "M" }
impl_prefix!{ Giga, 9, "G" }
impl_prefix!{ Tera, 12, "T" }

/// Returns the prefix notation for a power of ten that is a multiple of 3 within [-12, 12]
fn notation_for(magnitude: i32) -> &'static str
{
    match magnitude {
        -12 => Pico::NOTATION,
        -9 => Nano::NOTATION,
        -6 => Micro::NOTATION,
        -3 => Milli::NOTATION,
        3 => Kilo::NOTATION,
        6 => Mega::NOTATION,
        9 => Giga::NOTATION,
        12 => Tera::NOTATION,
        _ => Base::NOTATION,
    }
}

/// The kind of physical quantity a value describes
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuantityKind
{
    Volt,
    Ampere,
    Ohm,
}

impl QuantityKind
{
    /// The written shorthand symbol
    pub fn symbol(&self) -> &'static str
    {
        match self {
            Self::Volt => "V",
            Self::Ampere => "A",
            Self::Ohm => "Ω",
        }
    }
}

impl fmt::Display for QuantityKind
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        f.write_str(self.symbol())
    }
}

/// A value of a particular quantity kind, stored in base units
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quantity
{
    kind: QuantityKind,
    value: f64,
}

pub struct UnitDisplay
{
    symbol: &'static str,
    notation: &'static str,
    magnitude: i32,
    value: f64,
    hide_unit: bool,
}

impl fmt::Display for UnitDisplay
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        let scaled = self.value / 10f64.powi(self.magnitude);

        if let Some(precision) = f.precision() {
            write!(f, "{:.*}", precision, scaled)?;
        }
        else {
            write!(f, "{}", scaled)?;
        }

        if self.hide_unit {
            Ok(())
        }
        else {
            f.write_str(self.notation)?;
            f.write_str(self.symbol)
        }
    }
}

impl Quantity
{
    pub fn new(kind: QuantityKind, value: f64) -> Self
    {
        Self { kind: kind, value: value }
    }

    /// Constructs a new value from a number expressed with the given scalar prefix
    ///
    /// For example, 100 nA is `Quantity::from::<Nano>(QuantityKind::Ampere, 100.0)`
    pub fn from<S: Scalar>(kind: QuantityKind, num: f64) -> Self
    {
        Self::new(kind, num * 10f64.powi(S::magnitude()))
    }

    pub fn kind(&self) -> QuantityKind
    {
        self.kind
    }

    /// The value in base units
    pub fn value(&self) -> f64
    {
        self.value
    }

    /// The value expressed with the given scalar prefix
    pub fn as_f64<S: Scalar>(&self) -> f64
    {
        self.value / 10f64.powi(S::magnitude())
    }

    /// A value of the same kind as this one
    pub fn with_value(&self, value: f64) -> Self
    {
        Self::new(self.kind, value)
    }

    pub fn is_finite(&self) -> bool
    {
        self.value.is_finite()
    }

    /// Displays the unit with a given scalar prefix
    pub fn display<S: Scalar>(&self) -> UnitDisplay
    {
        UnitDisplay {
            symbol: self.kind.symbol(),
            notation: S::notation(),
            magnitude: S::magnitude(),
            value: self.value,
            hide_unit: false,
        }
    }

    /// Displays the unit with a given scalar prefix but hides the symbol and prefix in the output
    pub fn display_anon<S: Scalar>(&self) -> UnitDisplay
    {
        UnitDisplay {
            symbol: self.kind.symbol(),
            notation: S::notation(),
            magnitude: S::magnitude(),
            value: self.value,
            hide_unit: true,
        }
    }

    /// Displays the unit with whichever engineering prefix keeps the mantissa in [1, 1000)
    pub fn display_auto(&self) -> UnitDisplay
    {
        let magnitude = if self.value == 0.0 || !self.value.is_finite() {
            0
        }
        else {
            let exponent = self.value.abs().log10().floor() as i32;
            (exponent.div_euclid(3) * 3).clamp(-12, 12)
        };

        UnitDisplay {
            symbol: self.kind.symbol(),
            notation: notation_for(magnitude),
            magnitude: magnitude,
            value: self.value,
            hide_unit: false,
        }
    }
}

macro_rules! impl_unit
{
    { $ctor:ident, $kind:ident } => {
        impl Quantity
        {
            /// Constructs a new value from a number of base units
            pub fn $ctor(value: f64) -> Self
            {
                Self::new(QuantityKind::$kind, value)
            }
        }
    }
}

impl_unit!{ volts, Volt }
impl_unit!{ amperes, Ampere }
impl_unit!{ ohms, Ohm }

/// Values of different kinds are unordered
impl PartialOrd for Quantity
{
    fn partial_cmp(&self, rhs: &Self) -> Option<Ordering>
    {
        if self.kind != rhs.kind {
            None
        }
        else {
            self.value.partial_cmp(&rhs.value)
        }
    }
}

impl fmt::Display for Quantity
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        fmt::Display::fmt(&self.display_auto(), f)
    }
}

/// Builds a [`Quantity`] from a number, an optional prefix and a unit kind
///
/// `qty!(10.0, Volt)` is ten volts and `qty!(100.0, Nano Ampere)` is a hundred nanoamps.
#[macro_export]
macro_rules! qty
{
    ( $num:expr, $u:ident ) => {
        $crate::units::Quantity::new($crate::units::QuantityKind::$u, $num)
    };
    ( $num:expr, $prefix:ident $u:ident ) => {
        $crate::units::Quantity::from::<$crate::units::$prefix>($crate::units::QuantityKind::$u, $num)
    };
}

#[cfg(test)]
mod tests
{
    use super::{ Quantity, QuantityKind, Milli, Nano, Base };

    #[test]
    fn precision_rounds_scaled_value()
    {
        let volts = Quantity::volts(0.2);
        assert_eq!(&format!("{:.3}", volts.display::<Milli>()), "200.000mV");
    }

    #[test]
    fn anon_display_hides_unit()
    {
        let amps = qty!(100.0, Nano Ampere);
        assert_eq!(&format!("{:.1}", amps.display_anon::<Nano>()), "100.0");
    }

    #[test]
    fn auto_display_picks_engineering_prefix()
    {
        assert_eq!(&format!("{:.2}", Quantity::amperes(1.0e-12)), "1.00pA");
        assert_eq!(&format!("{:.1}", Quantity::ohms(190.0e6)), "190.0MΩ");
        assert_eq!(&format!("{:.3}", Quantity::volts(20.0)), "20.000V");
        assert_eq!(&format!("{:.1}", Quantity::volts(0.0)), "0.0V");
    }

    #[test]
    fn auto_display_clamps_to_tera()
    {
        assert_eq!(&format!("{:.0}", Quantity::ohms(20.0e15)), "20000TΩ");
    }

    #[test]
    fn base_display_keeps_value()
    {
        assert_eq!(&format!("{}", qty!(2.5, Volt).display::<Base>()), "2.5V");
    }

    #[test]
    fn different_kinds_are_unordered()
    {
        assert!(Quantity::volts(1.0).partial_cmp(&Quantity::amperes(1.0)).is_none());
        assert!(Quantity::volts(1.0) < Quantity::volts(2.0));
    }

    #[test]
    fn prefixed_constructor_scales_to_base_units()
    {
        let amps = qty!(10.0, Milli Ampere);
        assert_eq!(amps.kind(), QuantityKind::Ampere);
        assert!((amps.value() - 0.01).abs() < 1e-15);
        assert!((amps.as_f64::<Milli>() - 10.0).abs() < 1e-12);
    }
}
