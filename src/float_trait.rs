use conv::prelude::*;
use num_traits::{float::FloatConst, NumAssign};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt::{Debug, Display, LowerExp};
use std::iter::Sum;

/// Floating-point number trait, implemented for [f32] and [f64] only
pub trait Float:
    'static
    + num_traits::Float
    + FloatConst
    + NumAssign
    + ApproxFrom<usize>
    + ApproxFrom<f64>
    + ApproxInto<f64>
    + Sum
    + Serialize
    + DeserializeOwned
    + Debug
    + Display
    + LowerExp
    + Send
    + Sync
{
    fn half() -> Self;
    fn two() -> Self;
    fn four() -> Self;

    fn as_f64(self) -> f64 {
        self.approx_into().unwrap_or(f64::NAN)
    }
}

impl Float for f32 {
    #[inline]
    fn half() -> Self {
        0.5
    }

    #[inline]
    fn two() -> Self {
        2.0
    }

    #[inline]
    fn four() -> Self {
        4.0
    }
}

impl Float for f64 {
    #[inline]
    fn half() -> Self {
        0.5
    }

    #[inline]
    fn two() -> Self {
        2.0
    }

    #[inline]
    fn four() -> Self {
        4.0
    }
}
