use glam::{DMat4, DQuat, DVec3, Quat, Vec3};

/// Values an [`Attribute`](super::Attribute) can blend between two samples.
///
/// Types without a meaningful blend (indices, flags) hold the earlier
/// sample until the later one is reached.
pub trait Interpolate: Clone {
    fn interpolate(start: &Self, end: &Self, t: f64) -> Self;
}

impl Interpolate for f32 {
    fn interpolate(start: &Self, end: &Self, t: f64) -> Self {
        start + (end - start) * t as f32
    }
}

impl Interpolate for f64 {
    fn interpolate(start: &Self, end: &Self, t: f64) -> Self {
        start + (end - start) * t
    }
}

impl Interpolate for Vec3 {
    fn interpolate(start: &Self, end: &Self, t: f64) -> Self {
        start.lerp(*end, t as f32)
    }
}

impl Interpolate for DVec3 {
    fn interpolate(start: &Self, end: &Self, t: f64) -> Self {
        start.lerp(*end, t)
    }
}

impl Interpolate for Quat {
    fn interpolate(start: &Self, end: &Self, t: f64) -> Self {
        start.slerp(*end, t as f32)
    }
}

impl Interpolate for DQuat {
    fn interpolate(start: &Self, end: &Self, t: f64) -> Self {
        start.slerp(*end, t)
    }
}

impl Interpolate for DMat4 {
    fn interpolate(start: &Self, end: &Self, t: f64) -> Self {
        DMat4::from_cols(
            start.x_axis.lerp(end.x_axis, t),
            start.y_axis.lerp(end.y_axis, t),
            start.z_axis.lerp(end.z_axis, t),
            start.w_axis.lerp(end.w_axis, t),
        )
    }
}

macro_rules! impl_held {
    ($($ty:ty),* $(,)?) => {
        $(
            impl Interpolate for $ty {
                fn interpolate(start: &Self, end: &Self, t: f64) -> Self {
                    if t < 1.0 { *start } else { *end }
                }
            }
        )*
    };
}

impl_held!(i32, u32, bool);

impl<T: Interpolate> Interpolate for Vec<T> {
    fn interpolate(start: &Self, end: &Self, t: f64) -> Self {
        // Arrays whose size changes between samples cannot be blended.
        if start.len() != end.len() {
            return if t < 1.0 { start.clone() } else { end.clone() };
        }
        start
            .iter()
            .zip(end)
            .map(|(a, b)| T::interpolate(a, b, t))
            .collect()
    }
}
