use bitflags::bitflags;
use serde::{Deserialize, Serialize};

bitflags! {
    /// Deformation paths a target can take.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    #[serde(transparent)]
    pub struct DeformationFlags: u32 {
        const POINTS_LBS           = 1 << 0;
        const NORMALS_LBS          = 1 << 1;
        /// Rigid influences applied to the prim's transform.
        const XFORM_LBS            = 1 << 2;
        const POINTS_BLEND_SHAPES  = 1 << 3;
        const NORMALS_BLEND_SHAPES = 1 << 4;

        const LBS = Self::POINTS_LBS.bits() | Self::NORMALS_LBS.bits() | Self::XFORM_LBS.bits();
        const BLEND_SHAPES = Self::POINTS_BLEND_SHAPES.bits() | Self::NORMALS_BLEND_SHAPES.bits();
        const MODIFIES_POINTS = Self::POINTS_LBS.bits() | Self::POINTS_BLEND_SHAPES.bits();
        const MODIFIES_NORMALS = Self::NORMALS_LBS.bits() | Self::NORMALS_BLEND_SHAPES.bits();
        const MODIFIES_XFORM = Self::XFORM_LBS.bits();
    }
}

impl DeformationFlags {
    #[inline]
    #[must_use]
    pub fn modifies_points(self) -> bool {
        self.intersects(Self::MODIFIES_POINTS)
    }

    #[inline]
    #[must_use]
    pub fn modifies_normals(self) -> bool {
        self.intersects(Self::MODIFIES_NORMALS)
    }

    #[inline]
    #[must_use]
    pub fn modifies_xform(self) -> bool {
        self.intersects(Self::MODIFIES_XFORM)
    }

    /// Stages that have work under these flags, in evaluation order.
    pub fn stages(self) -> impl Iterator<Item = DeformationStage> {
        DeformationStage::ORDER
            .into_iter()
            .filter(move |stage| self.intersects(stage.mask()))
    }
}

/// Ordered deformation stages.
///
/// Blend shapes displace the rest pose and skinning then deforms that
/// displaced pose, so [`ORDER`](Self::ORDER) must keep blend shapes first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeformationStage {
    BlendShapes,
    Lbs,
}

impl DeformationStage {
    pub const ORDER: [Self; 2] = [Self::BlendShapes, Self::Lbs];

    #[must_use]
    pub fn mask(self) -> DeformationFlags {
        match self {
            Self::BlendShapes => DeformationFlags::BLEND_SHAPES,
            Self::Lbs => DeformationFlags::LBS,
        }
    }
}
