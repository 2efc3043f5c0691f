use crate::animation::Attribute;
use crate::scene::PrimKey;
use crate::scene::transform::LocalTransform;

/// What a prim can take part in during a bake.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PrimKind {
    /// Grouping only, carries no transform.
    #[default]
    Scope,
    /// Transformable prim without point data.
    Xform,
    /// Mesh-like prim with points and optional normals.
    PointBased,
    Skeleton,
}

impl PrimKind {
    #[inline]
    #[must_use]
    pub fn is_xformable(self) -> bool {
        !matches!(self, Self::Scope)
    }

    #[inline]
    #[must_use]
    pub fn is_point_based(self) -> bool {
        matches!(self, Self::PointBased)
    }
}

/// A minimal scene prim holding hierarchy and transform data.
///
/// Skeleton and skinning data live in the [`Stage`](super::Stage)'s
/// component maps, keyed by the prim handle.
#[derive(Debug, Clone)]
pub struct Prim {
    pub name: String,
    pub kind: PrimKind,

    // === Core Hierarchy ===
    pub(crate) parent: Option<PrimKey>,
    pub(crate) children: Vec<PrimKey>,

    // === Spatial Data ===
    /// Animated local transform; unauthored means identity.
    pub transform: Attribute<LocalTransform>,
    /// Ignore all ancestor transforms when composing the world matrix.
    pub resets_xform_stack: bool,

    /// Lives under an instancing prototype rather than the visible hierarchy.
    pub in_prototype: bool,
}

impl Prim {
    #[must_use]
    pub fn new(name: &str, kind: PrimKind) -> Self {
        Self {
            name: name.to_string(),
            kind,
            parent: None,
            children: Vec::new(),
            transform: Attribute::new(),
            resets_xform_stack: false,
            in_prototype: false,
        }
    }

    #[inline]
    #[must_use]
    pub fn parent(&self) -> Option<PrimKey> {
        self.parent
    }

    #[inline]
    #[must_use]
    pub fn children(&self) -> &[PrimKey] {
        &self.children
    }
}
