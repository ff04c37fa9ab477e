//! GL C-type registry.
//!
//! Enumerates every scalar/pointer/enum C type the recorder may serialize.
//! The registry is static, process-global, and immutable: both the recorder
//! and the replayer must agree bit-for-bit on ids, so this table is never
//! loaded dynamically.

use std::sync::LazyLock;

/// Stable identifier for a registered C type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeId(pub u16);

/// Descriptor for one GL C type.
///
/// See module docs: the registry maps `TypeId` to this record, and the
/// mapping is fixed for the lifetime of the wire format version.
#[derive(Debug, Clone, Copy)]
pub struct GlCType {
    /// Stable id, used as the wire representation.
    pub id: TypeId,
    /// Human-readable C type name, e.g. `"GLenum"`, `"GLvoid *"`.
    pub name: &'static str,
    /// Size in bytes of one element (1, 2, 4, or 8).
    pub byte_size: u8,
    /// Whether the underlying representation is signed.
    pub is_signed: bool,
    /// Pointer indirection depth; 0 for a plain scalar.
    pub pointer_depth: u8,
    /// For a pointer type, the `TypeId` of the pointed-to element.
    /// `None` for scalars and opaque pointers.
    pub element_type: Option<TypeId>,
    /// Opaque-pointer cookies (e.g. `HGLRC`, `Display *`) are never chased
    /// to find client memory, regardless of `pointer_depth`.
    pub is_opaque_pointer: bool,
    /// Values of this type are symbolic constants (`GLenum`-shaped), not
    /// arbitrary integers.
    pub is_enum: bool,
}

macro_rules! ctype {
    ($id:expr, $name:expr, $size:expr, $signed:expr, $ptr_depth:expr, $elem:expr, $opaque:expr, $enum:expr) => {
        GlCType {
            id: TypeId($id),
            name: $name,
            byte_size: $size,
            is_signed: $signed,
            pointer_depth: $ptr_depth,
            element_type: $elem,
            is_opaque_pointer: $opaque,
            is_enum: $enum,
        }
    };
}

/// The complete, static GL C-type table.
///
/// Ids are assigned in the order below and MUST NOT be reordered or reused
/// once a trace format version has shipped with them; appending new entries
/// at the end is safe.
static CTYPE_TABLE: LazyLock<Vec<GlCType>> = LazyLock::new(|| {
    vec![
        ctype!(0, "GLvoid", 0, false, 0, None, false, false),
        ctype!(1, "GLboolean", 1, false, 0, None, false, false),
        ctype!(2, "GLbyte", 1, true, 0, None, false, false),
        ctype!(3, "GLubyte", 1, false, 0, None, false, false),
        ctype!(4, "GLshort", 2, true, 0, None, false, false),
        ctype!(5, "GLushort", 2, false, 0, None, false, false),
        ctype!(6, "GLint", 4, true, 0, None, false, false),
        ctype!(7, "GLuint", 4, false, 0, None, false, false),
        ctype!(8, "GLfixed", 4, true, 0, None, false, false),
        ctype!(9, "GLint64", 8, true, 0, None, false, false),
        ctype!(10, "GLuint64", 8, false, 0, None, false, false),
        ctype!(11, "GLsizei", 4, true, 0, None, false, false),
        ctype!(12, "GLfloat", 4, true, 0, None, false, false),
        ctype!(13, "GLdouble", 8, true, 0, None, false, false),
        ctype!(14, "GLclampf", 4, true, 0, None, false, false),
        ctype!(15, "GLclampd", 8, true, 0, None, false, false),
        ctype!(16, "GLenum", 4, false, 0, None, false, true),
        ctype!(17, "GLbitfield", 4, false, 0, None, false, false),
        ctype!(18, "GLsync", 8, false, 1, None, true, false),
        ctype!(19, "GLhandleARB", 4, false, 0, None, false, false),
        ctype!(20, "GLchar", 1, true, 0, None, false, false),
        // pointer-to-scalar element types
        ctype!(21, "GLvoid *", 8, false, 1, None, true, false),
        ctype!(22, "GLubyte *", 8, false, 1, Some(TypeId(3)), false, false),
        ctype!(23, "GLint *", 8, false, 1, Some(TypeId(6)), false, false),
        ctype!(24, "GLuint *", 8, false, 1, Some(TypeId(7)), false, false),
        ctype!(25, "GLfloat *", 8, false, 1, Some(TypeId(12)), false, false),
        ctype!(26, "GLdouble *", 8, false, 1, Some(TypeId(13)), false, false),
        ctype!(27, "GLsizei *", 8, false, 1, Some(TypeId(11)), false, false),
        ctype!(28, "GLenum *", 8, false, 1, Some(TypeId(16)), false, false),
        ctype!(29, "GLchar *", 8, false, 1, Some(TypeId(20)), false, false),
        ctype!(30, "GLchar **", 8, false, 2, Some(TypeId(29)), false, false),
        // platform / window-system opaque cookies
        ctype!(31, "HGLRC", 8, false, 1, None, true, false),
        ctype!(32, "HDC", 8, false, 1, None, true, false),
        ctype!(33, "Display *", 8, false, 1, None, true, false),
        ctype!(34, "GLXContext", 8, false, 1, None, true, false),
        ctype!(35, "GLXDrawable", 8, false, 0, None, false, false),
    ]
});

/// Look up a registered C type by id.
#[must_use]
pub fn type_by_id(id: TypeId) -> Option<&'static GlCType> {
    CTYPE_TABLE.iter().find(|t| t.id == id)
}

/// Look up a registered C type by its canonical name.
#[must_use]
pub fn type_by_name(name: &str) -> Option<&'static GlCType> {
    CTYPE_TABLE.iter().find(|t| t.name == name)
}

/// Iterate over every registered C type, in id order.
pub fn all_types() -> impl Iterator<Item = &'static GlCType> {
    CTYPE_TABLE.iter()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_unique_and_dense_from_zero() {
        let mut ids: Vec<u16> = all_types().map(|t| t.id.0).collect();
        ids.sort_unstable();
        for (i, id) in ids.iter().enumerate() {
            assert_eq!(*id, i as u16, "ctype ids must be dense starting at 0");
        }
    }

    #[test]
    fn opaque_pointers_never_carry_element_type() {
        for t in all_types() {
            if t.is_opaque_pointer {
                assert!(t.element_type.is_none());
            }
        }
    }

    #[test]
    fn pointer_element_types_resolve() {
        for t in all_types() {
            if let Some(elem) = t.element_type {
                assert!(type_by_id(elem).is_some(), "{} references unknown element type", t.name);
            }
        }
    }

    #[test]
    fn glenum_is_marked_enum_and_unsigned() {
        let glenum = type_by_name("GLenum").expect("GLenum must be registered");
        assert!(glenum.is_enum);
        assert!(!glenum.is_signed);
    }
}
