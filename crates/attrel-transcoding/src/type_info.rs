//! Wire type descriptors.

use std::any::{Any, TypeId, type_name};
use std::fmt;
use std::sync::Arc;

type NamingFn = dyn Fn(&dyn Any) -> Option<String> + Send + Sync;

/// Registration of a wire type with the transcoder registry.
///
/// Pins the wire type `T` (and with it the `AttributeTranscoder<T>` contract
/// its encoders and decoders implement) and supplies the naming function
/// that derives a wire object's canonical name for decode lookup.
#[derive(Clone)]
pub struct TypeInfo {
    wire_type: TypeId,
    wire_type_name: &'static str,
    naming: Arc<NamingFn>,
}

impl TypeInfo {
    pub fn new<T: Any>(naming: impl Fn(&T) -> Option<String> + Send + Sync + 'static) -> Self {
        Self {
            wire_type: TypeId::of::<T>(),
            wire_type_name: type_name::<T>(),
            naming: Arc::new(move |object: &dyn Any| object.downcast_ref::<T>().and_then(&naming)),
        }
    }

    #[must_use]
    pub fn wire_type(&self) -> TypeId {
        self.wire_type
    }

    #[must_use]
    pub fn wire_type_name(&self) -> &'static str {
        self.wire_type_name
    }

    /// Canonical name of `object`. Empty names are treated as absent, as is
    /// an object of some other type.
    #[must_use]
    pub fn canonical_name(&self, object: &dyn Any) -> Option<String> {
        (self.naming)(object).filter(|name| !name.is_empty())
    }
}

impl fmt::Debug for TypeInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeInfo")
            .field("wire_type", &self.wire_type_name)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Element {
        name: String,
    }

    #[test]
    fn test_canonical_name() {
        let info = TypeInfo::new::<Element>(|e| Some(e.name.clone()));
        let element = Element {
            name: "urn:oid:0.9.2342.19200300.100.1.3".to_string(),
        };
        assert_eq!(
            info.canonical_name(&element).as_deref(),
            Some("urn:oid:0.9.2342.19200300.100.1.3")
        );
        assert_eq!(info.wire_type(), TypeId::of::<Element>());
    }

    #[test]
    fn test_empty_or_foreign_object_has_no_name() {
        let info = TypeInfo::new::<Element>(|e| Some(e.name.clone()));
        assert_eq!(info.canonical_name(&Element { name: String::new() }), None);
        assert_eq!(info.canonical_name(&"not an element"), None);
    }
}
