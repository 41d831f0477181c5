use super::TypeDefinition;
use crate::schema::Kind;

/// Accepts anything; everything it does comes from the shared pipeline.
pub struct AnyType;

impl TypeDefinition for AnyType {
    fn kind(&self) -> Kind {
        Kind::Any
    }
}
