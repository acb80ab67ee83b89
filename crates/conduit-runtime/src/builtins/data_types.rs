//! Built-in data types, registered with the data-type factory at link time.

use cd_01_factory_registry::{FactoryRegistration, FactoryRegistry, FactoryResult};
use cd_06_data_lock::{data_type_entry, Buffer, DataValue};
use serde_json::{Map as JsonMap, Value};
use shared_types::TypeTag;

/// A signed integer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Integer(pub i64);

impl DataValue for Integer {
    const TYPE: TypeTag = TypeTag::from_static("conduit::Integer");

    fn to_json(&self) -> Value {
        Value::from(self.0)
    }

    fn assign_json(&mut self, value: &Value) -> Result<(), String> {
        self.0 = value
            .as_i64()
            .ok_or_else(|| format!("expected an integer, got {value}"))?;
        Ok(())
    }
}

/// A UTF-8 string.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Text(pub String);

impl DataValue for Text {
    const TYPE: TypeTag = TypeTag::from_static("conduit::Text");

    fn to_json(&self) -> Value {
        Value::from(self.0.as_str())
    }

    fn assign_json(&mut self, value: &Value) -> Result<(), String> {
        self.0 = value
            .as_str()
            .ok_or_else(|| format!("expected a string, got {value}"))?
            .to_string();
        Ok(())
    }
}

/// String-keyed JSON values.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Map(pub JsonMap<String, Value>);

impl DataValue for Map {
    const TYPE: TypeTag = TypeTag::from_static("conduit::Map");

    fn to_json(&self) -> Value {
        Value::Object(self.0.clone())
    }

    fn assign_json(&mut self, value: &Value) -> Result<(), String> {
        self.0 = value
            .as_object()
            .ok_or_else(|| format!("expected an object, got {value}"))?
            .clone();
        Ok(())
    }
}

/// Tags of every built-in data type.
pub const BUILTIN_DATA_TYPES: [TypeTag; 4] = [Integer::TYPE, Text::TYPE, Map::TYPE, Buffer::TYPE];

fn register_builtin_data_types(registry: &FactoryRegistry) -> FactoryResult<()> {
    registry.add_factory(data_type_entry::<Integer>())?;
    registry.add_factory(data_type_entry::<Text>())?;
    registry.add_factory(data_type_entry::<Map>())?;
    registry.add_factory(data_type_entry::<Buffer>())
}

inventory::submit! {
    FactoryRegistration::new("conduit::builtin_data_types", register_builtin_data_types)
}

#[cfg(test)]
mod tests {
    use super::*;
    use cd_06_data_lock::{create_object, downcast, has_data_type};
    use serde_json::json;
    use shared_types::ObjectId;

    fn registry() -> FactoryRegistry {
        let registry = FactoryRegistry::new();
        register_builtin_data_types(&registry).unwrap();
        registry
    }

    #[test]
    fn test_every_builtin_type_is_constructible() {
        let registry = registry();
        for tag in &BUILTIN_DATA_TYPES {
            assert!(has_data_type(&registry, tag), "{tag} missing");
            let object = create_object(&registry, tag, ObjectId::new("o")).unwrap();
            assert_eq!(&object.type_tag(), tag);
        }
    }

    #[test]
    fn test_assign_from_json() {
        let registry = registry();
        let object = create_object(&registry, &Integer::TYPE, ObjectId::new("n")).unwrap();
        object.assign(&json!(21), None).unwrap();
        assert_eq!(downcast::<Integer>(&object).unwrap().lock_shared().unwrap().0, 21);
        assert!(object.assign(&json!("21"), None).is_err());

        let map = create_object(&registry, &Map::TYPE, ObjectId::new("m")).unwrap();
        map.assign(&json!({ "gain": 2 }), None).unwrap();
        assert_eq!(map.snapshot().unwrap(), json!({ "gain": 2 }));
    }
}
