//! What a component sees of the runtime while one of its extension points
//! runs.

use std::collections::BTreeMap;
use std::sync::Arc;

use cd_03_object_registry::{BindingOptions, ObjectServiceRegistry};
use cd_05_connections::{Message, Signals};
use cd_06_data_lock::{downcast, Data, DataValue, ObjectRef, MODIFIED_SIGNAL};
use serde_json::Value;
use shared_types::{ComponentId, Key, ObjectId};

use crate::domain::handle::{FAILURE_NOTIFIED, INFO_NOTIFIED, SUCCESS_NOTIFIED};
use crate::error::{ComponentError, ComponentResult};

/// Bound objects, outputs and signals of one component.
#[derive(Clone)]
pub struct ComponentContext {
    id: ComponentId,
    osr: Arc<ObjectServiceRegistry>,
    signals: Arc<Signals>,
    /// Configured object uid per output key.
    outputs: Arc<BTreeMap<Key, ObjectId>>,
}

impl ComponentContext {
    pub(crate) fn new(
        id: ComponentId,
        osr: Arc<ObjectServiceRegistry>,
        signals: Arc<Signals>,
        outputs: BTreeMap<Key, ObjectId>,
    ) -> Self {
        Self {
            id,
            osr,
            signals,
            outputs: Arc::new(outputs),
        }
    }

    #[must_use]
    pub fn id(&self) -> &ComponentId {
        &self.id
    }

    #[must_use]
    pub fn signals(&self) -> &Signals {
        &self.signals
    }

    // =========================================================================
    // INPUTS
    // =========================================================================

    /// Object bound to a plain key.
    #[must_use]
    pub fn object(&self, key: &str) -> Option<ObjectRef> {
        self.osr.get_registered(&self.id, &Key::new(key))
    }

    /// Object bound to one slot of a key group.
    #[must_use]
    pub fn object_at(&self, key: &str, index: usize) -> Option<ObjectRef> {
        self.osr.get_registered(&self.id, &Key::group(key, index))
    }

    /// Typed view of the object bound to `key`.
    pub fn input<T: DataValue>(&self, key: &str) -> ComponentResult<Arc<Data<T>>> {
        let object = self
            .object(key)
            .ok_or_else(|| ComponentError::MissingInput(Key::new(key)))?;
        Ok(downcast::<T>(&object)?)
    }

    /// Every slot of a key group, empty slots included.
    #[must_use]
    pub fn group(&self, name: &str) -> Vec<Option<ObjectRef>> {
        self.osr.group(&self.id, name)
    }

    // =========================================================================
    // OUTPUTS
    // =========================================================================

    /// Identity an output object for `key` should carry: the configured uid,
    /// or `<component>_<key>` when none is configured.
    #[must_use]
    pub fn output_id(&self, key: &str) -> ObjectId {
        self.outputs
            .get(&Key::new(key))
            .cloned()
            .unwrap_or_else(|| ObjectId::new(format!("{}_{}", self.id, key)))
    }

    /// Publish (or with `None`, withdraw) the output bound to `key`.
    pub fn set_output(&self, key: &str, object: Option<ObjectRef>) -> ComponentResult {
        self.set_output_key(&Key::new(key), object)
    }

    /// Publish one slot of an output group.
    pub fn set_output_at(&self, key: &str, index: usize, object: Option<ObjectRef>) -> ComponentResult {
        self.set_output_key(&Key::group(key, index), object)
    }

    fn set_output_key(&self, key: &Key, object: Option<ObjectRef>) -> ComponentResult {
        self.osr
            .set_object(&self.id, key, object, BindingOptions::output())?;
        Ok(())
    }

    /// Output currently published under `key`.
    #[must_use]
    pub fn output(&self, key: &str) -> Option<ObjectRef> {
        self.osr
            .get_binding(&self.id, &Key::new(key))
            .filter(|binding| !binding.access.is_consumed())
            .map(|binding| binding.object)
    }

    // =========================================================================
    // SIGNALS
    // =========================================================================

    /// Emit one of the component's signals with this component as origin.
    pub fn emit(&self, signal: &str, payload: Value) -> usize {
        self.signals
            .emit(signal, Message::from_component(self.id.clone(), payload))
    }

    /// Emit `modified` on `object`; this component's own slots skip it.
    pub fn notify_modified(&self, object: &ObjectRef) -> usize {
        object.signals().emit(
            MODIFIED_SIGNAL,
            Message::from_component(self.id.clone(), Value::Null).without_echo(),
        )
    }

    pub fn notify_info(&self, text: &str) -> usize {
        self.emit(INFO_NOTIFIED, Value::from(text))
    }

    pub fn notify_success(&self, text: &str) -> usize {
        self.emit(SUCCESS_NOTIFIED, Value::from(text))
    }

    pub fn notify_failure(&self, text: &str) -> usize {
        self.emit(FAILURE_NOTIFIED, Value::from(text))
    }
}

impl std::fmt::Debug for ComponentContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComponentContext")
            .field("id", &self.id)
            .field("outputs", &self.outputs)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cd_06_data_lock::DataObject;
    use shared_types::TypeTag;

    struct Count(i64);

    impl DataValue for Count {
        const TYPE: TypeTag = TypeTag::from_static("test::Count");
    }

    fn context(osr: &Arc<ObjectServiceRegistry>) -> ComponentContext {
        let mut outputs = BTreeMap::new();
        outputs.insert(Key::new("out"), ObjectId::new("result"));
        ComponentContext::new(
            ComponentId::new("comp"),
            osr.clone(),
            Arc::new(Signals::with_names(&["done"])),
            outputs,
        )
    }

    #[test]
    fn test_input_reports_missing_key() {
        let osr = Arc::new(ObjectServiceRegistry::new());
        let ctx = context(&osr);
        assert!(matches!(
            ctx.input::<Count>("value"),
            Err(ComponentError::MissingInput(_))
        ));

        let data = Data::new("v", Count(4));
        osr.set_object(
            ctx.id(),
            &Key::new("value"),
            Some(data.as_object()),
            BindingOptions::input(),
        )
        .unwrap();
        assert_eq!(ctx.input::<Count>("value").unwrap().lock_shared().unwrap().0, 4);
    }

    #[test]
    fn test_output_ids() {
        let osr = Arc::new(ObjectServiceRegistry::new());
        let ctx = context(&osr);
        assert_eq!(ctx.output_id("out"), ObjectId::new("result"));
        assert_eq!(ctx.output_id("other"), ObjectId::new("comp_other"));
    }

    #[test]
    fn test_set_output_registers_and_withdraws() {
        let osr = Arc::new(ObjectServiceRegistry::new());
        let ctx = context(&osr);
        let data = Data::new(ctx.output_id("out"), Count(1));
        ctx.set_output("out", Some(data.as_object())).unwrap();
        assert_eq!(ctx.output("out").unwrap().id(), &ObjectId::new("result"));
        assert!(osr.output(&ObjectId::new("result")).is_some());

        ctx.set_output("out", None).unwrap();
        assert!(ctx.output("out").is_none());
    }

    #[test]
    fn test_emit_counts_receivers() {
        let osr = Arc::new(ObjectServiceRegistry::new());
        let ctx = context(&osr);
        assert_eq!(ctx.emit("done", Value::Null), 0);
        assert_eq!(ctx.emit("missing", Value::Null), 0);
    }
}
