//! Set CRUD handlers.

use std::sync::Arc;

use serde_json::Value;
use topo_core::fields::{
    BK_APP_ID_FIELD, BK_INNER_OBJ_ID_SET, BK_OBJ_ID_FIELD, BK_OWNER_ID_FIELD, BK_SET_ID_FIELD,
};
use topo_core::{CcError, Condition, MapStr, Object, QueryInput};
use tracing::{debug, error, warn};

use super::TopoApi;
use crate::context::{ContextParams, PathParams, QueryParams};
use crate::service::action::{ActionRegistry, HandlerResult, RegistryError, Verb};

/// Registers the Set routes.
///
/// # Errors
///
/// Returns `RegistryError` if a Set route collides with an existing one.
pub fn init_set(api: &Arc<TopoApi>, registry: &mut ActionRegistry) -> Result<(), RegistryError> {
    registry.register(api.action(Verb::Post, "/set/{app_id}", TopoApi::create_set))?;
    registry.register(api.action(Verb::Delete, "/set/{app_id}/{set_id}", TopoApi::delete_set))?;
    registry.register(api.action(Verb::Put, "/set/{app_id}/{set_id}", TopoApi::update_set))?;
    registry.register(api.action(
        Verb::Post,
        "/set/search/{owner_id}/{app_id}",
        TopoApi::search_set,
    ))?;
    Ok(())
}

impl TopoApi {
    /// Creates a set under the application named in the path.
    ///
    /// Returns the saved instance, or `null` when the tenant has no Set model.
    pub async fn create_set(
        self: Arc<Self>,
        params: ContextParams,
        path_params: PathParams,
        _query_params: QueryParams,
        mut data: MapStr,
    ) -> HandlerResult {
        let app_id = path_params.get_int("app_id", params.err.as_ref())?;
        let objects = self.find_set_objects(&params, &object_condition(&params)).await?;

        data.set(BK_APP_ID_FIELD, app_id);
        // The set id is always allocated by the facade.
        data.remove(BK_SET_ID_FIELD);

        let Some(object) = objects.first() else {
            warn!("no set model for supplier account '{}'", params.supplier_account);
            return Ok(Value::Null);
        };

        let inst_op = self.core().inst_operation();
        let mut set = inst_op
            .create_inst(&params, object, data)
            .await
            .inspect_err(|err| error!("failed to create a new set, {}", err))?;
        inst_op
            .save_inst(&params, &mut set)
            .await
            .inspect_err(|err| error!("failed to create a new set, {}", err))?;

        debug!("created set {:?} in app {}", set.inst_id(), app_id);
        Ok(set.to_map_str().into())
    }

    /// Deletes the set for every resolved Set model. Stops at the first
    /// failure; deletions already done are kept.
    pub async fn delete_set(
        self: Arc<Self>,
        params: ContextParams,
        path_params: PathParams,
        _query_params: QueryParams,
        _data: MapStr,
    ) -> HandlerResult {
        let app_id = path_params.get_int("app_id", params.err.as_ref())?;
        let set_id = path_params.get_int("set_id", params.err.as_ref())?;
        let objects = self.find_set_objects(&params, &object_condition(&params)).await?;
        let cond = set_condition(&params, app_id, set_id);

        let inst_op = self.core().inst_operation();
        for object in &objects {
            inst_op
                .delete_inst(&params, object, &cond)
                .await
                .inspect_err(|err| error!("failed to delete the set {}, {}", set_id, err))?;
        }

        Ok(Value::Null)
    }

    /// Updates the set for every resolved Set model. Stops at the first
    /// failure; updates already done are kept.
    pub async fn update_set(
        self: Arc<Self>,
        params: ContextParams,
        path_params: PathParams,
        _query_params: QueryParams,
        mut data: MapStr,
    ) -> HandlerResult {
        let app_id = path_params.get_int("app_id", params.err.as_ref())?;
        let set_id = path_params.get_int("set_id", params.err.as_ref())?;
        let objects = self.find_set_objects(&params, &object_condition(&params)).await?;
        let cond = set_condition(&params, app_id, set_id);

        data.set(BK_APP_ID_FIELD, app_id).set(BK_SET_ID_FIELD, set_id);

        let inst_op = self.core().inst_operation();
        for object in &objects {
            inst_op
                .update_inst(&params, &data, object, &cond)
                .await
                .inspect_err(|err| error!("failed to update the set {}, {}", set_id, err))?;
        }

        Ok(Value::Null)
    }

    /// Lists sets across every resolved Set model.
    ///
    /// Returns `{count, info}`: the summed count and the concatenated
    /// instances, in model resolution order.
    pub async fn search_set(
        self: Arc<Self>,
        params: ContextParams,
        path_params: PathParams,
        _query_params: QueryParams,
        _data: MapStr,
    ) -> HandlerResult {
        let app_id = path_params.get_int("app_id", params.err.as_ref())?;
        let mut cond = object_condition(&params);
        cond.field(BK_APP_ID_FIELD).eq(app_id);
        let objects = self.find_set_objects(&params, &cond).await?;

        let query = QueryInput::default();

        let inst_op = self.core().inst_operation();
        let mut count = 0_u64;
        let mut info: Vec<Value> = Vec::new();
        for object in &objects {
            let (cnt, items) = inst_op
                .find_inst(&params, object, &query)
                .await
                .inspect_err(|err| {
                    error!("failed to find the sets of app {}, error info is {}", app_id, err);
                })?;
            count += cnt;
            info.extend(items.iter().map(|inst| Value::from(inst.to_map_str())));
        }

        let mut result = MapStr::new();
        result.set("count", count).set("info", info);
        Ok(result.into())
    }

    /// Resolves the Set model descriptors matching `cond`.
    async fn find_set_objects(
        &self,
        params: &ContextParams,
        cond: &Condition,
    ) -> Result<Vec<Object>, CcError> {
        self.core()
            .object_operation()
            .find_object(params, cond)
            .await
            .inspect_err(|err| error!("failed to search the set, {}", err))
    }
}

/// Descriptor condition for the Set model of the caller's tenant.
fn object_condition(params: &ContextParams) -> Condition {
    let mut cond = Condition::new();
    cond.field(BK_OWNER_ID_FIELD)
        .eq(params.supplier_account.clone())
        .field(BK_OBJ_ID_FIELD)
        .eq(BK_INNER_OBJ_ID_SET);
    cond
}

/// Instance condition scoped to the caller's tenant, application and set.
fn set_condition(params: &ContextParams, app_id: i64, set_id: i64) -> Condition {
    let mut cond = Condition::new();
    cond.field(BK_OWNER_ID_FIELD)
        .eq(params.supplier_account.clone())
        .field(BK_APP_ID_FIELD)
        .eq(app_id)
        .field(BK_SET_ID_FIELD)
        .eq(set_id);
    cond
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use async_trait::async_trait;
    use axum::http::HeaderMap;
    use parking_lot::Mutex;
    use serde_json::json;
    use topo_core::{codes, ErrorCatalog, Inst, LanguageCatalog};

    use super::*;
    use crate::traits::{Core, InstOperation, ObjectOperation};

    /// Facade double: fixed descriptors, scripted failures, recorded calls.
    #[derive(Default)]
    struct ScriptedCore {
        objects: Vec<Object>,
        find_object_error: Option<i32>,
        /// Descriptor id -> error code returned by delete/update/find on it.
        fail_on: HashMap<i64, i32>,
        /// Descriptor id -> instances returned by `find_inst`.
        found: HashMap<i64, Vec<MapStr>>,
        calls: Mutex<Vec<String>>,
        updates: Mutex<Vec<MapStr>>,
        created: Mutex<Vec<MapStr>>,
        conditions: Mutex<Vec<Condition>>,
    }

    impl ScriptedCore {
        fn with_objects(ids: &[i64]) -> Self {
            Self {
                objects: ids
                    .iter()
                    .map(|id| Object::new(*id, BK_INNER_OBJ_ID_SET, "Set", "0", BK_SET_ID_FIELD))
                    .collect(),
                ..Self::default()
            }
        }

        fn record(&self, params: &ContextParams, op: &str, obj: &Object) -> Result<(), CcError> {
            self.calls.lock().push(format!("{op}:{}", obj.id));
            match self.fail_on.get(&obj.id) {
                Some(code) => Err(params.err.error(*code)),
                None => Ok(()),
            }
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().clone()
        }
    }

    #[async_trait]
    impl ObjectOperation for ScriptedCore {
        async fn find_object(
            &self,
            params: &ContextParams,
            cond: &Condition,
        ) -> Result<Vec<Object>, CcError> {
            self.conditions.lock().push(cond.clone());
            match self.find_object_error {
                Some(code) => Err(params.err.error(code)),
                None => Ok(self.objects.clone()),
            }
        }
    }

    #[async_trait]
    impl InstOperation for ScriptedCore {
        async fn create_inst(
            &self,
            params: &ContextParams,
            obj: &Object,
            data: MapStr,
        ) -> Result<Inst, CcError> {
            self.record(params, "create", obj)?;
            self.created.lock().push(data.clone());
            Ok(Inst::new(obj.clone(), data))
        }

        async fn save_inst(&self, params: &ContextParams, inst: &mut Inst) -> Result<(), CcError> {
            self.record(params, "save", inst.object())?;
            let id_field = inst.object().instance_id_field.clone();
            inst.data_mut().set(id_field, 1);
            Ok(())
        }

        async fn delete_inst(
            &self,
            params: &ContextParams,
            obj: &Object,
            cond: &Condition,
        ) -> Result<(), CcError> {
            self.conditions.lock().push(cond.clone());
            self.record(params, "delete", obj)
        }

        async fn update_inst(
            &self,
            params: &ContextParams,
            data: &MapStr,
            obj: &Object,
            _cond: &Condition,
        ) -> Result<(), CcError> {
            self.updates.lock().push(data.clone());
            self.record(params, "update", obj)
        }

        async fn find_inst(
            &self,
            params: &ContextParams,
            obj: &Object,
            _query: &QueryInput,
        ) -> Result<(u64, Vec<Inst>), CcError> {
            self.record(params, "find", obj)?;
            let items: Vec<Inst> = self
                .found
                .get(&obj.id)
                .cloned()
                .unwrap_or_default()
                .into_iter()
                .map(|data| Inst::new(obj.clone(), data))
                .collect();
            Ok((items.len() as u64, items))
        }
    }

    impl Core for ScriptedCore {
        fn object_operation(&self) -> &dyn ObjectOperation {
            self
        }

        fn inst_operation(&self) -> &dyn InstOperation {
            self
        }
    }

    fn ctx() -> ContextParams {
        let mut header = HeaderMap::new();
        header.insert(crate::context::BK_HTTP_HEADER_OWNER_ID, "0".parse().unwrap());
        ContextParams::from_headers(
            header,
            &ErrorCatalog::builtin("en"),
            &LanguageCatalog::new("en"),
        )
    }

    fn path(pairs: &[(&str, &str)]) -> PathParams {
        pairs.iter().copied().collect()
    }

    fn api(core: &Arc<ScriptedCore>) -> Arc<TopoApi> {
        TopoApi::new(Arc::clone(core) as Arc<dyn Core>)
    }

    fn body(value: Value) -> MapStr {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn init_set_registers_the_four_routes() {
        let core = Arc::new(ScriptedCore::default());
        let mut registry = ActionRegistry::new();
        api(&core).register_actions(&mut registry).unwrap();

        let routes: Vec<_> = registry
            .actions()
            .iter()
            .map(|a| format!("{} {}", a.verb(), a.path()))
            .collect();
        assert_eq!(
            routes,
            vec![
                "POST /set/{app_id}",
                "DELETE /set/{app_id}/{set_id}",
                "PUT /set/{app_id}/{set_id}",
                "POST /set/search/{owner_id}/{app_id}",
            ]
        );
    }

    #[test]
    fn registering_twice_is_a_startup_error() {
        let core = Arc::new(ScriptedCore::default());
        let api = api(&core);
        let mut registry = ActionRegistry::new();
        api.register_actions(&mut registry).unwrap();
        assert!(matches!(
            api.register_actions(&mut registry),
            Err(RegistryError::Duplicate { .. })
        ));
    }

    #[tokio::test]
    async fn create_injects_app_id_and_returns_saved_instance() {
        let core = Arc::new(ScriptedCore::with_objects(&[1]));
        let out = api(&core)
            .create_set(
                ctx(),
                path(&[("app_id", "5")]),
                QueryParams::default(),
                body(json!({"bk_set_name": "Set-A"})),
            )
            .await
            .unwrap();

        assert_eq!(out, json!({"bk_set_name": "Set-A", "bk_app_id": 5, "bk_set_id": 1}));
        assert_eq!(core.calls(), vec!["create:1", "save:1"]);

        let object_cond = core.conditions.lock()[0].clone();
        assert_eq!(object_cond.eq_value(BK_OWNER_ID_FIELD), Some(&json!("0")));
        assert_eq!(object_cond.eq_value(BK_OBJ_ID_FIELD), Some(&json!("set")));
    }

    #[tokio::test]
    async fn create_drops_client_supplied_set_id() {
        let core = Arc::new(ScriptedCore::with_objects(&[1]));
        api(&core)
            .create_set(
                ctx(),
                path(&[("app_id", "7")]),
                QueryParams::default(),
                body(json!({"bk_set_name": "Set-B", "bk_set_id": 99})),
            )
            .await
            .unwrap();

        let created = core.created.lock()[0].clone();
        assert!(!created.exists(BK_SET_ID_FIELD));
        assert_eq!(
            serde_json::to_value(&created).unwrap(),
            json!({"bk_set_name": "Set-B", "bk_app_id": 7})
        );
    }

    #[tokio::test]
    async fn create_uses_only_the_first_descriptor() {
        let core = Arc::new(ScriptedCore::with_objects(&[1, 2]));
        api(&core)
            .create_set(ctx(), path(&[("app_id", "5")]), QueryParams::default(), MapStr::new())
            .await
            .unwrap();
        assert_eq!(core.calls(), vec!["create:1", "save:1"]);
    }

    #[tokio::test]
    async fn create_without_descriptor_returns_null() {
        let core = Arc::new(ScriptedCore::default());
        let out = api(&core)
            .create_set(ctx(), path(&[("app_id", "5")]), QueryParams::default(), MapStr::new())
            .await
            .unwrap();
        assert_eq!(out, Value::Null);
        assert!(core.calls().is_empty());
    }

    #[tokio::test]
    async fn create_propagates_model_resolution_error_unchanged() {
        let core = Arc::new(ScriptedCore {
            find_object_error: Some(codes::CC_ERR_TOPO_OBJECT_SELECT_FAILED),
            ..ScriptedCore::with_objects(&[1])
        });
        let err = api(&core)
            .create_set(ctx(), path(&[("app_id", "5")]), QueryParams::default(), MapStr::new())
            .await
            .unwrap_err();
        assert_eq!(err.code(), codes::CC_ERR_TOPO_OBJECT_SELECT_FAILED);
        assert!(core.calls().is_empty());
    }

    #[tokio::test]
    async fn create_rejects_non_integer_app_id() {
        let core = Arc::new(ScriptedCore::with_objects(&[1]));
        let err = api(&core)
            .create_set(ctx(), path(&[("app_id", "abc")]), QueryParams::default(), MapStr::new())
            .await
            .unwrap_err();
        assert_eq!(err.code(), codes::CC_ERR_COMM_PARAMS_NEED_INT);
        assert!(core.conditions.lock().is_empty(), "facade must not be called");
    }

    #[tokio::test]
    async fn delete_stops_at_first_failing_descriptor() {
        let core = Arc::new(ScriptedCore {
            fail_on: HashMap::from([(2, codes::CC_ERR_COMM_NOT_FOUND)]),
            ..ScriptedCore::with_objects(&[1, 2, 3])
        });
        let err = api(&core)
            .delete_set(
                ctx(),
                path(&[("app_id", "5"), ("set_id", "9")]),
                QueryParams::default(),
                MapStr::new(),
            )
            .await
            .unwrap_err();

        assert_eq!(err.code(), codes::CC_ERR_COMM_NOT_FOUND);
        assert_eq!(core.calls(), vec!["delete:1", "delete:2"]);
    }

    #[tokio::test]
    async fn delete_scopes_condition_to_tenant_app_and_set() {
        let core = Arc::new(ScriptedCore::with_objects(&[1]));
        let out = api(&core)
            .delete_set(
                ctx(),
                path(&[("app_id", "5"), ("set_id", "9")]),
                QueryParams::default(),
                MapStr::new(),
            )
            .await
            .unwrap();
        assert_eq!(out, Value::Null);

        let cond = core.conditions.lock()[1].clone();
        assert_eq!(
            serde_json::to_value(cond.to_map_str()).unwrap(),
            json!({"bk_supplier_account": "0", "bk_app_id": 5, "bk_set_id": 9})
        );
    }

    #[tokio::test]
    async fn update_injects_ids_and_stops_at_first_failure() {
        let core = Arc::new(ScriptedCore {
            fail_on: HashMap::from([(1, codes::CC_ERR_COMM_DUPLICATE_ITEM)]),
            ..ScriptedCore::with_objects(&[1, 2])
        });
        let err = api(&core)
            .update_set(
                ctx(),
                path(&[("app_id", "5"), ("set_id", "9")]),
                QueryParams::default(),
                body(json!({"bk_set_name": "renamed"})),
            )
            .await
            .unwrap_err();

        assert_eq!(err.code(), codes::CC_ERR_COMM_DUPLICATE_ITEM);
        assert_eq!(core.calls(), vec!["update:1"]);
        assert_eq!(
            serde_json::to_value(&core.updates.lock()[0]).unwrap(),
            json!({"bk_set_name": "renamed", "bk_app_id": 5, "bk_set_id": 9})
        );
    }

    #[tokio::test]
    async fn update_applies_to_every_descriptor() {
        let core = Arc::new(ScriptedCore::with_objects(&[1, 2, 3]));
        api(&core)
            .update_set(
                ctx(),
                path(&[("app_id", "5"), ("set_id", "9")]),
                QueryParams::default(),
                MapStr::new(),
            )
            .await
            .unwrap();
        assert_eq!(core.calls(), vec!["update:1", "update:2", "update:3"]);
    }

    #[tokio::test]
    async fn search_sums_counts_and_concatenates_in_resolution_order() {
        let core = Arc::new(ScriptedCore {
            found: HashMap::from([
                (1, vec![body(json!({"bk_set_id": 1})), body(json!({"bk_set_id": 2}))]),
                (2, vec![]),
                (3, vec![body(json!({"bk_set_id": 3}))]),
            ]),
            ..ScriptedCore::with_objects(&[1, 2, 3])
        });
        let out = api(&core)
            .search_set(
                ctx(),
                path(&[("owner_id", "0"), ("app_id", "5")]),
                QueryParams::default(),
                MapStr::new(),
            )
            .await
            .unwrap();

        assert_eq!(
            out,
            json!({"count": 3, "info": [{"bk_set_id": 1}, {"bk_set_id": 2}, {"bk_set_id": 3}]})
        );
        assert_eq!(core.calls(), vec!["find:1", "find:2", "find:3"]);

        let object_cond = core.conditions.lock()[0].clone();
        assert_eq!(object_cond.eq_value(BK_OWNER_ID_FIELD), Some(&json!("0")));
        assert_eq!(object_cond.eq_value(BK_OBJ_ID_FIELD), Some(&json!("set")));
        assert_eq!(object_cond.eq_value(BK_APP_ID_FIELD), Some(&json!(5)));
    }

    #[tokio::test]
    async fn search_with_no_descriptor_is_empty() {
        let core = Arc::new(ScriptedCore::default());
        let out = api(&core)
            .search_set(
                ctx(),
                path(&[("owner_id", "0"), ("app_id", "5")]),
                QueryParams::default(),
                MapStr::new(),
            )
            .await
            .unwrap();
        assert_eq!(out, json!({"count": 0, "info": []}));
    }

    #[tokio::test]
    async fn search_surfaces_find_error() {
        let core = Arc::new(ScriptedCore {
            fail_on: HashMap::from([(1, codes::CC_ERR_COMM_NOT_FOUND)]),
            ..ScriptedCore::with_objects(&[1, 2])
        });
        let err = api(&core)
            .search_set(
                ctx(),
                path(&[("owner_id", "0"), ("app_id", "5")]),
                QueryParams::default(),
                MapStr::new(),
            )
            .await
            .unwrap_err();
        assert_eq!(err.code(), codes::CC_ERR_COMM_NOT_FOUND);
        assert_eq!(core.calls(), vec!["find:1"]);
    }
}
