//! In-memory [`Core`] implementation backed by [`DashMap`].
//!
//! Model descriptors live in a small ordered list; instances are stored per
//! descriptor row id. Instance ids come from one counter shared by every
//! model, so they are unique across the whole store.

use std::cmp::Ordering;
use std::sync::atomic::{AtomicI64, Ordering as AtomicOrdering};

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::RwLock;
use serde_json::Value;
use topo_core::fields::BK_OWNER_ID_FIELD;
use topo_core::{codes, CcError, Condition, Inst, MapStr, Object, QueryInput};
use tracing::debug;

use crate::context::ContextParams;
use crate::traits::{Core, InstOperation, ObjectOperation};

/// Concurrent in-memory model and instance store.
pub struct MemoryCore {
    objects: RwLock<Vec<Object>>,
    instances: DashMap<i64, Vec<MapStr>>,
    next_id: AtomicI64,
}

impl MemoryCore {
    #[must_use]
    pub fn new() -> Self {
        Self {
            objects: RwLock::new(Vec::new()),
            instances: DashMap::new(),
            next_id: AtomicI64::new(1),
        }
    }

    /// Registers a model descriptor. Descriptors are resolved in insertion
    /// order.
    pub fn add_object(&self, object: Object) {
        self.objects.write().push(object);
    }

    /// Number of stored instances of `object`.
    #[must_use]
    pub fn instance_count(&self, object: &Object) -> usize {
        self.instances.get(&object.id).map_or(0, |rows| rows.len())
    }
}

impl Default for MemoryCore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ObjectOperation for MemoryCore {
    /// Items on fields a descriptor does not carry (e.g. `bk_app_id` scoping)
    /// are skipped; every other item must match.
    async fn find_object(
        &self,
        _params: &ContextParams,
        cond: &Condition,
    ) -> Result<Vec<Object>, CcError> {
        Ok(self
            .objects
            .read()
            .iter()
            .filter(|object| {
                let descriptor = object.to_map_str();
                cond.items()
                    .iter()
                    .filter(|item| descriptor.exists(&item.field))
                    .all(|item| item.matches(&descriptor))
            })
            .cloned()
            .collect())
    }
}

#[async_trait]
impl InstOperation for MemoryCore {
    async fn create_inst(
        &self,
        params: &ContextParams,
        obj: &Object,
        mut data: MapStr,
    ) -> Result<Inst, CcError> {
        data.remove(&obj.instance_id_field);
        data.set(BK_OWNER_ID_FIELD, params.supplier_account.clone());
        Ok(Inst::new(obj.clone(), data))
    }

    async fn save_inst(&self, _params: &ContextParams, inst: &mut Inst) -> Result<(), CcError> {
        let id_field = inst.object().instance_id_field.clone();
        let object_id = inst.object().id;

        let mut rows = self.instances.entry(object_id).or_default();
        if let Some(id) = inst.inst_id() {
            let existing = rows
                .iter_mut()
                .find(|row| row.get_i64(&id_field).ok() == Some(id));
            if let Some(row) = existing {
                row.clone_from(inst.data());
                return Ok(());
            }
        } else {
            let id = self.next_id.fetch_add(1, AtomicOrdering::Relaxed);
            inst.data_mut().set(id_field, id);
        }

        debug!("saved instance {:?} of model {}", inst.inst_id(), inst.object().obj_id);
        rows.push(inst.data().clone());
        Ok(())
    }

    async fn delete_inst(
        &self,
        params: &ContextParams,
        obj: &Object,
        cond: &Condition,
    ) -> Result<(), CcError> {
        let removed = self.instances.get_mut(&obj.id).map_or(0, |mut rows| {
            let before = rows.len();
            rows.retain(|row| !cond.matches(row));
            before - rows.len()
        });

        if removed == 0 {
            return Err(params.err.error(codes::CC_ERR_COMM_NOT_FOUND));
        }
        debug!("deleted {} instance(s) of model {}", removed, obj.obj_id);
        Ok(())
    }

    async fn update_inst(
        &self,
        params: &ContextParams,
        data: &MapStr,
        obj: &Object,
        cond: &Condition,
    ) -> Result<(), CcError> {
        let mut updated = 0_usize;
        if let Some(mut rows) = self.instances.get_mut(&obj.id) {
            for row in rows.iter_mut().filter(|row| cond.matches(row)) {
                row.merge(data);
                updated += 1;
            }
        }

        if updated == 0 {
            return Err(params.err.error(codes::CC_ERR_COMM_NOT_FOUND));
        }
        debug!("updated {} instance(s) of model {}", updated, obj.obj_id);
        Ok(())
    }

    async fn find_inst(
        &self,
        _params: &ContextParams,
        obj: &Object,
        query: &QueryInput,
    ) -> Result<(u64, Vec<Inst>), CcError> {
        let cond = Condition::from_map_str(&query.condition)
            .map_err(|err| CcError::Internal(err.into()))?;

        let mut rows: Vec<MapStr> = self
            .instances
            .get(&obj.id)
            .map(|rows| rows.iter().filter(|row| cond.matches(row)).cloned().collect())
            .unwrap_or_default();
        let count = rows.len() as u64;

        if !query.sort.is_empty() {
            let (field, descending) = match query.sort.strip_prefix('-') {
                Some(field) => (field, true),
                None => (query.sort.as_str(), false),
            };
            rows.sort_by(|a, b| {
                let ordering = compare_field(a.get(field), b.get(field));
                if descending {
                    ordering.reverse()
                } else {
                    ordering
                }
            });
        }

        let start = usize::try_from(query.start).unwrap_or(usize::MAX);
        let limit = match query.limit {
            0 => usize::MAX,
            n => usize::try_from(n).unwrap_or(usize::MAX),
        };

        let items = rows
            .into_iter()
            .skip(start)
            .take(limit)
            .map(|row| Inst::new(obj.clone(), project(row, &query.fields)))
            .collect();
        Ok((count, items))
    }
}

impl Core for MemoryCore {
    fn object_operation(&self) -> &dyn ObjectOperation {
        self
    }

    fn inst_operation(&self) -> &dyn InstOperation {
        self
    }
}

/// Keeps only `fields` when the list is non-empty.
fn project(row: MapStr, fields: &[String]) -> MapStr {
    if fields.is_empty() {
        return row;
    }
    row.into_inner()
        .into_iter()
        .filter(|(key, _)| fields.contains(key))
        .collect()
}

/// Sort order: numbers before strings, missing values last.
fn compare_field(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Greater,
        (Some(_), None) => Ordering::Less,
        (Some(Value::Number(x)), Some(Value::Number(y))) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Some(Value::Number(_)), Some(_)) => Ordering::Less,
        (Some(_), Some(Value::Number(_))) => Ordering::Greater,
        (Some(x), Some(y)) => x.to_string().cmp(&y.to_string()),
    }
}
