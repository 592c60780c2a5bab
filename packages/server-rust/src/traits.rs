use async_trait::async_trait;
use topo_core::{CcError, Condition, Inst, MapStr, Object, QueryInput};

use crate::context::ContextParams;

/// Model descriptor lookup.
/// Implementations: in-memory (`facade::MemoryCore`), storage-backed (external).
#[async_trait]
pub trait ObjectOperation: Send + Sync {
    /// Resolve every model descriptor matching `cond`, in resolution order.
    async fn find_object(
        &self,
        params: &ContextParams,
        cond: &Condition,
    ) -> Result<Vec<Object>, CcError>;
}

/// Instance CRUD over dynamically-typed model instances.
#[async_trait]
pub trait InstOperation: Send + Sync {
    /// Build a new, unsaved instance of `obj` from `data`.
    async fn create_inst(
        &self,
        params: &ContextParams,
        obj: &Object,
        data: MapStr,
    ) -> Result<Inst, CcError>;

    /// Persist an instance. Assigns the instance id on first save.
    async fn save_inst(&self, params: &ContextParams, inst: &mut Inst) -> Result<(), CcError>;

    /// Delete every instance of `obj` matching `cond`.
    async fn delete_inst(
        &self,
        params: &ContextParams,
        obj: &Object,
        cond: &Condition,
    ) -> Result<(), CcError>;

    /// Merge `data` into every instance of `obj` matching `cond`.
    async fn update_inst(
        &self,
        params: &ContextParams,
        data: &MapStr,
        obj: &Object,
        cond: &Condition,
    ) -> Result<(), CcError>;

    /// Returns the total match count and the requested page of instances.
    async fn find_inst(
        &self,
        params: &ContextParams,
        obj: &Object,
        query: &QueryInput,
    ) -> Result<(u64, Vec<Inst>), CcError>;
}

/// Operation facade handed to resource handlers.
pub trait Core: Send + Sync {
    fn object_operation(&self) -> &dyn ObjectOperation;
    fn inst_operation(&self) -> &dyn InstOperation;
}
