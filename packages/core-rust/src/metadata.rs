//! Model descriptors, instances and query inputs exchanged with the
//! operation facade.

use serde::{Deserialize, Serialize};

use crate::mapstr::MapStr;

/// Well-known field names and built-in object ids.
pub mod fields {
    pub const BK_OWNER_ID_FIELD: &str = "bk_supplier_account";
    pub const BK_OBJ_ID_FIELD: &str = "bk_obj_id";
    pub const BK_OBJ_NAME_FIELD: &str = "bk_obj_name";
    pub const BK_APP_ID_FIELD: &str = "bk_app_id";
    pub const BK_SET_ID_FIELD: &str = "bk_set_id";
    pub const BK_SET_NAME_FIELD: &str = "bk_set_name";

    /// Object id of the built-in Set model.
    pub const BK_INNER_OBJ_ID_SET: &str = "set";
}

/// A resolved model descriptor, scoped to one tenant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Object {
    /// Row id of the descriptor itself.
    pub id: i64,
    #[serde(rename = "bk_obj_id")]
    pub obj_id: String,
    #[serde(rename = "bk_obj_name")]
    pub obj_name: String,
    #[serde(rename = "bk_supplier_account")]
    pub owner_id: String,
    /// Instance field that holds the generated instance id.
    pub instance_id_field: String,
}

impl Object {
    #[must_use]
    pub fn new(
        id: i64,
        obj_id: impl Into<String>,
        obj_name: impl Into<String>,
        owner_id: impl Into<String>,
        instance_id_field: impl Into<String>,
    ) -> Self {
        Self {
            id,
            obj_id: obj_id.into(),
            obj_name: obj_name.into(),
            owner_id: owner_id.into(),
            instance_id_field: instance_id_field.into(),
        }
    }

    /// Descriptor fields as a map, for evaluating object conditions.
    #[must_use]
    pub fn to_map_str(&self) -> MapStr {
        let mut m = MapStr::new();
        m.set("id", self.id)
            .set(fields::BK_OBJ_ID_FIELD, self.obj_id.clone())
            .set(fields::BK_OBJ_NAME_FIELD, self.obj_name.clone())
            .set(fields::BK_OWNER_ID_FIELD, self.owner_id.clone());
        m
    }
}

/// A model instance: its descriptor plus schema-less data.
#[derive(Debug, Clone, PartialEq)]
pub struct Inst {
    object: Object,
    data: MapStr,
}

impl Inst {
    #[must_use]
    pub fn new(object: Object, data: MapStr) -> Self {
        Self { object, data }
    }

    #[must_use]
    pub fn object(&self) -> &Object {
        &self.object
    }

    #[must_use]
    pub fn data(&self) -> &MapStr {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut MapStr {
        &mut self.data
    }

    /// Instance id, once the instance has been saved.
    #[must_use]
    pub fn inst_id(&self) -> Option<i64> {
        self.data.get_i64(&self.object.instance_id_field).ok()
    }

    /// External representation returned to API clients.
    #[must_use]
    pub fn to_map_str(&self) -> MapStr {
        self.data.clone()
    }
}

/// Paged query against instances of one model.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryInput {
    #[serde(default)]
    pub condition: MapStr,
    #[serde(default)]
    pub fields: Vec<String>,
    #[serde(default)]
    pub start: u64,
    /// Zero means no limit.
    #[serde(default)]
    pub limit: u64,
    #[serde(default)]
    pub sort: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set_object() -> Object {
        Object::new(1, fields::BK_INNER_OBJ_ID_SET, "Set", "0", fields::BK_SET_ID_FIELD)
    }

    #[test]
    fn object_map_uses_wire_field_names() {
        let m = set_object().to_map_str();
        assert_eq!(m.get_str(fields::BK_OBJ_ID_FIELD).unwrap(), "set");
        assert_eq!(m.get_str(fields::BK_OWNER_ID_FIELD).unwrap(), "0");
    }

    #[test]
    fn inst_id_reads_descriptor_id_field() {
        let mut inst = Inst::new(set_object(), MapStr::new());
        assert_eq!(inst.inst_id(), None);
        inst.data_mut().set(fields::BK_SET_ID_FIELD, 9);
        assert_eq!(inst.inst_id(), Some(9));
    }

    #[test]
    fn query_input_defaults_from_empty_json() {
        let q: QueryInput = serde_json::from_str("{}").unwrap();
        assert_eq!(q, QueryInput::default());
    }
}
