// src/query.rs

use serde::Serialize;
use serde_json::{Map, Value};
use std::marker::PhantomData;
use tokio::task::JoinHandle;

use crate::{backend::Collaborator, error::ModelError, model::Model, record::ParseRecord};

/// The untyped query description handed to the collaborator: target class,
/// `where` conditions, and result-shaping options.
#[derive(Debug, Clone)]
pub struct QueryPlan {
    class_name: String,
    conditions: Map<String, Value>,
    limit: Option<isize>,
    skip: Option<usize>,
    order: Option<String>,
    include: Option<String>,
    keys: Option<String>, // For selecting specific fields
}

impl QueryPlan {
    pub fn new(class_name: &str) -> Self {
        Self {
            class_name: class_name.to_string(),
            conditions: Map::new(),
            limit: None,
            skip: None,
            order: None,
            include: None,
            keys: None,
        }
    }

    /// Returns the class name this query targets.
    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    pub fn conditions(&self) -> &Map<String, Value> {
        &self.conditions
    }

    pub fn result_limit(&self) -> Option<isize> {
        self.limit
    }

    pub fn result_skip(&self) -> Option<usize> {
        self.skip
    }

    pub fn sort_order(&self) -> Option<&str> {
        self.order.as_deref()
    }

    // Helper to add a simple condition like "field": "value"
    fn add_simple_condition(&mut self, key: &str, value: Value) -> &mut Self {
        self.conditions.insert(key.to_string(), value);
        self
    }

    // Helper to add an operator condition like "field": {"$op": "value"}
    fn add_operator_condition(&mut self, key: &str, operator: &str, value: Value) -> &mut Self {
        let mut op_map = Map::new();
        op_map.insert(operator.to_string(), value);
        self.conditions
            .insert(key.to_string(), Value::Object(op_map));
        self
    }

    /// Adds a constraint that a field must be equal to a specified value.
    pub fn equal_to<V: Serialize>(&mut self, key: &str, value: V) -> &mut Self {
        match serde_json::to_value(value) {
            Ok(json_val) => self.add_simple_condition(key, json_val),
            Err(_) => self,
        }
    }

    /// Adds a constraint that a field must not be equal to a specified value.
    pub fn not_equal_to<V: Serialize>(&mut self, key: &str, value: V) -> &mut Self {
        match serde_json::to_value(value) {
            Ok(json_val) => self.add_operator_condition(key, "$ne", json_val),
            Err(_) => self,
        }
    }

    /// Adds a constraint that a field must exist.
    pub fn exists(&mut self, key: &str) -> &mut Self {
        self.add_operator_condition(key, "$exists", Value::Bool(true))
    }

    /// Adds a constraint that a field must not exist.
    pub fn does_not_exist(&mut self, key: &str) -> &mut Self {
        self.add_operator_condition(key, "$exists", Value::Bool(false))
    }

    pub fn greater_than<V: Serialize>(&mut self, key: &str, value: V) -> &mut Self {
        match serde_json::to_value(value) {
            Ok(json_val) => self.add_operator_condition(key, "$gt", json_val),
            Err(_) => self,
        }
    }

    pub fn greater_than_or_equal_to<V: Serialize>(&mut self, key: &str, value: V) -> &mut Self {
        match serde_json::to_value(value) {
            Ok(json_val) => self.add_operator_condition(key, "$gte", json_val),
            Err(_) => self,
        }
    }

    pub fn less_than<V: Serialize>(&mut self, key: &str, value: V) -> &mut Self {
        match serde_json::to_value(value) {
            Ok(json_val) => self.add_operator_condition(key, "$lt", json_val),
            Err(_) => self,
        }
    }

    pub fn less_than_or_equal_to<V: Serialize>(&mut self, key: &str, value: V) -> &mut Self {
        match serde_json::to_value(value) {
            Ok(json_val) => self.add_operator_condition(key, "$lte", json_val),
            Err(_) => self,
        }
    }

    /// Constrains a field's value to be contained in the provided list.
    pub fn contained_in<V: Serialize>(&mut self, key: &str, values: Vec<V>) -> &mut Self {
        match serde_json::to_value(values) {
            Ok(json_val_array) => self.add_operator_condition(key, "$in", json_val_array),
            Err(_) => self,
        }
    }

    /// Constrains a field's value to not be contained in the provided list.
    pub fn not_contained_in<V: Serialize>(&mut self, key: &str, values: Vec<V>) -> &mut Self {
        match serde_json::to_value(values) {
            Ok(json_val_array) => self.add_operator_condition(key, "$nin", json_val_array),
            Err(_) => self,
        }
    }

    /// Constrains a string field to start with a given prefix.
    pub fn starts_with(&mut self, key: &str, prefix: &str) -> &mut Self {
        self.add_operator_condition(
            key,
            "$regex",
            Value::String(format!("^{}", regex::escape(prefix))),
        )
    }

    /// Constrains a string field to end with a given suffix.
    pub fn ends_with(&mut self, key: &str, suffix: &str) -> &mut Self {
        self.add_operator_condition(
            key,
            "$regex",
            Value::String(format!("{}$", regex::escape(suffix))),
        )
    }

    /// Constrains a string field to contain a given substring.
    pub fn contains(&mut self, key: &str, substring: &str) -> &mut Self {
        self.add_operator_condition(
            key,
            "$regex",
            Value::String(format!(".*{}.*", regex::escape(substring))),
        )
    }

    /// Sets the maximum number of results to return.
    pub fn limit(&mut self, count: isize) -> &mut Self {
        self.limit = Some(count);
        self
    }

    /// Sets the number of results to skip before returning.
    pub fn skip(&mut self, count: usize) -> &mut Self {
        self.skip = Some(count);
        self
    }

    /// Sorts by `key` ascending. Replaces any existing sort order.
    pub fn order_by_ascending(&mut self, key: &str) -> &mut Self {
        self.order = Some(key.to_string());
        self
    }

    /// Sorts by `key` descending. Replaces any existing sort order.
    pub fn order_by_descending(&mut self, key: &str) -> &mut Self {
        self.order = Some(format!("-{}", key));
        self
    }

    /// Includes nested objects for the given pointer key(s).
    pub fn include(&mut self, keys_to_include: &[&str]) -> &mut Self {
        let current_include = self.include.take().unwrap_or_default();
        let mut include_parts: Vec<&str> = current_include
            .split(',')
            .filter(|s| !s.is_empty())
            .collect();
        include_parts.extend(keys_to_include.iter().copied());
        include_parts.sort_unstable();
        include_parts.dedup();
        self.include = Some(include_parts.join(","));
        self
    }

    /// Restricts the fields returned for all matching objects.
    pub fn select(&mut self, keys_to_select: &[&str]) -> &mut Self {
        let current_keys = self.keys.take().unwrap_or_default();
        let mut select_parts: Vec<&str> =
            current_keys.split(',').filter(|s| !s.is_empty()).collect();
        select_parts.extend(keys_to_select.iter().copied());
        select_parts.sort_unstable();
        select_parts.dedup();
        self.keys = Some(select_parts.join(","));
        self
    }

    /// Renders the plan as URL query parameters in the REST wire shape.
    pub fn build_query_params(&self) -> Vec<(String, String)> {
        let mut params = Vec::new();
        if !self.conditions.is_empty() {
            if let Ok(where_json) = serde_json::to_string(&self.conditions) {
                params.push(("where".to_string(), where_json));
            }
        }
        if let Some(limit_val) = self.limit {
            params.push(("limit".to_string(), limit_val.to_string()));
        }
        if let Some(skip_val) = self.skip {
            params.push(("skip".to_string(), skip_val.to_string()));
        }
        if let Some(order_val) = &self.order {
            params.push(("order".to_string(), order_val.clone()));
        }
        if let Some(include_val) = &self.include {
            params.push(("include".to_string(), include_val.clone()));
        }
        if let Some(keys_val) = &self.keys {
            params.push(("keys".to_string(), keys_val.clone()));
        }
        params
    }
}

/// A query bound to one model type. Raw result records are adopted through
/// [`Model::from_record`], so results come back typed.
///
/// Every execution has an awaitable form and a `_in_background` form; the
/// latter submits the work to the collaborator's executor and invokes its
/// callback exactly once with the mapped `Result`.
#[derive(Debug, Clone)]
pub struct ModelQuery<M: Model, C: Collaborator> {
    plan: QueryPlan,
    backend: C,
    _model: PhantomData<fn() -> M>,
}

impl<M: Model, C: Collaborator> ModelQuery<M, C> {
    pub fn new(backend: C) -> Self {
        Self {
            plan: QueryPlan::new(M::class_name()),
            backend,
            _model: PhantomData,
        }
    }

    pub fn plan(&self) -> &QueryPlan {
        &self.plan
    }

    pub fn equal_to<V: Serialize>(&mut self, key: &str, value: V) -> &mut Self {
        self.plan.equal_to(key, value);
        self
    }

    pub fn not_equal_to<V: Serialize>(&mut self, key: &str, value: V) -> &mut Self {
        self.plan.not_equal_to(key, value);
        self
    }

    pub fn exists(&mut self, key: &str) -> &mut Self {
        self.plan.exists(key);
        self
    }

    pub fn does_not_exist(&mut self, key: &str) -> &mut Self {
        self.plan.does_not_exist(key);
        self
    }

    pub fn greater_than<V: Serialize>(&mut self, key: &str, value: V) -> &mut Self {
        self.plan.greater_than(key, value);
        self
    }

    pub fn greater_than_or_equal_to<V: Serialize>(&mut self, key: &str, value: V) -> &mut Self {
        self.plan.greater_than_or_equal_to(key, value);
        self
    }

    pub fn less_than<V: Serialize>(&mut self, key: &str, value: V) -> &mut Self {
        self.plan.less_than(key, value);
        self
    }

    pub fn less_than_or_equal_to<V: Serialize>(&mut self, key: &str, value: V) -> &mut Self {
        self.plan.less_than_or_equal_to(key, value);
        self
    }

    pub fn contained_in<V: Serialize>(&mut self, key: &str, values: Vec<V>) -> &mut Self {
        self.plan.contained_in(key, values);
        self
    }

    pub fn not_contained_in<V: Serialize>(&mut self, key: &str, values: Vec<V>) -> &mut Self {
        self.plan.not_contained_in(key, values);
        self
    }

    pub fn starts_with(&mut self, key: &str, prefix: &str) -> &mut Self {
        self.plan.starts_with(key, prefix);
        self
    }

    pub fn ends_with(&mut self, key: &str, suffix: &str) -> &mut Self {
        self.plan.ends_with(key, suffix);
        self
    }

    pub fn contains(&mut self, key: &str, substring: &str) -> &mut Self {
        self.plan.contains(key, substring);
        self
    }

    pub fn limit(&mut self, count: isize) -> &mut Self {
        self.plan.limit(count);
        self
    }

    pub fn skip(&mut self, count: usize) -> &mut Self {
        self.plan.skip(count);
        self
    }

    pub fn order_by_ascending(&mut self, key: &str) -> &mut Self {
        self.plan.order_by_ascending(key);
        self
    }

    pub fn order_by_descending(&mut self, key: &str) -> &mut Self {
        self.plan.order_by_descending(key);
        self
    }

    pub fn include(&mut self, keys_to_include: &[&str]) -> &mut Self {
        self.plan.include(keys_to_include);
        self
    }

    pub fn select(&mut self, keys_to_select: &[&str]) -> &mut Self {
        self.plan.select(keys_to_select);
        self
    }

    fn adopt(records: Vec<ParseRecord>) -> Vec<M> {
        records
            .into_iter()
            .map(|mut record| {
                record.class_name = M::class_name().to_string();
                M::from_record(record)
            })
            .collect()
    }

    /// Executes the query and adopts every raw result, in the
    /// collaborator's reported order.
    pub async fn find(&self) -> Result<Vec<M>, ModelError> {
        let records = self.backend.find(&self.plan).await?;
        Ok(Self::adopt(records))
    }

    /// Like [`find`](Self::find), but only the first match.
    pub async fn first(&self) -> Result<Option<M>, ModelError> {
        let record = self.backend.first(&self.plan).await?;
        Ok(record.map(|mut record| {
            record.class_name = M::class_name().to_string();
            M::from_record(record)
        }))
    }

    /// Fetches one object by identifier, ignoring other constraints.
    pub async fn get(&self, object_id: &str) -> Result<M, ModelError> {
        let mut record = self.backend.get(self.plan.class_name(), object_id).await?;
        record.class_name = M::class_name().to_string();
        Ok(M::from_record(record))
    }

    /// Counts matching objects; no adapters are constructed.
    pub async fn count(&self) -> Result<u64, ModelError> {
        self.backend.count(&self.plan).await
    }
}

impl<M, C> ModelQuery<M, C>
where
    M: Model,
    C: Collaborator + Clone + 'static,
{
    /// Background form of [`find`](Self::find); `callback` is invoked
    /// exactly once with the mapped result.
    pub fn find_in_background<F>(&self, callback: F) -> JoinHandle<()>
    where
        F: FnOnce(Result<Vec<M>, ModelError>) + Send + 'static,
    {
        let plan = self.plan.clone();
        let backend = self.backend.clone();
        tokio::spawn(async move {
            let result = backend.find(&plan).await.map(Self::adopt);
            callback(result);
        })
    }

    /// Background form of [`first`](Self::first).
    pub fn first_in_background<F>(&self, callback: F) -> JoinHandle<()>
    where
        F: FnOnce(Result<Option<M>, ModelError>) + Send + 'static,
    {
        let plan = self.plan.clone();
        let backend = self.backend.clone();
        tokio::spawn(async move {
            let result = backend.first(&plan).await.map(|record| {
                record.map(|mut record| {
                    record.class_name = M::class_name().to_string();
                    M::from_record(record)
                })
            });
            callback(result);
        })
    }

    /// Background form of [`get`](Self::get).
    pub fn get_in_background<F>(&self, object_id: &str, callback: F) -> JoinHandle<()>
    where
        F: FnOnce(Result<M, ModelError>) + Send + 'static,
    {
        let plan = self.plan.clone();
        let backend = self.backend.clone();
        let object_id = object_id.to_string();
        tokio::spawn(async move {
            let result = backend
                .get(plan.class_name(), &object_id)
                .await
                .map(|mut record| {
                    record.class_name = M::class_name().to_string();
                    M::from_record(record)
                });
            callback(result);
        })
    }

    /// Background form of [`count`](Self::count).
    pub fn count_in_background<F>(&self, callback: F) -> JoinHandle<()>
    where
        F: FnOnce(Result<u64, ModelError>) + Send + 'static,
    {
        let plan = self.plan.clone();
        let backend = self.backend.clone();
        tokio::spawn(async move {
            callback(backend.count(&plan).await);
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn empty_plan_builds_no_params() {
        let plan = QueryPlan::new("Post");
        assert!(plan.build_query_params().is_empty());
    }

    #[test]
    fn conditions_render_as_where_json() {
        let mut plan = QueryPlan::new("Post");
        plan.equal_to("title", "A").greater_than("score", 10);
        let params = plan.build_query_params();
        assert_eq!(params.len(), 1);
        assert_eq!(params[0].0, "where");
        let parsed: Value = serde_json::from_str(&params[0].1).unwrap();
        assert_eq!(parsed, json!({"title": "A", "score": {"$gt": 10}}));
    }

    #[test]
    fn paging_and_order_params() {
        let mut plan = QueryPlan::new("Post");
        plan.limit(5).skip(10).order_by_descending("score");
        let params = plan.build_query_params();
        assert!(params.contains(&("limit".to_string(), "5".to_string())));
        assert!(params.contains(&("skip".to_string(), "10".to_string())));
        assert!(params.contains(&("order".to_string(), "-score".to_string())));
    }

    #[test]
    fn substring_constraints_escape_regex_metacharacters() {
        let mut plan = QueryPlan::new("Post");
        plan.starts_with("title", "a.b");
        assert_eq!(
            plan.conditions()["title"],
            json!({"$regex": "^a\\.b"})
        );
    }

    #[test]
    fn include_and_select_merge_and_dedup() {
        let mut plan = QueryPlan::new("Post");
        plan.include(&["author"]).include(&["author", "comments"]);
        plan.select(&["title"]).select(&["body", "title"]);
        let params = plan.build_query_params();
        assert!(params.contains(&("include".to_string(), "author,comments".to_string())));
        assert!(params.contains(&("keys".to_string(), "body,title".to_string())));
    }
}
