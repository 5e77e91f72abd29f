//! [`DataGateway`] over the platform's HTTP API

use super::DataGateway;
use crate::error::Result;
use async_trait::async_trait;
use lumen_gateway::{Filter, GatewayClient, RowQuery, StoredObject};
use serde_json::Value;

#[async_trait]
impl DataGateway for GatewayClient {
    async fn select(&self, table: &str, query: &RowQuery) -> Result<Vec<Value>> {
        Ok(GatewayClient::select(self, table, query).await?)
    }

    async fn insert(&self, table: &str, rows: Value) -> Result<Vec<Value>> {
        Ok(GatewayClient::insert(self, table, &rows).await?)
    }

    async fn update(&self, table: &str, filters: &[Filter], patch: Value) -> Result<Vec<Value>> {
        Ok(GatewayClient::update(self, table, filters, &patch).await?)
    }

    async fn delete(&self, table: &str, filters: &[Filter]) -> Result<Vec<Value>> {
        Ok(GatewayClient::delete(self, table, filters).await?)
    }

    async fn rpc(&self, name: &str, args: Value) -> Result<Value> {
        Ok(GatewayClient::rpc(self, name, &args).await?)
    }

    async fn upload_object(
        &self,
        bucket: &str,
        path: &str,
        data: Vec<u8>,
        mime_type: &str,
    ) -> Result<StoredObject> {
        Ok(GatewayClient::upload_object(self, bucket, path, data, mime_type).await?)
    }

    async fn remove_objects(&self, bucket: &str, paths: &[String]) -> Result<()> {
        Ok(GatewayClient::remove_objects(self, bucket, paths).await?)
    }
}
