use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::Method;
use serde_json::json;
use tracing::debug;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::{supabase::SupabaseClient, StorageError};

use crate::models::WeeklyTemplate;
use crate::services::template::TemplateStore;

const TABLE: &str = "/rest/v1/clinician_schedules";

/// `clinician_schedules` table, unique on `clinician_id`. Rows have the same
/// shape as [`WeeklyTemplate`], with the weekly schedule stored as JSON.
pub struct SupabaseTemplateStore {
    supabase: SupabaseClient,
}

impl SupabaseTemplateStore {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }
}

fn upsert_headers(resolution: &'static str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert("Prefer", HeaderValue::from_static(resolution));
    headers
}

#[async_trait]
impl TemplateStore for SupabaseTemplateStore {
    async fn find(&self, clinician_id: Uuid) -> Result<Option<WeeklyTemplate>, StorageError> {
        let path = format!("{}?clinician_id=eq.{}", TABLE, clinician_id);
        let rows: Vec<WeeklyTemplate> = self.supabase.request(Method::GET, &path, None, None).await?;
        Ok(rows.into_iter().next())
    }

    async fn insert_if_absent(&self, template: WeeklyTemplate) -> Result<WeeklyTemplate, StorageError> {
        let clinician_id = template.clinician_id;
        let path = format!("{}?on_conflict=clinician_id", TABLE);

        // An ignored duplicate comes back as an empty list.
        let inserted: Vec<WeeklyTemplate> = self
            .supabase
            .request_with_headers(
                Method::POST,
                &path,
                None,
                Some(json!(template)),
                Some(upsert_headers("resolution=ignore-duplicates,return=representation")),
            )
            .await?;

        if let Some(row) = inserted.into_iter().next() {
            return Ok(row);
        }

        debug!("Template for clinician {} already existed", clinician_id);
        self.find(clinician_id)
            .await?
            .ok_or_else(|| StorageError::NotFound(format!("Template for clinician {}", clinician_id)))
    }

    async fn save(&self, template: WeeklyTemplate) -> Result<WeeklyTemplate, StorageError> {
        let path = format!("{}?on_conflict=clinician_id", TABLE);

        let saved: Vec<WeeklyTemplate> = self
            .supabase
            .request_with_headers(
                Method::POST,
                &path,
                None,
                Some(json!(template)),
                Some(upsert_headers("resolution=merge-duplicates,return=representation")),
            )
            .await?;

        saved
            .into_iter()
            .next()
            .ok_or_else(|| StorageError::Malformed("Upsert returned no rows".to_string()))
    }
}
