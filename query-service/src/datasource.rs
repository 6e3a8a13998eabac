//! Datasource persistence used by the import flow.

use common::errors::AppResult;
use common::events::{notify, Event, EventEmitter};
use common::models::Datasource;
use common::store::AppDb;
use common::utils::IdGenerator;

/// Stores a datasource, minting an id for new ones.
pub async fn save_datasource(
    db: &AppDb,
    events: &dyn EventEmitter,
    mut datasource: Datasource,
) -> AppResult<Datasource> {
    let created = datasource.rev.is_none();
    let id = match &datasource.id {
        Some(id) => id.clone(),
        None => {
            let id = IdGenerator::datasource_id();
            datasource.id = Some(id.clone());
            id
        }
    };

    let rev = db.put(&datasource).await?;
    datasource.rev = Some(rev);

    if created {
        notify(
            events,
            Event::DatasourceCreated {
                datasource_id: id.clone(),
                source: datasource.source.tag().to_string(),
            },
        )
        .await;
    }
    tracing::info!(datasource_id = %id, source = datasource.source.tag(), "datasource saved");
    Ok(datasource)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use common::events::RecordingEventEmitter;
    use common::store::MemoryDocumentStore;

    #[tokio::test]
    async fn test_new_datasource_gets_id_and_event() {
        let db = AppDb::new(Arc::new(MemoryDocumentStore::new()), "app_dev_1");
        let events = RecordingEventEmitter::new();

        let saved = save_datasource(&db, &events, Datasource::rest("Petstore", "https://pets.io"))
            .await
            .unwrap();

        let id = saved.id.clone().unwrap();
        assert!(id.starts_with("datasource_"));
        assert!(saved.rev.is_some());
        let stored: Datasource = db.get(&id).await.unwrap();
        assert_eq!(stored, saved);
        assert_eq!(
            events.events().await,
            vec![Event::DatasourceCreated { datasource_id: id, source: "REST".into() }]
        );
    }
}
