use futures::stream::BoxStream;
use tracing::debug;

use crate::{
    client::StoreClient,
    cursor::QueryResults,
    error::{DatabaseError, DatabaseResult, StoreError},
    link::database_link,
    model::{Database, Resource},
    options::{DatabaseDefinition, FeedOptions, QuerySpec},
};

const TARGET: &str = "cosmosdal::database";

fn translate(link: &str, err: StoreError) -> DatabaseError {
    debug!(target: TARGET, %link, status_code = err.status_code, message = %err.message, "store fault");
    err.into()
}

/// Creates, deletes, lists and looks up databases.
///
/// Every failure is reported as a [`DatabaseError`], whatever its status code.
#[derive(Debug)]
pub struct DatabaseManager<'a, C: StoreClient + ?Sized> {
    client: &'a C,
}

impl<'a, C: StoreClient + ?Sized> DatabaseManager<'a, C> {
    pub fn new(client: &'a C) -> Self {
        Self { client }
    }

    /// Creates a database.
    ///
    /// # Errors
    ///
    /// Returns a [`DatabaseError`] with status 409 if a database with this id already exists, or
    /// with the store's status for any other failure.
    pub async fn create(&self, database_id: &str) -> DatabaseResult<Database> {
        let link = database_link(database_id);
        debug!(target: TARGET, %link, "creating database");

        let native = self
            .client
            .create_database(DatabaseDefinition::new(database_id))
            .await
            .map_err(|err| translate(&link, err))?;

        Database::from_native(native).map_err(|err| translate(&link, err))
    }

    /// Deletes a database together with its collections and documents.
    ///
    /// # Errors
    ///
    /// Returns a [`DatabaseError`] with status 404 if the database does not exist.
    pub async fn delete(&self, database_id: &str) -> DatabaseResult<()> {
        let link = database_link(database_id);
        debug!(target: TARGET, %link, "deleting database");

        self.client
            .delete_database(&link)
            .await
            .map_err(|err| translate(&link, err))
    }

    /// Reads a database by id.
    ///
    /// # Errors
    ///
    /// Returns a [`DatabaseError`] with status 404 if the database does not exist.
    pub async fn get(&self, database_id: &str) -> DatabaseResult<Database> {
        let link = database_link(database_id);
        debug!(target: TARGET, %link, "reading database");

        let native = self
            .client
            .read_database(&link)
            .await
            .map_err(|err| translate(&link, err))?;

        Database::from_native(native).map_err(|err| translate(&link, err))
    }

    /// Looks a database up by id, returning `None` when no database matches.
    ///
    /// # Errors
    ///
    /// Returns a [`DatabaseError`] only when the store fails; a missing database is not an error.
    pub async fn find(&self, database_id: &str) -> DatabaseResult<Option<Database>> {
        debug!(target: TARGET, id = database_id, "finding database");

        let mut results = QueryResults::<Database>::new(
            self.client
                .query_databases(QuerySpec::by_id(database_id), FeedOptions::new()),
        );

        Ok(results
            .fetch_next()
            .await
            .inspect_err(|err| {
                debug!(target: TARGET, status_code = err.status_code, message = %err.message, "store fault")
            })?
            .into_iter()
            .next())
    }

    /// Lists every database.
    ///
    /// The returned stream is lazy and fresh on every call: nothing is sent to the store until it
    /// is first polled.
    pub fn list(&self) -> BoxStream<'a, DatabaseResult<Database>> {
        debug!(target: TARGET, "listing databases");

        QueryResults::<Database>::new(self.client.read_databases(FeedOptions::new())).into_stream()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manager::testing::RecordingClient;
    use futures::TryStreamExt;
    use serde_json::json;

    #[tokio::test]
    async fn test_operations_address_the_database_link() {
        let client = RecordingClient::default();
        let databases = DatabaseManager::new(&client);

        let created = databases.create("my_db").await.unwrap();
        assert_eq!(created.resource_id(), "my_db");

        databases.get("my_db").await.unwrap();
        databases.delete("my_db").await.unwrap();

        assert_eq!(
            client.calls(),
            ["create_database my_db", "read_database dbs/my_db", "delete_database dbs/my_db"]
        );
    }

    #[tokio::test]
    async fn test_store_faults_become_database_errors() {
        let client = RecordingClient::failing(StoreError::not_found("Resource Not Found"));
        let databases = DatabaseManager::new(&client);

        let err = databases.delete("missing").await.unwrap_err();
        assert_eq!(err.status_code, 404);
        assert_eq!(err.message, "Resource Not Found");

        let err = databases.find("missing").await.unwrap_err();
        assert_eq!(err.status_code, 404);
    }

    #[tokio::test]
    async fn test_find_sends_the_id_query() {
        let client = RecordingClient::with_records(vec![json!({ "id": "my_db" })]);
        let databases = DatabaseManager::new(&client);

        let found = databases.find("my_db").await.unwrap();
        assert_eq!(found.unwrap().resource_id(), "my_db");
        assert_eq!(
            client.calls(),
            [r#"query_databases SELECT * FROM r WHERE r.id=@id [@id="my_db"]"#]
        );

        let client = RecordingClient::default();
        assert!(DatabaseManager::new(&client).find("nothing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_is_lazy() {
        let client = RecordingClient::with_records(vec![json!({ "id": "a" }), json!({ "id": "b" })]);
        let databases = DatabaseManager::new(&client);

        let stream = databases.list();
        assert_eq!(client.fetches(), 0);

        let ids = stream
            .map_ok(|database| database.resource_id().to_string())
            .try_collect::<Vec<_>>()
            .await
            .unwrap();
        assert_eq!(ids, ["a", "b"]);
        assert_eq!(client.fetches(), 2);
    }
}
