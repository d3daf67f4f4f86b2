//! MySQL implementation of the store connection.

use sqlx::mysql::{MySqlConnectOptions, MySqlConnection, MySqlSslMode};
use sqlx::Connection;

use super::connection::{Connector, StoreConnection};
use super::models::{Response, Statement};
use crate::config::StoreConfig;
use crate::domain::Table;
use crate::error::StoreError;

/// Opens single `sqlx` MySQL connections with fixed credentials.
#[derive(Debug, Clone)]
pub struct MySqlConnector {
    options: MySqlConnectOptions,
}

impl MySqlConnector {
    /// Creates a connector from explicit connect options.
    #[must_use]
    pub const fn new(options: MySqlConnectOptions) -> Self {
        Self { options }
    }

    /// Creates a connector from the `MYSQL_*` configuration keys.
    ///
    /// TLS is disabled, matching the plugin's historical `useSSL=false`.
    #[must_use]
    pub fn from_config(config: &StoreConfig) -> Self {
        let options = MySqlConnectOptions::new()
            .host(&config.mysql_host)
            .port(config.mysql_port)
            .database(&config.mysql_database)
            .username(&config.mysql_user)
            .password(&config.mysql_password)
            .ssl_mode(MySqlSslMode::Disabled);
        Self::new(options)
    }
}

impl Connector for MySqlConnector {
    type Conn = MySqlConnection;

    async fn connect(&self) -> Result<MySqlConnection, StoreError> {
        MySqlConnection::connect_with(&self.options)
            .await
            .map_err(|e| StoreError::Connect(e.to_string()))
    }
}

impl StoreConnection for MySqlConnection {
    async fn is_usable(&mut self) -> bool {
        if Connection::ping(&mut *self).await.is_err() {
            return false;
        }
        let probe = sqlx::query_scalar::<_, i64>("SELECT @@session.transaction_read_only")
            .fetch_one(&mut *self)
            .await;
        writable_after_probe(probe)
    }

    async fn close(self) -> Result<(), StoreError> {
        Connection::close(self).await.map_err(StoreError::from)
    }

    async fn execute(&mut self, statement: &Statement<'_>) -> Result<Response, StoreError> {
        match *statement {
            Statement::TableExists(table) => {
                let count = sqlx::query_scalar::<_, i64>(
                    "SELECT COUNT(*) FROM information_schema.tables \
                     WHERE table_schema = DATABASE() AND table_name = ?",
                )
                .bind(table.name())
                .fetch_one(&mut *self)
                .await?;
                Ok(Response::Exists(count > 0))
            }
            Statement::CreateTable(table) => {
                sqlx::query(&create_table_sql(table))
                    .execute(&mut *self)
                    .await?;
                Ok(Response::Done)
            }
            Statement::RowExists { table, id } => {
                let sql = format!("SELECT `id` FROM `{table}` WHERE `uuid` = ?");
                let row = sqlx::query(&sql)
                    .bind(id.to_string())
                    .fetch_optional(&mut *self)
                    .await?;
                Ok(Response::Exists(row.is_some()))
            }
            Statement::Insert { table, id, data } => {
                let sql = format!("INSERT INTO `{table}` (`uuid`, `data`) VALUES (?, ?)");
                sqlx::query(&sql)
                    .bind(id.to_string())
                    .bind(data.as_bytes())
                    .execute(&mut *self)
                    .await?;
                Ok(Response::Done)
            }
            Statement::Update { table, id, data } => {
                let sql = format!("UPDATE `{table}` SET `data` = ? WHERE `uuid` = ?");
                sqlx::query(&sql)
                    .bind(data.as_bytes())
                    .bind(id.to_string())
                    .execute(&mut *self)
                    .await?;
                Ok(Response::Done)
            }
            Statement::Fetch { table, id } => {
                let sql = format!("SELECT `data` FROM `{table}` WHERE `uuid` = ?");
                let data = sqlx::query_scalar::<_, Vec<u8>>(&sql)
                    .bind(id.to_string())
                    .fetch_optional(&mut *self)
                    .await?;
                let blob = data.map(String::from_utf8).transpose().map_err(|e| {
                    StoreError::Query(format!("non-utf8 blob for {id} in {table}: {e}"))
                })?;
                Ok(Response::Row(blob))
            }
            Statement::FetchAll(table) => {
                let sql = format!("SELECT `uuid`, `data` FROM `{table}`");
                let rows = sqlx::query_as::<_, (String, Vec<u8>)>(&sql)
                    .fetch_all(&mut *self)
                    .await?;
                Ok(Response::from_raw_rows(table, rows))
            }
            Statement::Delete { table, id } => {
                let sql = format!("DELETE FROM `{table}` WHERE `uuid` = ?");
                sqlx::query(&sql)
                    .bind(id.to_string())
                    .execute(&mut *self)
                    .await?;
                Ok(Response::Done)
            }
        }
    }
}

fn create_table_sql(table: Table) -> String {
    format!(
        "CREATE TABLE IF NOT EXISTS `{name}` (\
         `id` INT NOT NULL AUTO_INCREMENT COMMENT 'Auto increment', \
         `uuid` VARCHAR(38) NOT NULL COMMENT 'User UUID', \
         `data` VARBINARY(65000) NOT NULL COMMENT 'User data', \
         `crafttime` TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP COMMENT 'Create date', \
         `updatetime` TIMESTAMP NULL ON UPDATE CURRENT_TIMESTAMP COMMENT 'Update time', \
         PRIMARY KEY (`id`), \
         UNIQUE KEY `uuid` (`uuid`)\
         ) COMMENT = '{comment}'",
        name = table.name(),
        comment = table.comment(),
    )
}

/// Servers without `transaction_read_only` fail the probe; a connection
/// that already answered a ping is then taken as writable.
fn writable_after_probe(probe: Result<i64, sqlx::Error>) -> bool {
    match probe {
        Ok(read_only) => read_only == 0,
        Err(err) => {
            tracing::debug!(error = %err, "read-only probe unsupported");
            true
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_table_has_fixed_columns() {
        let sql = create_table_sql(Table::Backpack);
        assert!(sql.starts_with("CREATE TABLE IF NOT EXISTS `backpack`"));
        for column in ["`id`", "`uuid`", "`data`", "`crafttime`", "`updatetime`"] {
            assert!(sql.contains(column), "missing {column}");
        }
        assert!(sql.contains("VARBINARY(65000)"));
        assert!(sql.ends_with("COMMENT = 'Backpack table'"));
    }

    #[test]
    fn read_only_probe_decides_usability() {
        assert!(writable_after_probe(Ok(0)));
        assert!(!writable_after_probe(Ok(1)));
        assert!(writable_after_probe(Err(sqlx::Error::RowNotFound)));
    }

    #[test]
    fn connector_builds_from_config() {
        let connector = MySqlConnector::from_config(&StoreConfig::default());
        assert!(format!("{connector:?}").contains("MySqlConnector"));
    }
}
