use duckdb::{AccessMode, Config, Connection};
use r2d2::ManageConnection;

pub struct DuckDBConnectionManager {
    path: String,
    read_only: bool,
}

impl DuckDBConnectionManager {
    pub fn new(path: String, read_only: bool) -> Self {
        Self { path, read_only }
    }
}

impl ManageConnection for DuckDBConnectionManager {
    type Connection = Connection;
    type Error = duckdb::Error;

    fn connect(&self) -> Result<Self::Connection, Self::Error> {
        if self.read_only {
            let config = Config::default().access_mode(AccessMode::ReadOnly)?;
            Connection::open_with_flags(&self.path, config)
        } else {
            Connection::open(&self.path)
        }
    }

    fn is_valid(&self, conn: &mut Self::Connection) -> Result<(), Self::Error> {
        conn.execute_batch("SELECT 1")?;
        Ok(())
    }

    fn has_broken(&self, _conn: &mut Self::Connection) -> bool {
        false
    }
}
