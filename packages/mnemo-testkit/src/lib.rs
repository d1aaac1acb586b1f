//! Per-test Postgres provisioning. Each [`TestDatabase`] owns a uniquely
//! named database created from an admin connection and dropped on cleanup.

mod error;

pub use error::{Error, Result};

use std::{env, str::FromStr, thread};

use sqlx::{
	ConnectOptions, Connection, Executor,
	postgres::{PgConnectOptions, PgConnection},
};
use tokio::runtime::Builder;
use uuid::Uuid;

/// Returns the base DSN integration tests run against, if configured.
pub fn env_dsn() -> Option<String> {
	env::var("MNEMO_PG_DSN").ok()
}

pub struct TestDatabase {
	database: String,
	dsn: String,
	admin: Admin,
	dropped: bool,
}
impl TestDatabase {
	pub async fn new(base_dsn: &str) -> Result<Self> {
		let base = PgConnectOptions::from_str(base_dsn)
			.map_err(|err| Error::Message(format!("Failed to parse MNEMO_PG_DSN: {err}.")))?;
		let admin = Admin::locate(&base).await?;
		let database = format!("mnemo_test_{}", Uuid::new_v4().simple());

		admin
			.connect()
			.await?
			.execute(format!(r#"CREATE DATABASE "{database}""#).as_str())
			.await
			.map_err(|err| Error::Message(format!("Failed to create test database: {err}.")))?;

		let dsn = base.database(&database).to_url_lossy().to_string();

		Ok(Self { database, dsn, admin, dropped: false })
	}

	pub fn dsn(&self) -> &str {
		&self.dsn
	}

	pub fn name(&self) -> &str {
		&self.database
	}

	pub async fn cleanup(mut self) -> Result<()> {
		self.drop_database().await
	}

	async fn drop_database(&mut self) -> Result<()> {
		if self.dropped {
			return Ok(());
		}

		self.admin.drop_database(&self.database).await?;

		self.dropped = true;

		Ok(())
	}
}
impl Drop for TestDatabase {
	fn drop(&mut self) {
		if self.dropped {
			return;
		}

		let database = self.database.clone();
		let admin = self.admin.clone();
		// Drop can run inside a tokio test runtime, so the blocking cleanup
		// gets its own thread and single-threaded runtime.
		let handle = thread::spawn(move || {
			let runtime = match Builder::new_current_thread().enable_all().build() {
				Ok(runtime) => runtime,
				Err(err) => {
					eprintln!("Test database cleanup failed: {err}.");

					return;
				},
			};

			if let Err(err) = runtime.block_on(admin.drop_database(&database)) {
				eprintln!("Test database cleanup failed: {err}.");
			}
		});
		let _ = handle.join();
	}
}

/// An admin connection target, resolved once per test database.
#[derive(Clone)]
struct Admin {
	options: PgConnectOptions,
}
impl Admin {
	// Tries the maintenance databases a stock Postgres ships with.
	async fn locate(base: &PgConnectOptions) -> Result<Self> {
		let mut last_err = None;

		for database in ["postgres", "template1"] {
			let options = base.clone().database(database);

			match PgConnection::connect_with(&options).await {
				Ok(conn) => {
					let _ = conn.close().await;

					return Ok(Self { options });
				},
				Err(err) => last_err = Some(err),
			}
		}

		Err(Error::Message(format!("Failed to connect to an admin database: {last_err:?}.")))
	}

	async fn connect(&self) -> Result<PgConnection> {
		PgConnection::connect_with(&self.options)
			.await
			.map_err(|err| Error::Message(format!("Failed to connect to admin database: {err}.")))
	}

	async fn drop_database(&self, database: &str) -> Result<()> {
		let mut conn = self.connect().await?;
		// Lingering pool connections block DROP DATABASE.
		let _ = sqlx::query(
			"\
SELECT pg_terminate_backend(pid)
FROM pg_stat_activity
WHERE datname = $1 AND pid <> pg_backend_pid()",
		)
		.bind(database)
		.fetch_all(&mut conn)
		.await;

		sqlx::query(format!(r#"DROP DATABASE IF EXISTS "{database}""#).as_str())
			.execute(&mut conn)
			.await
			.map_err(|err| Error::Message(format!("Failed to drop test database: {err}.")))?;

		Ok(())
	}
}
