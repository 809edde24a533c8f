//! Disposable Postgres databases and Qdrant collections for integration tests.

mod error;

pub use error::{Error, Result};

use std::{env, str::FromStr, sync::Mutex, thread, time::Duration};

use qdrant_client::Qdrant;
use sqlx::{
	ConnectOptions, Connection, Executor,
	postgres::{PgConnectOptions, PgConnection},
};
use tokio::{runtime::Builder, time};
use uuid::Uuid;

pub const PG_DSN_ENV: &str = "SCOUT_PG_DSN";
pub const QDRANT_URL_ENV: &str = "SCOUT_QDRANT_URL";

const ADMIN_DATABASES: [&str; 2] = ["postgres", "template1"];
const QDRANT_CALL_TIMEOUT: Duration = Duration::from_secs(10);

/// A uniquely named database created from an admin connection and dropped on cleanup or drop.
pub struct TestDatabase {
	name: String,
	dsn: String,
	admin_options: PgConnectOptions,
	collections: Mutex<Vec<String>>,
	cleaned: bool,
}
impl TestDatabase {
	pub async fn new(base_dsn: &str) -> Result<Self> {
		let base_options = PgConnectOptions::from_str(base_dsn)
			.map_err(|err| Error::Message(format!("Failed to parse {PG_DSN_ENV}: {err}.")))?;
		let (admin_options, mut admin_conn) = connect_admin(&base_options).await?;
		let name = format!("scout_test_{}", Uuid::new_v4().simple());

		admin_conn
			.execute(format!(r#"CREATE DATABASE "{name}""#).as_str())
			.await
			.map_err(|err| Error::Message(format!("Failed to create test database: {err}.")))?;

		let dsn = base_options.database(&name).to_url_lossy().to_string();

		Ok(Self { name, dsn, admin_options, collections: Mutex::new(Vec::new()), cleaned: false })
	}

	pub fn dsn(&self) -> &str {
		&self.dsn
	}

	pub fn postgres_config(&self) -> scout_config::Postgres {
		scout_config::Postgres { dsn: self.dsn.clone(), pool_max_conns: 2 }
	}

	/// Qdrant collection name unique to this database; removed during cleanup.
	pub fn collection_name(&self, prefix: &str) -> String {
		let collection = format!("{prefix}_{}", self.name);
		let mut tracked = self.collections.lock().unwrap_or_else(|err| err.into_inner());

		if !tracked.contains(&collection) {
			tracked.push(collection.clone());
		}

		collection
	}

	pub async fn cleanup(mut self) -> Result<()> {
		let collections = self.tracked_collections();
		let db_result = drop_database(&self.name, &self.admin_options).await;
		let qdrant_result = drop_collections(&collections).await;

		self.cleaned = true;

		db_result?;
		qdrant_result
	}

	fn tracked_collections(&self) -> Vec<String> {
		self.collections.lock().unwrap_or_else(|err| err.into_inner()).clone()
	}
}
impl Drop for TestDatabase {
	fn drop(&mut self) {
		if self.cleaned {
			return;
		}

		let name = self.name.clone();
		let admin_options = self.admin_options.clone();
		let collections = self.tracked_collections();
		// Drop may run inside a runtime, so cleanup gets its own thread and runtime.
		let handle = thread::spawn(move || {
			let runtime = match Builder::new_current_thread().enable_all().build() {
				Ok(runtime) => runtime,
				Err(err) => {
					eprintln!("Test cleanup could not start a runtime: {err}.");

					return;
				},
			};

			runtime.block_on(async {
				if let Err(err) = drop_collections(&collections).await {
					eprintln!("Test Qdrant cleanup failed: {err}.");
				}
				if let Err(err) = drop_database(&name, &admin_options).await {
					eprintln!("Test database cleanup failed: {err}.");
				}
			});
		});

		let _ = handle.join();
	}
}

pub fn env_dsn() -> Option<String> {
	env::var(PG_DSN_ENV).ok()
}

pub fn env_qdrant_url() -> Option<String> {
	env::var(QDRANT_URL_ENV).ok()
}

async fn connect_admin(
	base_options: &PgConnectOptions,
) -> Result<(PgConnectOptions, PgConnection)> {
	let mut last_err = None;

	for database in ADMIN_DATABASES {
		let options = base_options.clone().database(database);

		match PgConnection::connect_with(&options).await {
			Ok(conn) => return Ok((options, conn)),
			Err(err) => last_err = Some(err),
		}
	}

	Err(Error::Message(format!("Failed to connect to an admin database: {last_err:?}.")))
}

async fn drop_database(name: &str, admin_options: &PgConnectOptions) -> Result<()> {
	let mut conn = PgConnection::connect_with(admin_options).await?;

	// Pooled connections from the test may still be open.
	let _ = sqlx::query(
		"\
SELECT pg_terminate_backend(pid)
FROM pg_stat_activity
WHERE datname = $1 AND pid <> pg_backend_pid()",
	)
	.bind(name)
	.fetch_all(&mut conn)
	.await;

	conn.execute(format!(r#"DROP DATABASE IF EXISTS "{name}""#).as_str())
		.await
		.map_err(|err| Error::Message(format!("Failed to drop test database: {err}.")))?;

	Ok(())
}

async fn drop_collections(collections: &[String]) -> Result<()> {
	if collections.is_empty() {
		return Ok(());
	}

	let Some(url) = env_qdrant_url() else {
		eprintln!("Skipping Qdrant cleanup; set {QDRANT_URL_ENV} to delete test collections.");

		return Ok(());
	};
	let client = Qdrant::from_url(&url).build()?;

	for collection in collections {
		match time::timeout(QDRANT_CALL_TIMEOUT, client.delete_collection(collection.clone())).await
		{
			Ok(result) => {
				result?;
			},
			Err(_) =>
				return Err(Error::Message(format!(
					"Timed out deleting Qdrant collection {collection:?}."
				))),
		}
	}

	Ok(())
}
