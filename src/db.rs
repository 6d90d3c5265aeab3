//! SQLite-backed relational store: one row per node (carrying its `is_collapsed` flag) and one
//! row per edge. This is the authenticated-session store, so it supports granular writes.

use crate::{
    error::OrbitError,
    persistence::PersistenceAdapter,
    properties::{Edge, GraphSnapshot, Node, NodeId},
};
use futures_core::future::BoxFuture;
use sqlx::{
    error::BoxDynError,
    migrate::{MigrateDatabase, Migration as SqlxMigration, MigrationSource, Migrator},
    sqlite::{Sqlite, SqliteConnectOptions, SqliteRow},
    ConnectOptions, FromRow, Row,
};
use sqlx::{migrate::MigrationType, Pool, QueryBuilder};
use std::{collections::BTreeMap, path::Path, result::Result, str::FromStr};

impl FromRow<'_, SqliteRow> for Node {
    fn from_row(row: &SqliteRow) -> sqlx::Result<Self> {
        let id: &str = row.try_get("id")?;
        let label: &str = row.try_get("label")?;
        let url: Option<&str> = row.try_get("url")?;
        let note: Option<&str> = row.try_get("note")?;
        Ok(Node {
            id: NodeId::from(id),
            label: label.to_string(),
            url: url.filter(|u| !u.trim().is_empty()).map(str::to_string),
            note: note.filter(|n| !n.trim().is_empty()).map(str::to_string),
            is_parent: row.try_get("is_parent")?,
            is_root: row.try_get("is_root")?,
            is_collapsed: row.try_get("is_collapsed")?,
        })
    }
}

impl FromRow<'_, SqliteRow> for Edge {
    fn from_row(row: &SqliteRow) -> sqlx::Result<Self> {
        let id: &str = row.try_get("id")?;
        let from: &str = row.try_get("from_node")?;
        let to: &str = row.try_get("to_node")?;
        Ok(Edge {
            id: id.into(),
            from: from.into(),
            to: to.into(),
        })
    }
}

#[derive(Debug, Clone)]
pub struct DbConnection(pub Pool<Sqlite>);

impl DbConnection {
    pub async fn open<P: AsRef<Path>>(db_path: P) -> Result<DbConnection, OrbitError> {
        Ok(DbConnection(db_init(db_path.as_ref()).await?))
    }
}

fn upsert_nodes_query(nodes: &[Node]) -> QueryBuilder<'static, Sqlite> {
    let mut qb = QueryBuilder::<Sqlite>::new(
        "INSERT OR REPLACE INTO nodes(id, label, url, note, is_parent, is_root, is_collapsed) ",
    );
    qb.push_values(nodes, |mut b, node| {
        b.push_bind(node.id.to_string())
            .push_bind(node.label.clone())
            .push_bind(node.url.clone())
            .push_bind(node.note.clone())
            .push_bind(node.is_parent)
            .push_bind(node.is_root)
            .push_bind(node.is_collapsed);
    });
    qb
}

fn insert_edges_query(edges: &[Edge]) -> QueryBuilder<'static, Sqlite> {
    let mut qb =
        QueryBuilder::<Sqlite>::new("INSERT OR REPLACE INTO edges(id, from_node, to_node) ");
    qb.push_values(edges, |mut b, edge| {
        b.push_bind(edge.id.to_string())
            .push_bind(edge.from.to_string())
            .push_bind(edge.to.to_string());
    });
    qb
}

fn push_id_list(qb: &mut QueryBuilder<'static, Sqlite>, ids: &[NodeId]) {
    let mut list = qb.separated(", ");
    for id in ids {
        list.push_bind(id.to_string());
    }
}

impl PersistenceAdapter for DbConnection {
    #[tracing::instrument(skip(self))]
    async fn load_all(&self) -> Result<GraphSnapshot, OrbitError> {
        let nodes = sqlx::query_as::<_, Node>("SELECT * FROM nodes ORDER BY id")
            .fetch_all(&self.0)
            .await
            .map_err(|e| {
                tracing::error!("[DbConnection.load_all] Failed to fetch nodes: {}", e);
                e
            })?;
        let edges = sqlx::query_as::<_, Edge>("SELECT * FROM edges ORDER BY id")
            .fetch_all(&self.0)
            .await
            .map_err(|e| {
                tracing::error!("[DbConnection.load_all] Failed to fetch edges: {}", e);
                e
            })?;
        tracing::info!(
            "Loaded graph from database: {} nodes, {} edges",
            nodes.len(),
            edges.len()
        );
        Ok(GraphSnapshot {
            nodes,
            edges,
            collapsed: Vec::new(),
        })
    }

    #[tracing::instrument(skip(self))]
    async fn load_collapsed_flags(&self) -> Result<BTreeMap<NodeId, bool>, OrbitError> {
        let rows = sqlx::query_as::<_, (String, bool)>("SELECT id, is_collapsed FROM nodes")
            .fetch_all(&self.0)
            .await?;
        Ok(rows
            .into_iter()
            .map(|(id, is_collapsed)| (NodeId::from(id), is_collapsed))
            .collect())
    }

    #[tracing::instrument(skip(self))]
    async fn save_node_flag(&self, id: &NodeId, is_collapsed: bool) -> Result<(), OrbitError> {
        let result = sqlx::query("UPDATE nodes SET is_collapsed = ? WHERE id = ?")
            .bind(is_collapsed)
            .bind(id.to_string())
            .execute(&self.0)
            .await?;
        match result.rows_affected() {
            0 => Err(OrbitError::NotFound(format!("node {id}"))),
            _ => Ok(()),
        }
    }

    #[tracing::instrument(skip_all)]
    async fn save_snapshot(&self, snapshot: &GraphSnapshot) -> Result<(), OrbitError> {
        let collapsed = snapshot.collapsed_ids();
        let nodes = snapshot
            .nodes
            .iter()
            .map(|n| Node {
                is_collapsed: collapsed.binary_search(&n.id).is_ok(),
                ..n.clone()
            })
            .collect::<Vec<_>>();

        let mut tx = self.0.begin().await?;
        sqlx::query("DELETE FROM edges").execute(&mut *tx).await?;
        sqlx::query("DELETE FROM nodes").execute(&mut *tx).await?;
        if !nodes.is_empty() {
            upsert_nodes_query(&nodes).build().execute(&mut *tx).await?;
        }
        if !snapshot.edges.is_empty() {
            insert_edges_query(&snapshot.edges)
                .build()
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        tracing::debug!(
            "[DbConnection] replaced graph with {} nodes, {} edges",
            nodes.len(),
            snapshot.edges.len()
        );
        Ok(())
    }

    async fn upsert_node(&self, node: &Node) -> Result<(), OrbitError> {
        upsert_nodes_query(std::slice::from_ref(node))
            .build()
            .execute(&self.0)
            .await?;
        Ok(())
    }

    async fn insert_edge(&self, edge: &Edge) -> Result<(), OrbitError> {
        insert_edges_query(std::slice::from_ref(edge))
            .build()
            .execute(&self.0)
            .await?;
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    async fn remove_nodes(&self, ids: &[NodeId]) -> Result<(), OrbitError> {
        if ids.is_empty() {
            return Ok(());
        }
        let mut tx = self.0.begin().await?;

        let mut qb = QueryBuilder::<Sqlite>::new("DELETE FROM edges WHERE from_node IN (");
        push_id_list(&mut qb, ids);
        qb.push(") OR to_node IN (");
        push_id_list(&mut qb, ids);
        qb.push(")");
        qb.build().execute(&mut *tx).await?;

        let mut qb = QueryBuilder::<Sqlite>::new("DELETE FROM nodes WHERE id IN (");
        push_id_list(&mut qb, ids);
        qb.push(")");
        qb.build().execute(&mut *tx).await?;

        tx.commit().await?;
        Ok(())
    }
}

/// A migration definition.
#[derive(Debug, Clone)]
pub struct Migration {
    pub version: i64,
    pub description: &'static str,
    pub sql: &'static str,
    pub kind: MigrationType,
}

#[derive(Debug, Clone)]
struct MigrationList(Vec<Migration>);

impl MigrationSource<'static> for MigrationList {
    fn resolve(self) -> BoxFuture<'static, Result<Vec<SqlxMigration>, BoxDynError>> {
        Box::pin(async move {
            let mut migrations = Vec::new();
            for migration in self.0 {
                if matches!(migration.kind, MigrationType::ReversibleUp) {
                    migrations.push(SqlxMigration::new(
                        migration.version,
                        migration.description.into(),
                        migration.kind,
                        migration.sql.into(),
                        false,
                    ));
                }
            }
            Ok(migrations)
        })
    }
}

pub async fn db_init(db_path: &Path) -> Result<Pool<Sqlite>, OrbitError> {
    let Some(path_str) = db_path.to_str() else {
        return Err(OrbitError::Config(format!(
            "database path {db_path:?} is not valid UTF-8"
        )));
    };
    let fqdb = format!("sqlite:{path_str}");
    tracing::debug!("Initializing graph db from file: {:?}", fqdb);
    if !Sqlite::database_exists(&fqdb).await.unwrap_or(false) {
        Sqlite::create_database(&fqdb).await?;
    }
    let options = SqliteConnectOptions::from_str(&fqdb)?
        .read_only(false)
        .disable_statement_logging()
        .create_if_missing(true);
    let pool = sqlx::pool::PoolOptions::<Sqlite>::new()
        .connect_with(options)
        .await?;

    let migrations = MigrationList(vec![Migration {
        version: 1,
        description: "create_graph_tables",
        sql: "\
            CREATE TABLE nodes (id TEXT PRIMARY KEY, label TEXT NOT NULL DEFAULT '', url TEXT, note TEXT, \
                is_parent BOOLEAN NOT NULL DEFAULT 0, is_root BOOLEAN NOT NULL DEFAULT 0, \
                is_collapsed BOOLEAN NOT NULL DEFAULT 0); \
            CREATE TABLE edges (id TEXT PRIMARY KEY, from_node TEXT NOT NULL, to_node TEXT NOT NULL); \
            CREATE INDEX edges_from ON edges(from_node); \
            CREATE INDEX edges_to ON edges(to_node);",
        kind: MigrationType::ReversibleUp,
    }]);
    let migrator = Migrator::new(migrations).await.map_err(sqlx::Error::from)?;
    migrator.run(&pool).await.map_err(sqlx::Error::from)?;

    let node_count = sqlx::query("SELECT COUNT(*) FROM nodes;")
        .fetch_one(&pool)
        .await?;
    let edge_count = sqlx::query("SELECT COUNT(*) FROM edges;")
        .fetch_one(&pool)
        .await?;
    tracing::info!(
        "DB Connection initialized.\n \
         \tStored node count:\t{:?} \n \
         \tStored edge count:\t{:?}",
        node_count.get::<i64, usize>(0),
        edge_count.get::<i64, usize>(0)
    );

    Ok(pool)
}
