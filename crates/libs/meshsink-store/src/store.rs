//! SQLite store: schema, inserts, retention, and the filtered read API.

use std::path::Path;
use std::sync::Mutex;

use meshsink_proto::PortNum;
use rusqlite::{params, params_from_iter, types::Value, Connection};

use crate::error::StoreError;
use crate::node_id::{format_node_id, parse_node_id};
use crate::records::{NodePatch, NodeRecord, PacketRecord};

/// Sort key for packet queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortKey {
    #[default]
    RxTime,
    FromNode,
    Port,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDir {
    Asc,
    #[default]
    Desc,
}

/// Packet query filter. Every field is optional; the default filter
/// returns everything, newest first.
#[derive(Debug, Clone, Default)]
pub struct PacketFilter {
    pub since: Option<i64>,
    pub until: Option<i64>,
    pub from_node: Option<u32>,
    pub to_node: Option<u32>,
    pub gateway: Option<u32>,
    pub channel: Option<String>,
    pub port: Option<PortNum>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
    pub sort_key: SortKey,
    pub sort_dir: SortDir,
}

/// Outcome of one retention sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetentionSweep {
    pub packets_deleted: usize,
    pub nodes_deleted: usize,
}

/// Handle to the capture database. All access serializes through one
/// lock; hold it only for your own statement.
pub struct Store {
    conn: Mutex<Connection>,
}

impl Store {
    pub fn in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        let store = Self { conn: Mutex::new(conn) };
        store.init_schema()?;
        Ok(store)
    }

    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        let store = Self { conn: Mutex::new(conn) };
        store.init_schema()?;
        Ok(store)
    }

    /// Append one packet record. Returns `false` when the record is a
    /// duplicate delivery of an already-stored packet (same sender and
    /// wire packet identity).
    pub fn insert_packet(&self, record: &PacketRecord) -> Result<bool, StoreError> {
        let conn = self.lock();
        let inserted = conn.execute(
            "INSERT OR IGNORE INTO packets (rx_time, topic, from_node, to_node, port, port_name, gateway, channel, relay_node, payload, decoded, packet_id, rssi, snr, hop_start, hop_limit) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)",
            params![
                record.rx_time,
                &record.topic,
                record.from_node,
                record.to_node,
                record.port as u16,
                &record.port_name,
                record.gateway,
                &record.channel,
                record.relay_node,
                &record.payload,
                record.decoded,
                record.packet_id,
                record.rssi,
                record.snr,
                record.hop_start,
                record.hop_limit,
            ],
        )?;
        Ok(inserted > 0)
    }

    /// Create or refresh a node record. Unseen nodes get
    /// `first_seen = now`; present patch fields overwrite, absent ones
    /// keep their stored values. Always advances `updated`.
    pub fn upsert_node(&self, patch: &NodePatch, now: i64) -> Result<(), StoreError> {
        let conn = self.lock();
        conn.execute(
            "INSERT OR IGNORE INTO nodes (num, hex_id, first_seen, updated) VALUES (?1, ?2, ?3, ?3)",
            params![patch.num, format_node_id(patch.num), now],
        )?;
        conn.execute(
            "UPDATE nodes SET \
               long_name = COALESCE(?2, long_name), \
               short_name = COALESCE(?3, short_name), \
               hw_model = COALESCE(?4, hw_model), \
               role = COALESCE(?5, role), \
               latitude = COALESCE(?6, latitude), \
               longitude = COALESCE(?7, longitude), \
               altitude = COALESCE(?8, altitude), \
               updated = ?9 \
             WHERE num = ?1",
            params![
                patch.num,
                &patch.long_name,
                &patch.short_name,
                patch.hw_model,
                patch.role,
                patch.latitude,
                patch.longitude,
                patch.altitude,
                now,
            ],
        )?;
        Ok(())
    }

    /// Delete packets and nodes older than the retention horizon.
    ///
    /// One `now` for the whole sweep, so records arriving mid-sweep are
    /// never eligible. A zero window disables deletion entirely; that
    /// is an operator opt-out, not an error.
    pub fn retain(&self, window_hours: u64, now: i64) -> Result<RetentionSweep, StoreError> {
        if window_hours == 0 {
            return Ok(RetentionSweep { packets_deleted: 0, nodes_deleted: 0 });
        }
        let horizon = now - (window_hours as i64) * 3600;

        let conn = self.lock();
        let packets_deleted =
            conn.execute("DELETE FROM packets WHERE rx_time < ?1", params![horizon])?;
        let nodes_deleted =
            conn.execute("DELETE FROM nodes WHERE updated < ?1", params![horizon])?;
        Ok(RetentionSweep { packets_deleted, nodes_deleted })
    }

    /// Fetch packet records matching a filter. Reflects only persisted,
    /// non-deleted rows at call time.
    pub fn query_packets(&self, filter: &PacketFilter) -> Result<Vec<PacketRecord>, StoreError> {
        let mut sql = String::from(
            "SELECT rx_time, topic, from_node, to_node, port, port_name, gateway, channel, relay_node, payload, decoded, packet_id, rssi, snr, hop_start, hop_limit FROM packets",
        );
        let mut clauses: Vec<String> = Vec::new();
        let mut values: Vec<Value> = Vec::new();

        fn bind(clause: &str, value: Value, values: &mut Vec<Value>) -> String {
            values.push(value);
            format!("{} ?{}", clause, values.len())
        }

        if let Some(since) = filter.since {
            clauses.push(bind("rx_time >=", Value::from(since), &mut values));
        }
        if let Some(until) = filter.until {
            clauses.push(bind("rx_time <", Value::from(until), &mut values));
        }
        if let Some(from_node) = filter.from_node {
            clauses.push(bind("from_node =", Value::from(i64::from(from_node)), &mut values));
        }
        if let Some(to_node) = filter.to_node {
            clauses.push(bind("to_node =", Value::from(i64::from(to_node)), &mut values));
        }
        if let Some(gateway) = filter.gateway {
            clauses.push(bind("gateway =", Value::from(i64::from(gateway)), &mut values));
        }
        if let Some(channel) = &filter.channel {
            clauses.push(bind("channel =", Value::from(channel.clone()), &mut values));
        }
        if let Some(port) = filter.port {
            clauses.push(bind("port =", Value::from(i64::from(port as u16)), &mut values));
        }

        if !clauses.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&clauses.join(" AND "));
        }

        let key = match filter.sort_key {
            SortKey::RxTime => "rx_time",
            SortKey::FromNode => "from_node",
            SortKey::Port => "port",
        };
        let dir = match filter.sort_dir {
            SortDir::Asc => "ASC",
            SortDir::Desc => "DESC",
        };
        // Secondary rowid order keeps pagination stable within equal keys.
        sql.push_str(&format!(" ORDER BY {key} {dir}, rowid {dir}"));

        if let Some(limit) = filter.limit {
            values.push(Value::from(limit as i64));
            sql.push_str(&format!(" LIMIT ?{}", values.len()));
            if let Some(offset) = filter.offset {
                values.push(Value::from(offset as i64));
                sql.push_str(&format!(" OFFSET ?{}", values.len()));
            }
        }

        let conn = self.lock();
        let mut stmt = conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(values))?;
        let mut records = Vec::new();
        while let Some(row) = rows.next()? {
            let port_raw: u16 = row.get(4)?;
            records.push(PacketRecord {
                rx_time: row.get(0)?,
                topic: row.get(1)?,
                from_node: row.get(2)?,
                to_node: row.get(3)?,
                port: PortNum::from_wire(port_raw),
                port_name: row.get(5)?,
                gateway: row.get(6)?,
                channel: row.get(7)?,
                relay_node: row.get(8)?,
                payload: row.get(9)?,
                decoded: row.get(10)?,
                packet_id: row.get(11)?,
                rssi: row.get(12)?,
                snr: row.get(13)?,
                hop_start: row.get(14)?,
                hop_limit: row.get(15)?,
            });
        }
        Ok(records)
    }

    pub fn list_nodes(&self) -> Result<Vec<NodeRecord>, StoreError> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT num, hex_id, long_name, short_name, hw_model, role, first_seen, updated, latitude, longitude, altitude FROM nodes ORDER BY updated DESC",
        )?;
        let mut rows = stmt.query([])?;
        let mut records = Vec::new();
        while let Some(row) = rows.next()? {
            records.push(node_from_row(row)?);
        }
        Ok(records)
    }

    /// Fetch one node by identity string (decimal or `!hex`).
    ///
    /// A malformed identity is a `BadNodeId` rejection; a well-formed
    /// identity matching nothing is `Ok(None)`.
    pub fn get_node(&self, id: &str) -> Result<Option<NodeRecord>, StoreError> {
        let num = parse_node_id(id)?;
        self.get_node_by_num(num)
    }

    pub fn get_node_by_num(&self, num: u32) -> Result<Option<NodeRecord>, StoreError> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT num, hex_id, long_name, short_name, hw_model, role, first_seen, updated, latitude, longitude, altitude FROM nodes WHERE num = ?1",
        )?;
        let mut rows = stmt.query(params![num])?;
        match rows.next()? {
            Some(row) => Ok(Some(node_from_row(row)?)),
            None => Ok(None),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Connection> {
        // A poisoned lock means a writer panicked mid-statement; the
        // connection itself is still usable for our statement-at-a-time
        // access pattern.
        match self.conn.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn init_schema(&self) -> Result<(), StoreError> {
        let conn = self.lock();
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS packets (
                rx_time INTEGER NOT NULL,
                topic TEXT NOT NULL,
                from_node INTEGER NOT NULL,
                to_node INTEGER NOT NULL,
                port INTEGER NOT NULL,
                port_name TEXT NOT NULL,
                gateway INTEGER NOT NULL,
                channel TEXT NOT NULL,
                relay_node INTEGER,
                payload BLOB NOT NULL,
                decoded INTEGER NOT NULL,
                packet_id INTEGER NOT NULL,
                rssi INTEGER,
                snr REAL,
                hop_start INTEGER,
                hop_limit INTEGER
            );
            CREATE UNIQUE INDEX IF NOT EXISTS idx_packets_identity ON packets (from_node, packet_id);
            CREATE INDEX IF NOT EXISTS idx_packets_rx_time ON packets (rx_time);
            CREATE TABLE IF NOT EXISTS nodes (
                num INTEGER PRIMARY KEY,
                hex_id TEXT NOT NULL,
                long_name TEXT,
                short_name TEXT,
                hw_model INTEGER,
                role INTEGER,
                first_seen INTEGER NOT NULL,
                updated INTEGER NOT NULL,
                latitude REAL,
                longitude REAL,
                altitude INTEGER
            );",
        )?;
        Ok(())
    }
}

fn node_from_row(row: &rusqlite::Row) -> Result<NodeRecord, StoreError> {
    Ok(NodeRecord {
        num: row.get(0)?,
        hex_id: row.get(1)?,
        long_name: row.get(2)?,
        short_name: row.get(3)?,
        hw_model: row.get(4)?,
        role: row.get(5)?,
        first_seen: row.get(6)?,
        updated: row.get(7)?,
        latitude: row.get(8)?,
        longitude: row.get(9)?,
        altitude: row.get(10)?,
    })
}
