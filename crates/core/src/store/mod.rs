pub mod schema;

use std::cell::RefCell;
use std::path::{Path, PathBuf};

use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::domain::*;
use crate::error::{Error, Result};
use crate::lookup::HashKind;

/// SQLite-backed store for players, pokemon, image hashes and pokedex entries.
///
/// Holds at most one connection. Any query made while closed reopens it, so
/// [`close`](Store::close) only releases the handle until the next use.
/// Single-threaded: the store is neither `Send` nor `Sync`.
///
/// Every `get_or_create_*` selects first and inserts on a miss. Two
/// processes racing on the same key can both miss; the UNIQUE constraints
/// make the loser's insert fail instead of duplicating the row.
pub struct Store {
    path: PathBuf,
    conn: RefCell<Option<Connection>>,
}

impl Store {
    /// Open or create a store at the given path and bring its schema up to date.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let store = Self {
            path: path.to_path_buf(),
            conn: RefCell::new(None),
        };
        store.with_conn(|conn| {
            schema::initialize(conn)?;
            schema::migrate(conn)
        })?;
        Ok(store)
    }

    // ── Connection ───────────────────────────────────────────────────

    pub fn is_closed(&self) -> bool {
        self.conn.borrow().is_none()
    }

    /// Open the connection if it is closed.
    pub fn connect(&self) -> Result<()> {
        if !self.is_closed() {
            return Ok(());
        }
        let conn = Connection::open(&self.path)?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        tracing::debug!("Opened store {}", self.path.display());
        *self.conn.borrow_mut() = Some(conn);
        Ok(())
    }

    /// Close the connection. Safe to call when already closed.
    pub fn close(&self) {
        let Some(conn) = self.conn.borrow_mut().take() else {
            return;
        };
        // The handle is dropped either way; a failed close only gets logged.
        match conn.close() {
            Ok(()) => tracing::debug!("Closed store {}", self.path.display()),
            Err((_, err)) => {
                tracing::warn!("Error closing store {}: {err}", self.path.display())
            }
        }
    }

    fn with_conn<T>(&self, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        self.connect()?;
        let guard = self.conn.borrow();
        let conn = guard.as_ref().ok_or(Error::StoreClosed)?;
        f(conn)
    }

    // ── Players ──────────────────────────────────────────────────────

    pub fn find_player(&self, discord_id: i64) -> Result<Option<Player>> {
        self.with_conn(|conn| {
            Ok(conn
                .query_row(
                    "SELECT id, discord_id, name, active FROM players WHERE discord_id = ?1",
                    params![discord_id],
                    player_from_row,
                )
                .optional()?)
        })
    }

    pub fn get_or_create_player(&self, discord_id: i64) -> Result<Player> {
        if let Some(player) = self.find_player(discord_id)? {
            return Ok(player);
        }
        let id = self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO players (discord_id) VALUES (?1)",
                params![discord_id],
            )?;
            Ok(conn.last_insert_rowid())
        })?;
        tracing::debug!(discord_id, "Created player");
        Ok(Player {
            id,
            discord_id,
            name: None,
            active: false,
        })
    }

    pub fn update_player(&self, player: &Player) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE players SET name = ?1, active = ?2 WHERE id = ?3",
                params![player.name, player.active, player.id],
            )?;
            Ok(())
        })
    }

    pub fn count_players(&self) -> Result<usize> {
        self.count("players")
    }

    // ── Pokemon ──────────────────────────────────────────────────────

    pub fn get_or_create_pokemon(&self, name: &str) -> Result<Pokemon> {
        let existing = self.with_conn(|conn| {
            Ok(conn
                .query_row(
                    "SELECT id, name FROM pokemon WHERE name = ?1",
                    params![name],
                    |row| {
                        Ok(Pokemon {
                            id: row.get(0)?,
                            name: row.get(1)?,
                        })
                    },
                )
                .optional()?)
        })?;
        if let Some(pokemon) = existing {
            return Ok(pokemon);
        }
        let id = self.with_conn(|conn| {
            conn.execute("INSERT INTO pokemon (name) VALUES (?1)", params![name])?;
            Ok(conn.last_insert_rowid())
        })?;
        tracing::debug!(name, "Created pokemon");
        Ok(Pokemon {
            id,
            name: Some(name.to_string()),
        })
    }

    pub fn count_pokemon(&self) -> Result<usize> {
        self.count("pokemon")
    }

    // ── Hash records ─────────────────────────────────────────────────

    pub fn get_or_create_image(&self, md5: &str) -> Result<Image> {
        let (id, md5, pokemon) = self.get_or_create_hashed(HashKind::Exact, md5)?;
        Ok(Image { id, md5, pokemon })
    }

    pub fn get_or_create_phash(&self, phash: &str) -> Result<PerceptualHash> {
        let (id, phash, pokemon) = self.get_or_create_hashed(HashKind::Perceptual, phash)?;
        Ok(PerceptualHash { id, phash, pokemon })
    }

    /// Point a hash record at a pokemon.
    pub fn attach_pokemon(&self, kind: HashKind, record_id: i64, pokemon_id: i64) -> Result<()> {
        let (table, _) = hash_table(kind);
        self.with_conn(|conn| {
            conn.execute(
                &format!("UPDATE {table} SET pokemon_id = ?1 WHERE id = ?2"),
                params![pokemon_id, record_id],
            )?;
            Ok(())
        })
    }

    fn get_or_create_hashed(
        &self,
        kind: HashKind,
        hash: &str,
    ) -> Result<(i64, String, Option<Pokemon>)> {
        let (table, column) = hash_table(kind);
        let existing = self.with_conn(|conn| {
            Ok(conn
                .query_row(
                    &format!(
                        "SELECT h.id, h.{column}, p.id, p.name
                         FROM {table} h LEFT JOIN pokemon p ON p.id = h.pokemon_id
                         WHERE h.{column} = ?1"
                    ),
                    params![hash],
                    |row| {
                        let pokemon_id: Option<i64> = row.get(2)?;
                        let pokemon = match pokemon_id {
                            Some(id) => Some(Pokemon {
                                id,
                                name: row.get(3)?,
                            }),
                            None => None,
                        };
                        Ok((row.get(0)?, row.get(1)?, pokemon))
                    },
                )
                .optional()?)
        })?;
        if let Some(found) = existing {
            return Ok(found);
        }
        let id = self.with_conn(|conn| {
            conn.execute(
                &format!("INSERT INTO {table} ({column}) VALUES (?1)"),
                params![hash],
            )?;
            Ok(conn.last_insert_rowid())
        })?;
        tracing::debug!(table, hash, "Created hash record");
        Ok((id, hash.to_string(), None))
    }

    // ── Pokedex entries ──────────────────────────────────────────────

    pub fn get_or_create_entry(&self, player: &Player, pokemon: &Pokemon) -> Result<CollectionEntry> {
        let existing: Option<(i64, Option<bool>)> = self.with_conn(|conn| {
            Ok(conn
                .query_row(
                    "SELECT id, caught FROM pokedex_entries WHERE player_id = ?1 AND pokemon_id = ?2",
                    params![player.id, pokemon.id],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )
                .optional()?)
        })?;
        let (id, caught) = match existing {
            Some(found) => found,
            None => {
                let id = self.with_conn(|conn| {
                    conn.execute(
                        "INSERT INTO pokedex_entries (pokemon_id, player_id) VALUES (?1, ?2)",
                        params![pokemon.id, player.id],
                    )?;
                    Ok(conn.last_insert_rowid())
                })?;
                tracing::debug!(player = player.discord_id, pokemon_id = pokemon.id, "Created pokedex entry");
                (id, None)
            }
        };
        Ok(CollectionEntry {
            id,
            player: player.clone(),
            pokemon: pokemon.clone(),
            caught: Caught::from(caught),
        })
    }

    pub fn update_entry(&self, entry: &CollectionEntry) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE pokedex_entries SET caught = ?1 WHERE id = ?2",
                params![entry.caught.as_db(), entry.id],
            )?;
            Ok(())
        })
    }

    pub fn count_entries(&self) -> Result<usize> {
        self.count("pokedex_entries")
    }

    fn count(&self, table: &str) -> Result<usize> {
        self.with_conn(|conn| {
            let count: i64 =
                conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| row.get(0))?;
            Ok(count as usize)
        })
    }
}

fn hash_table(kind: HashKind) -> (&'static str, &'static str) {
    match kind {
        HashKind::Exact => ("images", "md5"),
        HashKind::Perceptual => ("phashes", "phash"),
    }
}

fn player_from_row(row: &Row<'_>) -> rusqlite::Result<Player> {
    Ok(Player {
        id: row.get(0)?,
        discord_id: row.get(1)?,
        name: row.get(2)?,
        active: row.get(3)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_store() -> (Store, tempfile::TempDir) {
        let tmp = tempfile::tempdir().unwrap();
        let store = Store::open(&tmp.path().join("pkmn.db")).unwrap();
        (store, tmp)
    }

    // ── Connection tests ─────────────────────────────────────────────

    #[test]
    fn test_open_creates_file_and_parent_dirs() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("sub/dir/pkmn.db");
        let store = Store::open(&path).unwrap();
        assert!(path.exists());
        assert!(!store.is_closed());
    }

    #[test]
    fn test_close_then_query_reconnects() {
        let (store, _tmp) = make_store();
        store.get_or_create_player(1).unwrap();

        store.close();
        assert!(store.is_closed());
        store.close();

        assert_eq!(store.count_players().unwrap(), 1);
        assert!(!store.is_closed());
    }

    #[test]
    fn test_reopen_persists_and_reruns_schema() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("pkmn.db");
        {
            let store = Store::open(&path).unwrap();
            store.get_or_create_pokemon("Eevee").unwrap();
        }
        let store = Store::open(&path).unwrap();
        assert_eq!(store.count_pokemon().unwrap(), 1);
    }

    // ── Player tests ─────────────────────────────────────────────────

    #[test]
    fn test_get_or_create_player_is_stable() {
        let (store, _tmp) = make_store();
        let a = store.get_or_create_player(123456789012345678).unwrap();
        let b = store.get_or_create_player(123456789012345678).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.name, None);
        assert!(!a.active);
        assert_eq!(store.count_players().unwrap(), 1);
    }

    #[test]
    fn test_find_player_does_not_create() {
        let (store, _tmp) = make_store();
        assert_eq!(store.find_player(42).unwrap(), None);
        assert_eq!(store.count_players().unwrap(), 0);

        let created = store.get_or_create_player(42).unwrap();
        assert_eq!(store.find_player(42).unwrap(), Some(created));
    }

    #[test]
    fn test_update_player() {
        let (store, _tmp) = make_store();
        let mut player = store.get_or_create_player(42).unwrap();
        player.name = Some("ash".to_string());
        player.active = true;
        store.update_player(&player).unwrap();

        assert_eq!(store.find_player(42).unwrap(), Some(player));
    }

    #[test]
    fn test_player_name_too_long_is_store_error() {
        let (store, _tmp) = make_store();
        let mut player = store.get_or_create_player(42).unwrap();
        player.name = Some("x".repeat(33));
        let err = store.update_player(&player).unwrap_err();
        assert!(matches!(err, Error::Database(_)));
    }

    // ── Pokemon tests ────────────────────────────────────────────────

    #[test]
    fn test_get_or_create_pokemon_is_stable() {
        let (store, _tmp) = make_store();
        let a = store.get_or_create_pokemon("Pikachu").unwrap();
        let b = store.get_or_create_pokemon("Pikachu").unwrap();
        let c = store.get_or_create_pokemon("Raichu").unwrap();
        assert_eq!(a, b);
        assert_ne!(a.id, c.id);
        assert_eq!(store.count_pokemon().unwrap(), 2);
    }

    // ── Hash record tests ────────────────────────────────────────────

    #[test]
    fn test_image_and_phash_tables_are_separate() {
        let (store, _tmp) = make_store();
        let image = store.get_or_create_image("abc123").unwrap();
        let phash = store.get_or_create_phash("abc123").unwrap();
        assert_eq!(image.md5, "abc123");
        assert_eq!(phash.phash, "abc123");
        assert_eq!(image.pokemon, None);

        assert_eq!(store.get_or_create_image("abc123").unwrap().id, image.id);
        assert_eq!(store.get_or_create_phash("abc123").unwrap().id, phash.id);
    }

    #[test]
    fn test_attach_pokemon_is_read_back() {
        let (store, _tmp) = make_store();
        let image = store.get_or_create_image("abc123").unwrap();
        let pokemon = store.get_or_create_pokemon("Bulbasaur").unwrap();
        store
            .attach_pokemon(HashKind::Exact, image.id, pokemon.id)
            .unwrap();

        let reloaded = store.get_or_create_image("abc123").unwrap();
        assert_eq!(reloaded.pokemon, Some(pokemon));
        assert_eq!(store.get_or_create_phash("abc123").unwrap().pokemon, None);
    }

    #[test]
    fn test_attach_unknown_pokemon_violates_foreign_key() {
        let (store, _tmp) = make_store();
        let phash = store.get_or_create_phash("d1c4b4e4f0b0e0c0").unwrap();
        assert!(store
            .attach_pokemon(HashKind::Perceptual, phash.id, 9999)
            .is_err());
    }

    #[test]
    fn test_hash_too_long_is_store_error() {
        let (store, _tmp) = make_store();
        let err = store.get_or_create_image(&"a".repeat(64)).unwrap_err();
        assert!(matches!(err, Error::Database(_)));
    }

    // ── Pokedex entry tests ──────────────────────────────────────────

    #[test]
    fn test_get_or_create_entry_is_unique_per_pair() {
        let (store, _tmp) = make_store();
        let ash = store.get_or_create_player(1).unwrap();
        let gary = store.get_or_create_player(2).unwrap();
        let pikachu = store.get_or_create_pokemon("Pikachu").unwrap();

        let a = store.get_or_create_entry(&ash, &pikachu).unwrap();
        let b = store.get_or_create_entry(&ash, &pikachu).unwrap();
        let c = store.get_or_create_entry(&gary, &pikachu).unwrap();
        assert_eq!(a, b);
        assert_ne!(a.id, c.id);
        assert_eq!(a.caught, Caught::Unknown);
        assert_eq!(store.count_entries().unwrap(), 2);
    }

    #[test]
    fn test_update_entry_caught() {
        let (store, _tmp) = make_store();
        let ash = store.get_or_create_player(1).unwrap();
        let pikachu = store.get_or_create_pokemon("Pikachu").unwrap();
        let mut entry = store.get_or_create_entry(&ash, &pikachu).unwrap();

        entry.caught = Caught::No;
        store.update_entry(&entry).unwrap();
        assert_eq!(store.get_or_create_entry(&ash, &pikachu).unwrap().caught, Caught::No);

        entry.caught = Caught::Yes;
        store.update_entry(&entry).unwrap();
        assert_eq!(store.get_or_create_entry(&ash, &pikachu).unwrap().caught, Caught::Yes);
    }

    #[test]
    fn test_open_keeps_duplicate_pairs_from_older_schema() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("pkmn.db");
        {
            // Layout from before the pair was unique
            let conn = Connection::open(&path).unwrap();
            conn.execute_batch(
                "
                CREATE TABLE pokedex_entries (
                    id          INTEGER PRIMARY KEY AUTOINCREMENT,
                    pokemon_id  INTEGER NOT NULL,
                    player_id   INTEGER NOT NULL,
                    caught      INTEGER
                );
                INSERT INTO pokedex_entries (pokemon_id, player_id, caught) VALUES (1, 1, NULL);
                INSERT INTO pokedex_entries (pokemon_id, player_id, caught) VALUES (1, 1, 1);
                ",
            )
            .unwrap();
        }

        let err = Store::open(&path).err().unwrap();
        assert!(matches!(err, Error::Database(_)));

        let conn = Connection::open(&path).unwrap();
        let caught: Vec<Option<bool>> = conn
            .prepare("SELECT caught FROM pokedex_entries ORDER BY id")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<rusqlite::Result<_>>()
            .unwrap();
        assert_eq!(caught, vec![None, Some(true)]);
    }

    #[test]
    fn test_open_adds_pair_index_to_older_schema() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("pkmn.db");
        {
            let conn = Connection::open(&path).unwrap();
            conn.execute_batch(
                "
                CREATE TABLE pokedex_entries (
                    id          INTEGER PRIMARY KEY AUTOINCREMENT,
                    pokemon_id  INTEGER NOT NULL,
                    player_id   INTEGER NOT NULL,
                    caught      INTEGER
                );
                INSERT INTO pokedex_entries (pokemon_id, player_id, caught) VALUES (1, 1, 1);
                ",
            )
            .unwrap();
        }

        let store = Store::open(&path).unwrap();
        assert_eq!(store.count_entries().unwrap(), 1);
        let result = store.with_conn(|conn| {
            conn.execute(
                "INSERT INTO pokedex_entries (pokemon_id, player_id) VALUES (1, 1)",
                [],
            )?;
            Ok(())
        });
        assert!(result.is_err());
    }

    #[test]
    fn test_duplicate_entry_insert_rejected_by_schema() {
        let (store, _tmp) = make_store();
        let ash = store.get_or_create_player(1).unwrap();
        let pikachu = store.get_or_create_pokemon("Pikachu").unwrap();
        store.get_or_create_entry(&ash, &pikachu).unwrap();

        let result = store.with_conn(|conn| {
            conn.execute(
                "INSERT INTO pokedex_entries (pokemon_id, player_id) VALUES (?1, ?2)",
                params![pikachu.id, ash.id],
            )?;
            Ok(())
        });
        assert!(result.is_err());
    }
}
