use rusqlite::Connection;

use crate::error::Result;

pub fn initialize(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS players (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            discord_id  INTEGER NOT NULL UNIQUE,
            name        TEXT CHECK (name IS NULL OR length(name) <= 32),
            active      INTEGER NOT NULL DEFAULT 0
        );

        CREATE TABLE IF NOT EXISTS pokemon (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            name        TEXT UNIQUE CHECK (name IS NULL OR length(name) <= 32)
        );

        CREATE TABLE IF NOT EXISTS images (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            md5         TEXT NOT NULL UNIQUE CHECK (length(md5) <= 32),
            pokemon_id  INTEGER REFERENCES pokemon(id)
        );

        CREATE TABLE IF NOT EXISTS phashes (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            phash       TEXT NOT NULL UNIQUE CHECK (length(phash) <= 32),
            pokemon_id  INTEGER REFERENCES pokemon(id)
        );

        CREATE TABLE IF NOT EXISTS pokedex_entries (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            pokemon_id  INTEGER NOT NULL REFERENCES pokemon(id),
            player_id   INTEGER NOT NULL REFERENCES players(id),
            caught      INTEGER,
            UNIQUE (player_id, pokemon_id)
        );

        CREATE INDEX IF NOT EXISTS idx_images_pokemon ON images(pokemon_id);
        CREATE INDEX IF NOT EXISTS idx_phashes_pokemon ON phashes(pokemon_id);
        ",
    )?;
    Ok(())
}

/// Bring databases created by older builds up to date.
///
/// Tables created before the (player, pokemon) pair was unique get the
/// constraint as an index. Existing duplicate pairs make this fail; they are
/// left for a person to resolve.
pub fn migrate(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE UNIQUE INDEX IF NOT EXISTS idx_pokedex_entries_pair
            ON pokedex_entries(player_id, pokemon_id);
        ",
    )?;
    Ok(())
}
