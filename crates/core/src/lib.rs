pub mod config;
pub mod domain;
pub mod error;
pub mod hasher;
pub mod ingest;
pub mod lookup;
pub mod store;

use std::ops::Deref;
use std::rc::Rc;

use config::Config;
use domain::*;
use error::Result;
use lookup::Lookups;
use store::Store;

/// Something that wants a handle on the shared store, such as the bot
/// runtime hosting the [`Database`].
pub trait StoreHost {
    fn attach_store(&mut self, store: Rc<Store>);
}

/// The main entry point for the bot: players, pokemon, image records and
/// pokedex entries.
///
/// Records are only ever fetched or created here, never deleted.
pub struct Database {
    store: Rc<Store>,
    lookups: Lookups,
}

impl Database {
    /// Build a facade over an open store. When a host is given it receives a
    /// handle on the same store.
    pub fn new(store: Rc<Store>, lookups: Lookups, host: Option<&mut dyn StoreHost>) -> Self {
        if let Some(host) = host {
            host.attach_store(Rc::clone(&store));
        }
        Self { store, lookups }
    }

    /// Open the store and lookup tables named by `config`, without a host.
    pub fn open(config: &Config) -> Result<Self> {
        let store = Store::open(&config.db)?;
        Ok(Self::new(Rc::new(store), Lookups::from_config(config), None))
    }

    pub fn store(&self) -> &Rc<Store> {
        &self.store
    }

    pub fn lookups(&self) -> &Lookups {
        &self.lookups
    }

    pub fn lookups_mut(&mut self) -> &mut Lookups {
        &mut self.lookups
    }

    /// Open the store connection if needed and close it when the returned
    /// guard is dropped, whichever way the scope is left.
    pub fn session(&self) -> Result<Session<'_>> {
        self.store.connect()?;
        Ok(Session { db: self })
    }

    /// Get or create the player with this Discord id.
    pub fn get_player(&self, discord_id: i64) -> Result<Player> {
        self.store.get_or_create_player(discord_id)
    }

    /// The player with this Discord id, if one was ever created. Never creates.
    pub fn check_player(&self, discord_id: i64) -> Result<Option<Player>> {
        self.store.find_player(discord_id)
    }

    pub fn save_player(&self, player: &Player) -> Result<()> {
        self.store.update_player(player)
    }

    pub fn get_pokemon_image_by_hash(&self, md5: &str) -> Result<Image> {
        self.store.get_or_create_image(md5)
    }

    pub fn get_pokemon_image_by_phash(&self, phash: &str) -> Result<PerceptualHash> {
        self.store.get_or_create_phash(phash)
    }

    pub fn get_pokemon_by_name(&self, name: &str) -> Result<Pokemon> {
        self.store.get_or_create_pokemon(name)
    }

    /// Get or create the pokedex entry for a player and pokemon, creating
    /// either of those along the way if needed.
    pub fn get_pokedex_entry(&self, discord_id: i64, pokemon_name: &str) -> Result<CollectionEntry> {
        let player = self.get_player(discord_id)?;
        let pokemon = self.get_pokemon_by_name(pokemon_name)?;
        self.store.get_or_create_entry(&player, &pokemon)
    }

    pub fn save_entry(&self, entry: &CollectionEntry) -> Result<()> {
        self.store.update_entry(entry)
    }
}

/// An open-connection scope over a [`Database`]. Closes the connection on drop.
pub struct Session<'a> {
    db: &'a Database,
}

impl Deref for Session<'_> {
    type Target = Database;

    fn deref(&self) -> &Database {
        self.db
    }
}

impl Drop for Session<'_> {
    fn drop(&mut self) {
        self.db.store.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lookup::{FlavorTable, HashKind, HashTable};

    struct FakeBot {
        store: Option<Rc<Store>>,
    }

    impl StoreHost for FakeBot {
        fn attach_store(&mut self, store: Rc<Store>) {
            self.store = Some(store);
        }
    }

    fn empty_lookups() -> Lookups {
        Lookups::new(
            HashTable::from_entries(HashKind::Exact, []),
            HashTable::from_entries(HashKind::Perceptual, []),
            FlavorTable::from_entries([]),
        )
    }

    #[test]
    fn test_new_hands_store_to_host() {
        let tmp = tempfile::tempdir().unwrap();
        let store = Rc::new(Store::open(&tmp.path().join("pkmn.db")).unwrap());
        let mut bot = FakeBot { store: None };

        let db = Database::new(Rc::clone(&store), empty_lookups(), Some(&mut bot));
        assert!(Rc::ptr_eq(bot.store.as_ref().unwrap(), db.store()));
    }

    #[test]
    fn test_session_opens_and_closes() {
        let tmp = tempfile::tempdir().unwrap();
        let store = Rc::new(Store::open(&tmp.path().join("pkmn.db")).unwrap());
        let db = Database::new(store, empty_lookups(), None);
        db.store().close();

        {
            let session = db.session().unwrap();
            assert!(!session.store().is_closed());
            session.get_player(7).unwrap();
        }
        assert!(db.store().is_closed());
    }

    #[test]
    fn test_session_closes_on_error_path() {
        fn failing(db: &Database) -> Result<()> {
            let session = db.session()?;
            let mut player = session.get_player(7)?;
            player.name = Some("a name far longer than thirty-two characters".to_string());
            session.save_player(&player)?;
            Ok(())
        }

        let tmp = tempfile::tempdir().unwrap();
        let db = Database::open(&Config {
            db: tmp.path().join("pkmn.db"),
            ..Config::default()
        })
        .unwrap();

        assert!(failing(&db).is_err());
        assert!(db.store().is_closed());
        assert!(failing(&db).is_err());
        assert!(db.store().is_closed());

        let session = db.session().unwrap();
        assert_eq!(session.check_player(7).unwrap().map(|p| p.name), Some(None));
    }
}
