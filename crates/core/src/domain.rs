use rand::Rng;

use crate::error::Result;
use crate::lookup::{FlavorTable, HashKind};
use crate::Database;

/// A chat user, keyed by their Discord id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Player {
    pub id: i64,
    pub discord_id: i64,
    pub name: Option<String>,
    pub active: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pokemon {
    pub id: i64,
    pub name: Option<String>,
}

impl Pokemon {
    /// A random flavor line for this pokemon, if any are known.
    pub fn flavor(&self, flavors: &FlavorTable) -> Result<Option<String>> {
        self.flavor_with(flavors, &mut rand::thread_rng())
    }

    pub fn flavor_with<R: Rng + ?Sized>(
        &self,
        flavors: &FlavorTable,
        rng: &mut R,
    ) -> Result<Option<String>> {
        let Some(name) = self.name.as_deref() else {
            return Ok(None);
        };
        flavors.pick(name, rng)
    }
}

/// An image seen in chat, keyed by the MD5 of its bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Image {
    pub id: i64,
    pub md5: String,
    pub pokemon: Option<Pokemon>,
}

/// An image seen in chat, keyed by its perceptual hash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PerceptualHash {
    pub id: i64,
    pub phash: String,
    pub pokemon: Option<Pokemon>,
}

/// A record keyed by an image hash that may be linked to a pokemon.
///
/// The link is filled in lazily: the first [`load_name`](HashRecord::load_name)
/// whose hash is in the matching lookup table attaches the pokemon and saves
/// the record. Misses are not remembered, so every call on an unknown hash
/// repeats the (in-memory) lookup.
pub trait HashRecord {
    /// Lookup table and database table this record belongs to.
    const KIND: HashKind;

    fn id(&self) -> i64;
    fn hash(&self) -> &str;
    fn pokemon(&self) -> Option<&Pokemon>;
    fn set_pokemon(&mut self, pokemon: Pokemon);

    fn load_name(&mut self, db: &Database) -> Result<()> {
        if self.pokemon().is_some_and(|p| p.name.is_some()) {
            return Ok(());
        }
        let Some(name) = db.lookups().table(Self::KIND).resolve(self.hash())? else {
            return Ok(());
        };
        let pokemon = db.get_pokemon_by_name(&name)?;
        db.store().attach_pokemon(Self::KIND, self.id(), pokemon.id)?;
        self.set_pokemon(pokemon);
        Ok(())
    }

    fn name(&mut self, db: &Database) -> Result<Option<String>> {
        self.load_name(db)?;
        Ok(self.pokemon().and_then(|p| p.name.clone()))
    }

    /// Flavor of the attached pokemon. Does not resolve the name first.
    fn flavor(&self, db: &Database) -> Result<Option<String>> {
        match self.pokemon() {
            Some(pokemon) => pokemon.flavor(db.lookups().flavors()),
            None => Ok(None),
        }
    }
}

impl HashRecord for Image {
    const KIND: HashKind = HashKind::Exact;

    fn id(&self) -> i64 {
        self.id
    }

    fn hash(&self) -> &str {
        &self.md5
    }

    fn pokemon(&self) -> Option<&Pokemon> {
        self.pokemon.as_ref()
    }

    fn set_pokemon(&mut self, pokemon: Pokemon) {
        self.pokemon = Some(pokemon);
    }
}

impl HashRecord for PerceptualHash {
    const KIND: HashKind = HashKind::Perceptual;

    fn id(&self) -> i64 {
        self.id
    }

    fn hash(&self) -> &str {
        &self.phash
    }

    fn pokemon(&self) -> Option<&Pokemon> {
        self.pokemon.as_ref()
    }

    fn set_pokemon(&mut self, pokemon: Pokemon) {
        self.pokemon = Some(pokemon);
    }
}

/// Whether a player has caught a pokemon. `Unknown` until someone says otherwise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Caught {
    #[default]
    Unknown,
    Yes,
    No,
}

impl Caught {
    pub fn checkmark(self) -> &'static str {
        match self {
            Caught::Unknown => "❓",
            Caught::Yes => "✅",
            Caught::No => "❌",
        }
    }

    pub fn as_db(self) -> Option<bool> {
        match self {
            Caught::Unknown => None,
            Caught::Yes => Some(true),
            Caught::No => Some(false),
        }
    }
}

impl From<Option<bool>> for Caught {
    fn from(value: Option<bool>) -> Self {
        match value {
            None => Caught::Unknown,
            Some(true) => Caught::Yes,
            Some(false) => Caught::No,
        }
    }
}

/// One row of a player's pokedex.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionEntry {
    pub id: i64,
    pub player: Player,
    pub pokemon: Pokemon,
    pub caught: Caught,
}

impl CollectionEntry {
    pub fn checkmark(&self) -> &'static str {
        self.caught.checkmark()
    }
}
