use anyhow::Result;
use pkmnhelper_core::domain::Caught;
use pkmnhelper_core::Database;

pub fn run(db: &Database, discord_id: i64, name: &str, caught: Option<Caught>) -> Result<()> {
    let session = db.session()?;
    let mut entry = session.get_pokedex_entry(discord_id, name)?;

    if let Some(caught) = caught {
        if entry.caught != caught {
            entry.caught = caught;
            session.save_entry(&entry)?;
        }
    }

    println!("  {} {name}", entry.checkmark());
    Ok(())
}
