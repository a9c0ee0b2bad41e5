use anyhow::Result;
use pkmnhelper_core::domain::HashRecord;
use pkmnhelper_core::Database;

pub fn image(db: &Database, md5: &str) -> Result<()> {
    let session = db.session()?;
    let mut record = session.get_pokemon_image_by_hash(md5)?;
    print_record(&session, &mut record)
}

pub fn phash(db: &Database, phash: &str) -> Result<()> {
    let session = db.session()?;
    let mut record = session.get_pokemon_image_by_phash(phash)?;
    print_record(&session, &mut record)
}

pub fn pokemon(db: &Database, name: &str) -> Result<()> {
    let session = db.session()?;
    let pokemon = session.get_pokemon_by_name(name)?;
    println!("  {name}");
    if let Some(flavor) = pokemon.flavor(session.lookups().flavors())? {
        println!("  {flavor}");
    }
    Ok(())
}

fn print_record<R: HashRecord>(db: &Database, record: &mut R) -> Result<()> {
    match record.name(db)? {
        Some(name) => {
            println!("  {} is {name}", record.hash());
            if let Some(flavor) = record.flavor(db)? {
                println!("  {flavor}");
            }
        }
        None => println!("  {} is not a known pokemon", record.hash()),
    }
    Ok(())
}
