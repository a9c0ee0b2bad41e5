use anyhow::Result;
use pkmnhelper_core::domain::Player;
use pkmnhelper_core::Database;

pub fn get(db: &Database, discord_id: i64) -> Result<()> {
    let session = db.session()?;
    let player = session.get_player(discord_id)?;
    print_player(&player);
    Ok(())
}

pub fn check(db: &Database, discord_id: i64) -> Result<()> {
    let session = db.session()?;
    match session.check_player(discord_id)? {
        Some(player) => print_player(&player),
        None => println!("Player {discord_id} is not registered."),
    }
    Ok(())
}

fn print_player(player: &Player) {
    println!("  Discord id: {}", player.discord_id);
    println!("  Name:       {}", player.name.as_deref().unwrap_or("-"));
    println!("  Active:     {}", if player.active { "yes" } else { "no" });
}
