use anyhow::Result;
use indicatif::{ProgressBar, ProgressStyle};
use pkmnhelper_core::config::Config;
use pkmnhelper_core::ingest::{self, IngestProgress};

fn active_style() -> ProgressStyle {
    ProgressStyle::with_template(
        "  {bar:30.cyan/blue} {spinner:.green} {pos:>5}/{len:<5} {prefix:.dim} {msg}",
    )
    .unwrap()
    .progress_chars("━╸─")
}

fn done_style() -> ProgressStyle {
    ProgressStyle::with_template("  {bar:30.green} {prefix:.green} {msg:.dim}").unwrap()
}

pub fn run(config: &Config) -> Result<()> {
    let mut pb: Option<ProgressBar> = None;

    let summary = ingest::run(
        config,
        Some(&mut |progress| match progress {
            IngestProgress::Syncing { dir } => {
                println!("  Syncing {}", dir.display());
            }
            IngestProgress::HashStart { count } => {
                let bar = ProgressBar::new(count as u64);
                bar.set_style(active_style());
                bar.set_prefix("Hashing");
                bar.enable_steady_tick(std::time::Duration::from_millis(80));
                pb = Some(bar);
            }
            IngestProgress::Hashed { name } => {
                if let Some(ref bar) = pb {
                    bar.set_message(name);
                    bar.inc(1);
                }
            }
            IngestProgress::Complete { exact, .. } => {
                if let Some(bar) = pb.take() {
                    bar.set_style(done_style());
                    bar.set_prefix("done");
                    bar.finish_with_message(format!("{exact} image hashes"));
                }
            }
        }),
    )?;

    println!();
    println!(
        "  Wrote {} ({} entries) and {} ({} entries).",
        config.image_hashes.display(),
        summary.exact,
        config.phashes.display(),
        summary.perceptual
    );
    Ok(())
}
