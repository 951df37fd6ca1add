use crate::cmd::open_store;
use crate::output::print_json;
use clap::Subcommand;
use std::path::Path;

#[derive(Subcommand)]
pub enum ManifestSubcommand {
    /// Regenerate manifest.tsv from the task files
    Rebuild,
}

pub fn run(root: &Path, subcmd: ManifestSubcommand, json: bool) -> anyhow::Result<()> {
    let store = open_store(root)?;
    match subcmd {
        ManifestSubcommand::Rebuild => {
            let rows = store.rebuild_manifest()?;
            let malformed = store.scan()?.malformed;
            if json {
                return print_json(&serde_json::json!({
                    "rows": rows,
                    "malformed": malformed,
                }));
            }
            println!("Rebuilt manifest: {rows} tasks");
            for m in &malformed {
                eprintln!("warning: skipped {}: {}", m.path.display(), m.reason);
            }
        }
    }
    Ok(())
}
