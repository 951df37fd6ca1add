use crate::cmd::open_store;
use crate::output::print_json;
use anyhow::bail;
use kanban_core::verify::{self, VerifyOutcome, VERIFY_TIMEOUT};
use std::path::Path;

pub fn run(root: &Path, id: &str, update: bool, json: bool) -> anyhow::Result<()> {
    let store = open_store(root)?;
    let report = verify::verify(&store, id, update, VERIFY_TIMEOUT)?;

    if json {
        print_json(&report)?;
    } else {
        println!("{}: {}", report.id, report.command);
        match &report.outcome {
            VerifyOutcome::Passed { output } | VerifyOutcome::Failed { output } => {
                if !output.trim().is_empty() {
                    println!("{}", output.trim_end());
                }
            }
            VerifyOutcome::TimedOut { .. } => {}
        }
        if report.persisted {
            println!("(result recorded on {})", report.id);
        }
    }

    match report.outcome {
        VerifyOutcome::Passed { .. } => {
            if !json {
                println!("PASSED");
            }
            Ok(())
        }
        VerifyOutcome::Failed { .. } => bail!("verification failed for {}", report.id),
        VerifyOutcome::TimedOut { seconds } => {
            bail!("verification of {} timed out after {seconds}s", report.id)
        }
    }
}
