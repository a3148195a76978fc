use achievement_chain::{
    verify_chain, verify_chain_strict, FileStore, Ledger, LedgerConfig, LedgerError,
};
use std::path::PathBuf;

fn main() -> Result<(), LedgerError> {
    let args: Vec<String> = std::env::args().collect();
    let dir = args
        .get(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| std::env::temp_dir().join("achievement_chain_demo"));
    println!("Ledger directory: {}", dir.display());

    let (mut ledger, report) = Ledger::open(FileStore::new(&dir), LedgerConfig::default())?;
    if !report.is_clean() {
        println!("Recovered from a damaged ledger: {report:?}");
    }

    let welcome = ledger.on_subject_active("demo-user")?;
    println!(
        "welcome {} -> {}",
        if welcome.is_created() { "created" } else { "already present" },
        welcome.entry().hash
    );
    ledger.append_if_absent("demo-user", "upload", 1, "First upload", chrono::Utc::now())?;
    println!("{}", ledger.report("demo-user"));

    let mut forged = ledger.get_chain("demo-user").to_vec();
    if let Some(last) = forged.last_mut() {
        last.value += 100;
    }
    println!("after editing a value:");
    println!("  linkage check: {}", verify_chain(&forged));
    println!("  strict check:  {}", verify_chain_strict(&forged));
    Ok(())
}
