//! Command-line front end for Resource Plus.
//!
//! Every command opens the documents under the data directory, performs one
//! action as the stored session user, and writes the documents back.

use achievement_chain::{
    AppConfig, FileStore, ResourcePlus, Upload, VerifyMode, SESSION_KEY,
};
use std::{env, fs, path::PathBuf};
use tracing_subscriber::EnvFilter;

fn fatal(message: &str) -> ! {
    eprintln!("{message}");
    std::process::exit(1);
}

fn print_help() {
    println!("Usage: rplus [--data-dir <dir>] <command> ...");
    println!("  signup <name> <email> <password>");
    println!("  login <email> <password>");
    println!("  logout | whoami");
    println!("  upload <file.pdf> <name> [--author <name>] [--subject <subject>]");
    println!("  download <resource_id>");
    println!("  resources [--search <query>] [--subject <subject>]");
    println!("  seed | leaderboard | achievements | verify");
    println!("  record <event_type> <value> <title>");
    println!();
    println!("Environment: RPLUS_DATA_DIR, RPLUS_HASH (fnv1a|blake2b|sha256),");
    println!("             RPLUS_VERIFY (linkage|strict), RPLUS_IDEMPOTENT, RUST_LOG");
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("achievement_chain=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn take_flag(args: &mut Vec<String>, flag: &str) -> Option<String> {
    let idx = args.iter().position(|arg| arg == flag)?;
    if idx + 1 >= args.len() {
        fatal(&format!("{flag} requires a value"));
    }
    let value = args.remove(idx + 1);
    args.remove(idx);
    Some(value)
}

fn main() {
    init_tracing();
    let mut args: Vec<String> = env::args().skip(1).collect();
    let mut config = AppConfig::from_env().unwrap_or_else(|err| fatal(&err.to_string()));
    if let Some(dir) = take_flag(&mut args, "--data-dir") {
        config.data_dir = PathBuf::from(dir);
    }
    if args.is_empty() || matches!(args[0].as_str(), "help" | "--help" | "-h") {
        print_help();
        return;
    }
    let command = args.remove(0);

    let store = FileStore::new(&config.data_dir);
    let (mut app, report) = ResourcePlus::open(store, config.ledger.clone())
        .unwrap_or_else(|err| fatal(&format!("failed to open {}: {err}", config.data_dir.display())));
    for dropped in &report.dropped {
        eprintln!(
            "warning: dropped {} unreadable achievement record(s) for {} from index {}: {}",
            dropped.count, dropped.subject_id, dropped.index, dropped.reason
        );
    }
    if let Some(err) = &report.document_error {
        eprintln!("warning: achievement history unreadable, starting fresh: {err}");
    }
    if let Some(key) = &report.preserved_as {
        eprintln!("warning: previous achievement document kept under {key}");
    }

    match command.as_str() {
        "signup" => {
            let [name, email, password] = expect_args::<3>(&args, "signup <name> <email> <password>");
            let user = app
                .signup(name, email, password)
                .unwrap_or_else(|err| fatal(&err.to_string()));
            println!("signed up {} ({})", user.name, user.id);
        }
        "login" => {
            let [email, password] = expect_args::<2>(&args, "login <email> <password>");
            let user = app
                .login(email, password)
                .unwrap_or_else(|err| fatal(&err.to_string()));
            println!("logged in as {} ({} pts)", user.name, user.points);
        }
        "logout" => {
            app.logout().unwrap_or_else(|err| fatal(&err.to_string()));
            println!("logged out");
        }
        "whoami" => match app.current_user() {
            Some(user) => println!("{} <{}> {} pts ({})", user.name, user.email, user.points, user.id),
            None => println!("not logged in ({SESSION_KEY} empty)"),
        },
        "upload" => {
            let author = take_flag(&mut args, "--author");
            let subject = take_flag(&mut args, "--subject").unwrap_or_else(|| "Other".to_string());
            let [path, name] = expect_args::<2>(&args, "upload <file.pdf> <name>");
            let bytes = fs::read(path).unwrap_or_else(|err| fatal(&format!("{path}: {err}")));
            let default_author = app.current_user().map(|u| u.name.clone()).unwrap_or_default();
            let author = author.unwrap_or(default_author);
            let resource = app
                .upload(Upload {
                    name,
                    author: &author,
                    subject: &subject,
                    bytes: &bytes,
                })
                .unwrap_or_else(|err| fatal(&err.to_string()));
            println!("uploaded {} ({}) +1 point", resource.name, resource.id);
        }
        "download" => {
            let [id] = expect_args::<1>(&args, "download <resource_id>");
            let resource = app.download(id).unwrap_or_else(|err| fatal(&err.to_string()));
            println!(
                "{}.pdf: {} downloads, {} bytes, blake2b {}",
                resource.name.split_whitespace().collect::<Vec<_>>().join("_"),
                resource.download_count,
                resource.size,
                resource.content_digest
            );
        }
        "resources" => {
            let query = take_flag(&mut args, "--search").unwrap_or_default();
            let subject = take_flag(&mut args, "--subject");
            let hits = app.catalog().search(&query, subject.as_deref());
            if hits.is_empty() {
                println!("No resources found.");
            }
            for res in hits {
                println!(
                    "{}  {} by {} [{}] {} downloads, uploaded by {}",
                    res.id, res.name, res.author, res.subject, res.download_count, res.uploader_name
                );
            }
        }
        "seed" => {
            let count = app.seed_samples().unwrap_or_else(|err| fatal(&err.to_string()));
            println!("added {count} sample resources");
        }
        "leaderboard" => {
            for (rank, standing) in app.leaderboard().iter().enumerate() {
                println!("{}. {} {} pts", rank + 1, standing.name, standing.points);
            }
        }
        "achievements" => {
            let profile = app.profile().unwrap_or_else(|err| fatal(&err.to_string()));
            println!(
                "{} | {} pts | {} ({}) | {} uploads, {} downloads",
                profile.user.name,
                profile.user.points,
                profile.badge,
                profile.badge.next_label(),
                profile.uploads.len(),
                profile.downloads
            );
            println!("{}", profile.achievements);
        }
        "verify" => {
            let mode = match app.ledger().config().verify_mode {
                VerifyMode::Linkage => "linkage",
                VerifyMode::Strict => "strict",
            };
            let results = app.ledger().verify_all();
            let mut broken = 0usize;
            for (subject, verification) in &results {
                if !verification.is_valid() {
                    broken += 1;
                }
                println!("[{}] {subject}: {verification}", if verification.is_valid() { "ok" } else { "fail" });
            }
            println!("{} chain(s) checked ({mode}), {broken} broken", results.len());
            if broken > 0 {
                std::process::exit(2);
            }
        }
        "record" => {
            let [event_type, value, title] = expect_args::<3>(&args, "record <event_type> <value> <title>");
            let value: i64 = value
                .parse()
                .unwrap_or_else(|_| fatal(&format!("invalid value: {value}")));
            let outcome = app
                .record(event_type, value, title)
                .unwrap_or_else(|err| fatal(&err.to_string()));
            let verb = if outcome.is_created() { "recorded" } else { "already recorded" };
            println!("{verb} {} ({})", outcome.entry().title, outcome.entry().hash);
        }
        other => {
            eprintln!("unknown command: {other}");
            print_help();
            std::process::exit(1);
        }
    }

    if let Some(err) = app.unsaved_changes() {
        eprintln!("warning: changes may not be saved: {err}");
    }
}

fn expect_args<'a, const N: usize>(args: &'a [String], usage: &str) -> [&'a str; N] {
    if args.len() != N {
        fatal(&format!("Usage: rplus {usage}"));
    }
    std::array::from_fn(|idx| args[idx].as_str())
}
