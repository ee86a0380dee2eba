//!
//! motormart admin CLI
//! -------------------
//! Command-line client for a running motormart server. Logs in with the
//! given credentials and performs one administrative operation per
//! invocation. Supports configuration via CLI flags and environment
//! variables.

use anyhow::{anyhow, Result};
use std::env;

use motormart::client::ApiClient;
use motormart::storage::users::UserUpdate;

fn flag_value(args: &[String], flag: &str) -> Option<String> {
    let mut i = 0;
    while i < args.len() {
        if args[i] == flag && i + 1 < args.len() {
            return Some(args[i + 1].clone());
        }
        i += 1;
    }
    None
}

fn setting(args: &[String], flag: &str, env_name: &str, default: &str) -> String {
    flag_value(args, flag)
        .or_else(|| env::var(env_name).ok())
        .unwrap_or_else(|| default.to_string())
}

fn usage() -> ! {
    eprintln!(
        "usage: motormart_cli [--base URL] [--user NAME] [--pass SECRET] <command> [args]\n\
         commands:\n\
           create-user <username> <password> <email> <role>\n\
           view-users [username]\n\
           search-users <query>\n\
           update-user <username> [--email E] [--role R]\n\
           suspend-user <username> | reenable-user <username>\n\
           create-profile <role> <right,right,...>\n\
           view-profiles [role]\n\
           search-profiles <query>\n\
           update-profile <role> <right,right,...>\n\
           suspend-profile <role> | reenable-profile <role>\n\
           view-listings\n\
         env: MOTORMART_BASE_URL, MOTORMART_ADMIN_USER, MOTORMART_ADMIN_PASS"
    );
    std::process::exit(2);
}

fn print_json(v: &serde_json::Value) {
    match serde_json::to_string_pretty(v) {
        Ok(s) => println!("{}", s),
        Err(_) => println!("{}", v),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = env::args().skip(1).collect();

    let base = setting(&args, "--base", "MOTORMART_BASE_URL", "http://localhost:8080");
    let user = setting(&args, "--user", "MOTORMART_ADMIN_USER", "admin");
    let pass = setting(&args, "--pass", "MOTORMART_ADMIN_PASS", "motormart");

    // First token that is not a flag or a flag value is the command
    let mut positional: Vec<String> = Vec::new();
    let mut i = 0;
    while i < args.len() {
        let a = &args[i];
        if a.starts_with("--") {
            i += 2; // every flag takes a value
            continue;
        }
        positional.push(a.clone());
        i += 1;
    }
    if positional.is_empty() {
        usage();
    }
    let command = positional[0].as_str();
    let rest = &positional[1..];

    let mut client = ApiClient::new(&base)?;
    client.login(&user, &pass).await?;

    let out = match (command, rest) {
        ("create-user", [username, password, email, role]) => {
            client.create_user(username, password, email, role).await?
        }
        ("view-users", []) => client.view_users(None).await?,
        ("view-users", [username]) => client.view_users(Some(username)).await?,
        ("search-users", [query]) => client.search_users(query).await?,
        ("update-user", [username, ..]) => {
            let update = UserUpdate {
                email: flag_value(&args, "--email"),
                role: flag_value(&args, "--role"),
            };
            client.update_user(username, &update).await?
        }
        ("suspend-user", [username]) => client.suspend_user(username).await?,
        ("reenable-user", [username]) => client.reenable_user(username).await?,
        ("create-profile", [role, rights]) => {
            let rights: Vec<&str> = rights.split(',').map(|s| s.trim()).collect();
            client.create_profile(role, &rights).await?
        }
        ("view-profiles", []) => client.view_profiles(None).await?,
        ("view-profiles", [role]) => client.view_profiles(Some(role)).await?,
        ("search-profiles", [query]) => client.search_profiles(query).await?,
        ("update-profile", [role, rights]) => {
            let rights: Vec<&str> = rights.split(',').map(|s| s.trim()).collect();
            client.update_profile(role, &rights).await?
        }
        ("suspend-profile", [role]) => client.suspend_profile(role).await?,
        ("reenable-profile", [role]) => client.reenable_profile(role).await?,
        ("view-listings", []) => client.view_listings().await?,
        _ => return Err(anyhow!("unknown command or wrong arguments: {}", command)),
    };
    print_json(&out);

    client.logout().await?;
    Ok(())
}
