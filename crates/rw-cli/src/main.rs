//! ReWrite CLI
//!
//! CLI tool for editing rule files and checking what rules do to a URL.

mod store;

use std::time::{SystemTime, UNIX_EPOCH};

use clap::{Args, Parser, Subcommand};
use serde::Serialize;

use rw_core::manage::{self, DraftFields, RuleDraft};
use rw_core::navigation::RecordingSink;
use rw_core::store::install_defaults;
use rw_core::{
    matching_rules, ActionKind, NavigationHandler, NavigationOutcome, SettingsStore, StoredRule,
};

use crate::store::JsonFileStore;

#[derive(Parser)]
#[command(name = "rw-cli")]
#[command(about = "ReWrite rule file editor and tester")]
struct Cli {
    /// Rules file in extension storage format
    #[arg(short, long, env = "RW_STORE", default_value = "rules.json", global = true)]
    store: String,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct RuleArgs {
    /// Domain the rule applies to (subdomains included)
    #[arg(short, long)]
    domain: String,

    /// remove, add, redirect or hideElement
    #[arg(short, long)]
    action: String,

    #[arg(long)]
    parameter: Option<String>,

    #[arg(long)]
    value: Option<String>,

    #[arg(long)]
    from_path: Option<String>,

    #[arg(long)]
    to_path: Option<String>,

    #[arg(long)]
    selector: Option<String>,
}

impl RuleArgs {
    fn to_draft(&self) -> Result<RuleDraft, String> {
        let fields = DraftFields {
            parameter: self.parameter.as_deref(),
            value: self.value.as_deref(),
            from_path: self.from_path.as_deref(),
            to_path: self.to_path.as_deref(),
            selector: self.selector.as_deref(),
        };
        RuleDraft::parse(&self.domain, &self.action, &fields).map_err(|e| e.to_string())
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Write default rules and settings if missing
    Init,

    /// List rules
    List,

    /// Add a rule
    Add(RuleArgs),

    /// Edit a rule
    Edit {
        id: i64,

        #[command(flatten)]
        rule: RuleArgs,
    },

    /// Flip a rule's enabled flag
    Toggle { id: i64 },

    /// Delete a rule
    Delete { id: i64 },

    /// Turn rule application on
    Enable,

    /// Turn rule application off
    Disable,

    /// Show rules matching a hostname
    Match {
        #[arg(long)]
        host: String,
    },

    /// Show what the rules do to a URL
    Apply {
        #[arg(short, long)]
        url: String,

        /// Treat the URL as an embedded frame navigation
        #[arg(long)]
        subframe: bool,
    },

    /// Report stored records that cannot be used
    Validate,

    /// Summarize the rule file
    Info {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
}

fn main() {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level)).init();

    let mut store = JsonFileStore::open(&cli.store);

    let result = match cli.command {
        Commands::Init => cmd_init(&mut store),
        Commands::List => cmd_list(&store),
        Commands::Add(rule) => cmd_add(&mut store, &rule),
        Commands::Edit { id, rule } => cmd_edit(&mut store, id, &rule),
        Commands::Toggle { id } => cmd_toggle(&mut store, id),
        Commands::Delete { id } => cmd_delete(&mut store, id),
        Commands::Enable => cmd_set_enabled(&mut store, true),
        Commands::Disable => cmd_set_enabled(&mut store, false),
        Commands::Match { host } => cmd_match(&store, &host),
        Commands::Apply { url, subframe } => cmd_apply(store, &url, subframe),
        Commands::Validate => cmd_validate(&store),
        Commands::Info { json } => cmd_info(&store, json),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or_default()
}

fn format_rule(rule: &StoredRule) -> String {
    format!(
        "  [{}] {} {:<24} {}",
        rule.id,
        if rule.enabled { "on " } else { "off" },
        rule.domain,
        manage::describe(rule)
    )
}

fn cmd_init<S: SettingsStore>(store: &mut S) -> Result<(), String> {
    let changed = install_defaults(store, now_ms()).map_err(|e| e.to_string())?;
    if changed.is_empty() {
        println!("Store already initialized");
    } else {
        println!("Initialized store ({:?})", changed);
    }
    Ok(())
}

fn cmd_list<S: SettingsStore>(store: &S) -> Result<(), String> {
    let state = store.get().map_err(|e| e.to_string())?;
    let enabled = state.settings().enabled;

    println!("Rewriting: {}", if enabled { "Enabled" } else { "Disabled" });
    if state.rules().is_empty() {
        println!("No rules configured.");
        return Ok(());
    }
    for rule in state.rules() {
        println!("{}", format_rule(rule));
    }
    Ok(())
}

fn cmd_add<S: SettingsStore>(store: &mut S, args: &RuleArgs) -> Result<(), String> {
    let draft = args.to_draft()?;
    let rule = manage::add_rule(store, draft, now_ms()).map_err(|e| e.to_string())?;
    println!("Added rule {}", rule.id);
    println!("{}", format_rule(&rule));
    Ok(())
}

fn cmd_edit<S: SettingsStore>(store: &mut S, id: i64, args: &RuleArgs) -> Result<(), String> {
    let draft = args.to_draft()?;
    let rule = manage::edit_rule(store, id, draft).map_err(|e| e.to_string())?;
    println!("Updated rule {}", rule.id);
    println!("{}", format_rule(&rule));
    Ok(())
}

fn cmd_toggle<S: SettingsStore>(store: &mut S, id: i64) -> Result<(), String> {
    let enabled = manage::toggle_rule(store, id).map_err(|e| e.to_string())?;
    println!("Rule {} {}", id, if enabled { "enabled" } else { "disabled" });
    Ok(())
}

fn cmd_delete<S: SettingsStore>(store: &mut S, id: i64) -> Result<(), String> {
    let rule = manage::delete_rule(store, id).map_err(|e| e.to_string())?;
    println!("Deleted rule {} ({})", rule.id, rule.domain);
    Ok(())
}

fn cmd_set_enabled<S: SettingsStore>(store: &mut S, enabled: bool) -> Result<(), String> {
    manage::set_enabled(store, enabled).map_err(|e| e.to_string())?;
    println!("Rewriting {}", if enabled { "enabled" } else { "disabled" });
    Ok(())
}

fn cmd_match<S: SettingsStore>(store: &S, host: &str) -> Result<(), String> {
    let state = store.get().map_err(|e| e.to_string())?;
    let rules: Vec<_> = state.rules().iter().filter_map(|r| r.to_rule().ok()).collect();

    let matched: Vec<_> = matching_rules(&rules, host).collect();
    if matched.is_empty() {
        println!("No rules match '{}'", host);
        return Ok(());
    }

    println!("{} rule(s) match '{}':", matched.len(), host);
    for rule in matched {
        println!("{}", format_rule(&StoredRule::from_rule(rule)));
    }
    Ok(())
}

fn cmd_apply<S: SettingsStore>(store: S, url: &str, subframe: bool) -> Result<(), String> {
    let mut handler = NavigationHandler::new(store);
    let mut sink = RecordingSink::default();

    let outcome = handler
        .on_committed(url, !subframe, &mut sink)
        .map_err(|e| e.to_string())?;

    match outcome {
        NavigationOutcome::Redirected(target) => println!("{}", target),
        NavigationOutcome::Unchanged => println!("No change"),
        NavigationOutcome::Disabled => println!("Rewriting is disabled"),
        NavigationOutcome::IgnoredFrame => println!("Ignored: not a top-level frame"),
        NavigationOutcome::InvalidUrl => return Err(format!("Invalid URL '{}'", url)),
    }
    Ok(())
}

fn cmd_validate<S: SettingsStore>(store: &S) -> Result<(), String> {
    let state = store.get().map_err(|e| e.to_string())?;

    let mut invalid = 0usize;
    let mut seen = std::collections::HashSet::new();
    for rule in state.rules() {
        if !seen.insert(rule.id) {
            println!("  [{}] duplicate id", rule.id);
            invalid += 1;
        }
        if let Err(e) = rule.to_rule() {
            println!("  [{}] {}", rule.id, e);
            invalid += 1;
        }
    }

    if invalid > 0 {
        return Err(format!("{} problem(s) in {} rule(s)", invalid, state.rules().len()));
    }
    println!("All {} rule(s) are valid", state.rules().len());
    Ok(())
}

#[derive(Debug, Default, Serialize)]
struct InfoReport {
    enabled: bool,
    total: usize,
    active: usize,
    invalid: usize,
    remove: usize,
    add: usize,
    redirect: usize,
    hide_element: usize,
}

fn build_info<S: SettingsStore>(store: &S) -> Result<InfoReport, String> {
    let state = store.get().map_err(|e| e.to_string())?;
    let mut report = InfoReport {
        enabled: state.settings().enabled,
        total: state.rules().len(),
        ..Default::default()
    };

    for stored in state.rules() {
        let rule = match stored.to_rule() {
            Ok(rule) => rule,
            Err(_) => {
                report.invalid += 1;
                continue;
            }
        };
        if rule.enabled {
            report.active += 1;
        }
        match rule.action.kind() {
            ActionKind::Remove => report.remove += 1,
            ActionKind::Add => report.add += 1,
            ActionKind::Redirect => report.redirect += 1,
            ActionKind::HideElement => report.hide_element += 1,
        }
    }
    Ok(report)
}

fn cmd_info<S: SettingsStore>(store: &S, json: bool) -> Result<(), String> {
    let report = build_info(store)?;

    if json {
        let text = serde_json::to_string_pretty(&report)
            .map_err(|e| format!("Failed to serialize report: {}", e))?;
        println!("{}", text);
        return Ok(());
    }

    println!("Rules file");
    println!("  Enabled:     {}", report.enabled);
    println!("  Rules:       {} ({} active, {} invalid)", report.total, report.active, report.invalid);
    println!("  remove:      {}", report.remove);
    println!("  add:         {}", report.add);
    println!("  redirect:    {}", report.redirect);
    println!("  hideElement: {}", report.hide_element);
    Ok(())
}
