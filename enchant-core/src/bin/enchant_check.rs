//! Enchant Check CLI - evaluate a field policy against a fixture
//!
//! The fixture is a JSON file with the raw policy settings, user grants and
//! tickets:
//!
//! ```json
//! {
//!   "settings": { "tweaks": "milestone", "milestone.permission": "MILESTONE_EDIT" },
//!   "grants": { "alice": ["TICKET_VIEW", "MILESTONE_EDIT"] },
//!   "tickets": [ { "id": "1", "values": { "type": "defect", "milestone": "1.0" } } ]
//! }
//! ```
//!
//! Usage:
//!     enchant-check --fixture tracker.json policy
//!     enchant-check --fixture tracker.json fields --user bob --ticket 1
//!     enchant-check --fixture tracker.json access --user bob
//!     enchant-check --fixture tracker.json validate --user bob --ticket 1 --set milestone=2.0
//!     enchant-check --fixture tracker.json types --user bob defect security

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use serde::Deserialize;
use serde_json::json;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use enchant_core::policy::settings_from_value;
use enchant_core::{
    adjusted_total, AccessDecisionEngine, EnchantError, EvaluationSession, FieldPolicyResolver,
    InMemoryPermissionStore, InMemoryTicketStore, MutationValidator, PermissionPipeline,
    PolicyConfig, PolicyLoader, ResourceRef, Result, Ticket, TicketStore, TypeFilter,
};

#[derive(Parser, Debug)]
#[command(name = "enchant-check")]
#[command(about = "Evaluate ticket field policies against a fixture")]
#[command(version)]
struct Args {
    /// Path to the fixture JSON file
    #[arg(short, long)]
    fixture: PathBuf,

    /// Output as JSON
    #[arg(long)]
    json: bool,

    /// Fail on configuration issues instead of using safe defaults
    #[arg(long)]
    strict: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show configured rules, declared permissions and configuration issues
    Policy,

    /// Effective state of every configured field
    Fields {
        #[arg(short, long)]
        user: String,

        /// Ticket id (omit for a new ticket)
        #[arg(short, long)]
        ticket: Option<String>,
    },

    /// Ticket-level access decisions
    Access {
        #[arg(short, long)]
        user: String,

        #[arg(short, long, default_value = "TICKET_VIEW")]
        action: String,

        /// Ticket ids (default: every ticket in the fixture)
        tickets: Vec<String>,
    },

    /// Validate proposed changes to a ticket
    Validate {
        #[arg(short, long)]
        user: String,

        /// Ticket id (omit for a new ticket)
        #[arg(short, long)]
        ticket: Option<String>,

        /// Proposed change as field=value
        #[arg(long = "set", value_parser = parse_assignment)]
        changes: Vec<(String, String)>,
    },

    /// Ticket types the user may choose
    Types {
        #[arg(short, long)]
        user: String,

        /// Candidate types (default: every type used in the fixture)
        types: Vec<String>,
    },
}

#[derive(Debug, Deserialize)]
struct Fixture {
    settings: serde_json::Value,

    #[serde(default)]
    grants: BTreeMap<String, Vec<String>>,

    #[serde(default)]
    tickets: Vec<Ticket>,
}

fn parse_assignment(raw: &str) -> std::result::Result<(String, String), String> {
    raw.split_once('=')
        .map(|(field, value)| (field.trim().to_string(), value.to_string()))
        .filter(|(field, _)| !field.is_empty())
        .ok_or_else(|| format!("expected field=value, got '{}'", raw))
}

fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_env("ENCHANT_LOG")
                .or_else(|_| tracing_subscriber::EnvFilter::try_from_default_env())
                .unwrap_or_else(|_| "enchant_core=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            if args.json {
                let response = e.to_error_response();
                eprintln!(
                    "{}",
                    serde_json::to_string_pretty(&response).unwrap_or_else(|_| e.to_string())
                );
            } else {
                eprintln!("Error [{}]: {}", e.error_code(), e);
            }
            ExitCode::FAILURE
        }
    }
}

struct Workspace {
    config: Arc<PolicyConfig>,
    tickets: Arc<InMemoryTicketStore>,
    grants: InMemoryPermissionStore,
}

impl Workspace {
    fn load(args: &Args) -> Result<Self> {
        let content = std::fs::read_to_string(&args.fixture).map_err(|e| {
            EnchantError::ConfigLoadError {
                path: args.fixture.display().to_string(),
                reason: e.to_string(),
            }
        })?;
        let fixture: Fixture = serde_json::from_str(&content)?;

        let loader = if args.strict {
            PolicyLoader::new().strict()
        } else {
            PolicyLoader::new()
        };
        let config = loader.load_settings(&settings_from_value(&fixture.settings)?)?;

        let tickets = InMemoryTicketStore::new();
        for ticket in fixture.tickets {
            tickets.insert(ticket)?;
        }

        Ok(Self {
            config: Arc::new(config),
            tickets: Arc::new(tickets),
            grants: InMemoryPermissionStore::from_grants(fixture.grants),
        })
    }

    fn check_user(&self, user: &str) -> Result<()> {
        if self.grants.knows_user(user) {
            Ok(())
        } else {
            Err(EnchantError::UnknownUser {
                username: user.to_string(),
            })
        }
    }

    fn ticket_resource(ticket: &Option<String>) -> ResourceRef {
        match ticket {
            Some(id) => ResourceRef::ticket(id.as_str()),
            None => Ticket::new().resource(),
        }
    }
}

fn run(args: &Args) -> Result<()> {
    let ws = Workspace::load(args)?;
    let engine = AccessDecisionEngine::new(ws.config.clone(), ws.tickets.clone());
    let session = EvaluationSession::new();

    match &args.command {
        Command::Policy => {
            let config = &ws.config;
            if args.json {
                print_json(&json!({
                    "rules": config.rules(),
                    "permission_actions": config.permission_actions(),
                    "gray_disabled": config.gray_disabled(),
                    "issues": config.issues(),
                }))?;
            } else {
                for rule in config.rules() {
                    println!(
                        "{:<16} permission=[{}] disable={} hide={} ondenial={} label={}",
                        rule.name,
                        rule.required_permissions.join(","),
                        rule.disabled,
                        rule.hidden,
                        rule.on_denial,
                        rule.label.as_deref().unwrap_or("-"),
                    );
                }
                println!("Declared permissions: {}", config.permission_actions().join(", "));
                for issue in config.issues() {
                    println!("Issue: {}: {}", issue.key, issue.message);
                }
            }
        }

        Command::Fields { user, ticket } => {
            ws.check_user(user)?;
            let principal = PermissionPipeline::new(&engine, &session, &ws.grants, user.as_str());
            let resolver = FieldPolicyResolver::new(ws.config.clone());
            let scope = Workspace::ticket_resource(ticket);
            let states = resolver.resolve_all(&principal, Some(&scope));

            if args.json {
                print_json(&json!(states))?;
            } else {
                for state in &states {
                    let mode = if !state.visible {
                        "hidden"
                    } else if !state.editable {
                        "disabled"
                    } else {
                        "editable"
                    };
                    println!(
                        "{:<16} {:<9} label={}{}",
                        state.field,
                        mode,
                        state.effective_label,
                        state
                            .denial_reason
                            .as_ref()
                            .map(|r| format!(" ({})", r))
                            .unwrap_or_default(),
                    );
                }
            }
        }

        Command::Access {
            user,
            action,
            tickets,
        } => {
            ws.check_user(user)?;
            let principal = PermissionPipeline::new(&engine, &session, &ws.grants, user.as_str());
            let ids = if tickets.is_empty() {
                ws.tickets.ids()
            } else {
                tickets.clone()
            };

            let accessible = engine.filter_accessible(
                &session,
                &principal,
                action,
                ids.iter().map(String::as_str),
            );
            let total = adjusted_total(&session, ids.len());

            if args.json {
                print_json(&json!({
                    "action": action,
                    "accessible": accessible,
                    "total": total,
                }))?;
            } else {
                for id in &ids {
                    let verdict = if accessible.contains(id) { "no opinion" } else { "deny" };
                    println!("#{:<6} {}", id, verdict);
                }
                println!("{} of {} ticket(s) listed", total, ids.len());
            }
        }

        Command::Validate {
            user,
            ticket,
            changes,
        } => {
            ws.check_user(user)?;
            let principal = PermissionPipeline::new(&engine, &session, &ws.grants, user.as_str());

            let mut proposed = match ticket {
                Some(id) => ws.tickets.fetch_ticket(id)?.unwrap_or_else(|| Ticket::new().with_id(id.as_str())),
                None => Ticket::new(),
            };
            for (field, value) in changes {
                proposed.set(field.as_str(), value.as_str());
            }

            let validator = MutationValidator::new(ws.config.clone());
            let violations = validator.validate_against_store(&*ws.tickets, &proposed, &principal);

            if args.json {
                print_json(&json!(violations))?;
            } else if violations.is_empty() {
                println!("Accepted");
            } else {
                for violation in &violations {
                    println!("{}: {}", violation.field, violation.message);
                }
            }
        }

        Command::Types { user, types } => {
            ws.check_user(user)?;
            let principal = PermissionPipeline::new(&engine, &session, &ws.grants, user.as_str());
            let candidates: Vec<String> = if types.is_empty() {
                let mut seen = Vec::new();
                for id in ws.tickets.ids() {
                    if let Some(ticket) = ws.tickets.fetch_ticket(&id)? {
                        if let Some(t) = ticket.ticket_type() {
                            if !seen.iter().any(|s| s == t) {
                                seen.push(t.to_string());
                            }
                        }
                    }
                }
                seen
            } else {
                types.clone()
            };

            let allowed = TypeFilter::new(ws.config.clone())
                .allowed_types(&principal, candidates.iter().map(String::as_str));

            if args.json {
                print_json(&json!(allowed))?;
            } else {
                println!("{}", allowed.join("\n"));
            }
        }
    }

    Ok(())
}

fn print_json(value: &serde_json::Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
